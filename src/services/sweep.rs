use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{priced_item, pricing_config, pricing_run, store};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::PRICING_METRICS;
use crate::services::applier::PriceApplier;
use crate::services::catalog::CatalogService;
use crate::services::decision::{self, Settled, Verdict};
use crate::services::revenue::RevenueComparator;

/// What one sweep over a store did, as persisted and as returned to the
/// caller. `errors` holds per-item failure messages; the sweep itself only
/// fails when it cannot start at all.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub store_id: Uuid,
    /// Items whose config was evaluated, including ones that then failed.
    pub items_processed: u32,
    pub increased: u32,
    pub reverted: u32,
    pub waiting: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
    /// Set when the sweep ended early without evaluating anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunSummary {
    fn empty(run_id: Uuid, store_id: Uuid, started_at: DateTime<Utc>, note: &str) -> Self {
        Self {
            run_id,
            store_id,
            items_processed: 0,
            increased: 0,
            reverted: 0,
            waiting: 0,
            skipped: 0,
            errors: Vec::new(),
            note: Some(note.to_string()),
            started_at,
            duration_ms: 0,
        }
    }
}

enum ItemOutcome {
    Increased,
    Reverted,
    Held,
    Skipped { warning: String },
}

/// Runs the periodic pricing pass over a store: one decision per enabled
/// item, applied sequentially so the per-store storefront budget and the
/// evaluation order stay predictable.
#[derive(Clone)]
pub struct SweepService {
    catalog: CatalogService,
    comparator: Arc<RevenueComparator>,
    applier: Arc<PriceApplier>,
    event_sender: Option<Arc<EventSender>>,
}

impl SweepService {
    pub fn new(
        catalog: CatalogService,
        comparator: Arc<RevenueComparator>,
        applier: Arc<PriceApplier>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            catalog,
            comparator,
            applier,
            event_sender,
        }
    }

    /// Sweeps one store. Exactly one sweep can run per store at a time; a
    /// second caller gets `SweepInProgress` instead of a summary. Every
    /// completed call, including the early no-op returns, leaves a
    /// `pricing_run` row behind.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn run_pricing_sweep(&self, store_id: Uuid) -> Result<RunSummary, ServiceError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = Uuid::new_v4();

        let store = self.catalog.get_store(store_id).await?;

        if !store.auto_pricing_enabled {
            info!("Store automation is switched off; nothing to evaluate");
            let summary = RunSummary::empty(
                run_id,
                store_id,
                started_at,
                "automation is disabled for this store",
            );
            return self.finish(summary, clock).await;
        }

        let holder = Uuid::new_v4();
        if !self
            .catalog
            .claim_sweep_lock(store_id, holder, started_at)
            .await?
        {
            PRICING_METRICS.sweeps_rejected.inc();
            warn!("Another sweep holds the lock for this store");
            return Err(ServiceError::SweepInProgress(store_id));
        }

        PRICING_METRICS.sweeps_in_flight.inc();
        let outcome = self.evaluate_store(&store, run_id, started_at).await;
        PRICING_METRICS.sweeps_in_flight.dec();

        // The lock is released no matter how the evaluation went.
        if let Err(e) = self.catalog.release_sweep_lock(store_id, holder).await {
            error!(error = %e, "Failed to release sweep lock");
        }

        self.finish(outcome?, clock).await
    }

    /// Persists the run row, bumps metrics, and emits the completion event.
    async fn finish(
        &self,
        mut summary: RunSummary,
        clock: Instant,
    ) -> Result<RunSummary, ServiceError> {
        summary.duration_ms = clock.elapsed().as_millis() as i64;

        let errors = serde_json::to_value(&summary.errors)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.catalog
            .insert_run(pricing_run::ActiveModel {
                id: Set(summary.run_id),
                store_id: Set(summary.store_id),
                items_processed: Set(summary.items_processed as i32),
                items_increased: Set(summary.increased as i32),
                items_reverted: Set(summary.reverted as i32),
                items_waiting: Set(summary.waiting as i32),
                items_skipped: Set(summary.skipped as i32),
                errors: Set(errors),
                note: Set(summary.note.clone()),
                started_at: Set(summary.started_at),
                duration_ms: Set(summary.duration_ms),
            })
            .await?;

        PRICING_METRICS.record_sweep(clock.elapsed());
        PRICING_METRICS
            .items_processed
            .inc_by(u64::from(summary.items_processed));
        info!(
            run_id = %summary.run_id,
            items_processed = summary.items_processed,
            increased = summary.increased,
            reverted = summary.reverted,
            waiting = summary.waiting,
            skipped = summary.skipped,
            error_count = summary.errors.len(),
            "Pricing sweep finished"
        );

        if let Some(sender) = &self.event_sender {
            let event = Event::SweepCompleted {
                store_id: summary.store_id,
                run_id: summary.run_id,
                items_processed: summary.items_processed,
            };
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send sweep completed event");
            }
        }

        Ok(summary)
    }

    async fn evaluate_store(
        &self,
        store: &store::Model,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<RunSummary, ServiceError> {
        let pairs = self.catalog.normalized_enabled_pairs(store.id).await?;
        if pairs.is_empty() {
            return Ok(RunSummary::empty(
                run_id,
                store.id,
                started_at,
                "no items with automation enabled",
            ));
        }

        let mut summary = RunSummary {
            run_id,
            store_id: store.id,
            items_processed: 0,
            increased: 0,
            reverted: 0,
            waiting: 0,
            skipped: 0,
            errors: Vec::new(),
            note: None,
            started_at,
            duration_ms: 0,
        };

        for (item, config) in pairs {
            match self.evaluate_item(store, &item, &config).await {
                Ok(ItemOutcome::Increased) => {
                    summary.items_processed += 1;
                    summary.increased += 1;
                }
                Ok(ItemOutcome::Reverted) => {
                    summary.items_processed += 1;
                    summary.reverted += 1;
                }
                Ok(ItemOutcome::Held) => {
                    summary.items_processed += 1;
                    summary.waiting += 1;
                    PRICING_METRICS.items_held.inc();
                }
                Ok(ItemOutcome::Skipped { warning }) => {
                    summary.skipped += 1;
                    warn!(item_id = %item.id, "{}", warning);
                    summary.errors.push(warning);
                }
                // One broken item never stops the rest of the store.
                Err(e) => {
                    summary.items_processed += 1;
                    PRICING_METRICS.item_errors.inc();
                    error!(item_id = %item.id, error = %e, "Item evaluation failed; continuing");
                    summary
                        .errors
                        .push(format!("item {} ({}): {}", item.external_id, item.id, e));
                }
            }
        }

        Ok(summary)
    }

    /// Evaluates one item against its config and applies the outcome.
    /// State is re-read first: a toggle may have run since the batch was
    /// loaded, and the freshest row wins.
    async fn evaluate_item(
        &self,
        store: &store::Model,
        loaded_item: &priced_item::Model,
        _loaded_config: &pricing_config::Model,
    ) -> Result<ItemOutcome, ServiceError> {
        let config = match self.catalog.config_for_item(loaded_item.id).await? {
            Some(fresh) => fresh,
            None => {
                return Ok(ItemOutcome::Skipped {
                    warning: format!(
                        "item {} ({}): pricing config disappeared mid-sweep",
                        loaded_item.external_id, loaded_item.id
                    ),
                })
            }
        };
        if !config.auto_pricing_enabled {
            return Ok(ItemOutcome::Skipped {
                warning: format!(
                    "item {} ({}): automation was disabled mid-sweep",
                    loaded_item.external_id, loaded_item.id
                ),
            });
        }
        let item = match self.catalog.get_item(loaded_item.id).await {
            Ok(item) => item,
            Err(ServiceError::NotFound(_)) => {
                return Ok(ItemOutcome::Skipped {
                    warning: format!(
                        "item {} ({}): removed mid-sweep",
                        loaded_item.external_id, loaded_item.id
                    ),
                })
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        match decision::triage(&item, &config, now) {
            Verdict::Hold(reason) => {
                debug!(item_id = %item.id, reason = ?reason, "Holding price");
                Ok(ItemOutcome::Held)
            }
            Verdict::Increase(step) => {
                self.applier
                    .apply_increase(store, &item, &config, &step, None, now)
                    .await?;
                Ok(ItemOutcome::Increased)
            }
            Verdict::NeedsComparison => {
                let comparison = self
                    .comparator
                    .compare(item.id, config.period_hours, now)
                    .await?;
                match decision::settle(&item, &config, &comparison) {
                    Settled::Increase(step) => {
                        // Revenue figures go on the record only when the
                        // comparison actually informed the decision.
                        let figures = comparison.has_sufficient_data.then_some(&comparison);
                        self.applier
                            .apply_increase(store, &item, &config, &step, figures, now)
                            .await?;
                        Ok(ItemOutcome::Increased)
                    }
                    Settled::Revert { reason } => {
                        let target = self
                            .catalog
                            .latest_increase_old_price(item.id)
                            .await?
                            .unwrap_or(item.starting_price);
                        self.applier
                            .apply_revert(store, &item, &config, target, &reason, &comparison, now)
                            .await?;
                        Ok(ItemOutcome::Reverted)
                    }
                }
            }
        }
    }
}
