//! Turning automated pricing on and off, per item or store-wide.
//!
//! Every toggle follows a two-phase contract: it either applies (returning
//! the snapshots it captured and any non-fatal warnings) or it asks the
//! caller to choose a resume price first, mutating nothing. Applied toggles
//! register an undo state so the operator has ten minutes to take them back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    price_change, priced_item, pricing_config, store, AutomationState, PriceAction,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::PRICING_METRICS;
use crate::services::catalog::CatalogService;
use crate::services::storefront::StorefrontApi;
use crate::services::undo::{ToggleSnapshot, UndoLedger, UndoState, UndoTag};

/// Which price an ambiguous re-enable resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStrategy {
    /// Start over from the pre-automation base price.
    Base,
    /// Pick up at the price automation had last settled on.
    Last,
}

/// One item an enable cannot resolve without operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResumeChoice {
    pub item_id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub last_price: Decimal,
}

/// Result of a toggle. `ChoiceRequired` means nothing was mutated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    ChoiceRequired { choices: Vec<ResumeChoice> },
    Applied {
        count: u32,
        snapshots: Vec<ToggleSnapshot>,
        warnings: Vec<String>,
    },
}

/// How one item's enable will proceed once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EnablePlan {
    /// No config exists yet; create one from the defaults, already enabled.
    CreateDefault,
    /// Flip the existing config on without touching the price.
    Plain { set_pre: bool },
    /// Push a resume price and record it before flipping the config on.
    Resume { price: Decimal, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Planned {
    Plan(EnablePlan),
    /// The base and last automated prices differ and no strategy was given.
    Ambiguous(ResumeChoice),
}

/// Decides how to enable one item. Pure: the caller executes the plan.
fn plan_enable(
    item: &priced_item::Model,
    config: Option<&pricing_config::Model>,
    strategy: Option<ResumeStrategy>,
) -> Planned {
    let Some(config) = config else {
        return Planned::Plan(EnablePlan::CreateDefault);
    };
    match (config.pre_automation_price, config.last_automation_price) {
        (None, _) => Planned::Plan(EnablePlan::Plain { set_pre: true }),
        (Some(_), None) => Planned::Plan(EnablePlan::Plain { set_pre: false }),
        (Some(base), Some(last)) if base == last => Planned::Plan(EnablePlan::Resume {
            price: base,
            reason: "automated pricing re-enabled at the agreed price".to_string(),
        }),
        (Some(base), Some(last)) => match strategy {
            None => Planned::Ambiguous(ResumeChoice {
                item_id: item.id,
                name: item.name.clone(),
                base_price: base,
                last_price: last,
            }),
            Some(ResumeStrategy::Base) => Planned::Plan(EnablePlan::Resume {
                price: base,
                reason: "automated pricing re-enabled; resuming from the base price".to_string(),
            }),
            Some(ResumeStrategy::Last) => Planned::Plan(EnablePlan::Resume {
                price: last,
                reason: "automated pricing re-enabled; resuming from the last automated price"
                    .to_string(),
            }),
        },
    }
}

fn snapshot_of(
    item: &priced_item::Model,
    config: &pricing_config::Model,
    display_price: Decimal,
) -> ToggleSnapshot {
    ToggleSnapshot {
        item_id: item.id,
        external_id: item.external_id.clone(),
        price_before: item.current_price,
        display_price,
        enabled_before: config.auto_pricing_enabled,
        state_before: config.current_state,
        next_eligible_change_at_before: config.next_eligible_change_at,
        revert_wait_until_before: config.revert_wait_until,
    }
}

/// Snapshot for an item that had no config at all before the toggle.
fn unconfigured_snapshot(item: &priced_item::Model, display_price: Decimal) -> ToggleSnapshot {
    ToggleSnapshot {
        item_id: item.id,
        external_id: item.external_id.clone(),
        price_before: item.current_price,
        display_price,
        enabled_before: false,
        state_before: AutomationState::Increasing,
        next_eligible_change_at_before: None,
        revert_wait_until_before: None,
    }
}

/// Price an enable leaves on the item once its plan runs.
fn enable_display_price(item: &priced_item::Model, plan: &EnablePlan) -> Decimal {
    match plan {
        EnablePlan::Resume { price, .. } => *price,
        EnablePlan::CreateDefault | EnablePlan::Plain { .. } => item.current_price,
    }
}

#[derive(Clone)]
pub struct ToggleService {
    db_pool: Arc<DbPool>,
    catalog: CatalogService,
    storefront: Arc<dyn StorefrontApi>,
    ledger: Arc<UndoLedger>,
    event_sender: Option<Arc<EventSender>>,
}

impl ToggleService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: CatalogService,
        storefront: Arc<dyn StorefrontApi>,
        ledger: Arc<UndoLedger>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            storefront,
            ledger,
            event_sender,
        }
    }

    /// Turns automated pricing off for one item and restores its price to
    /// the pre-automation level (the starting price when none is recorded).
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn disable_item(&self, item_id: Uuid) -> Result<ToggleOutcome, ServiceError> {
        let now = Utc::now();
        let item = self.catalog.get_item(item_id).await?;
        let store = self.catalog.get_store(item.store_id).await?;

        let effective = self.catalog.effective_config(&item).await?.ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "automated pricing is not configured for item {}",
                item_id
            ))
        })?;
        if !effective.auto_pricing_enabled {
            return Err(ServiceError::InvalidOperation(format!(
                "automated pricing is already disabled for item {}",
                item_id
            )));
        }
        let config = self.catalog.ensure_direct_config(&item, &effective).await?;

        let mut warnings = Vec::new();
        let snapshot = self
            .disable_one(&store, &item, &config, now, &mut warnings)
            .await?;
        let snapshots = vec![snapshot];

        self.ledger.register(
            store.id,
            UndoState {
                tag: UndoTag::IndividualOff,
                created_at: now,
                snapshots: snapshots.clone(),
                description: format!("disabled automated pricing for \"{}\"", item.name),
            },
        );
        PRICING_METRICS.automation_disabled.inc();
        info!(item_name = %item.name, "Disabled automated pricing");
        self.send_event(Event::AutomationDisabled { item_id }).await;

        Ok(ToggleOutcome::Applied {
            count: 1,
            snapshots,
            warnings,
        })
    }

    /// Turns automated pricing on for one item. When the base and last
    /// automated prices disagree and no strategy is given, nothing is
    /// changed and the caller gets the choice back.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn enable_item(
        &self,
        item_id: Uuid,
        strategy: Option<ResumeStrategy>,
    ) -> Result<ToggleOutcome, ServiceError> {
        let now = Utc::now();
        let item = self.catalog.get_item(item_id).await?;
        let store = self.catalog.get_store(item.store_id).await?;

        let effective = self.catalog.effective_config(&item).await?;
        if let Some(config) = &effective {
            if config.auto_pricing_enabled {
                return Err(ServiceError::InvalidOperation(format!(
                    "automated pricing is already enabled for item {}",
                    item_id
                )));
            }
        }

        let config = match &effective {
            None => None,
            Some(shared) => Some(self.catalog.ensure_direct_config(&item, shared).await?),
        };

        let plan = match plan_enable(&item, config.as_ref(), strategy) {
            Planned::Plan(plan) => plan,
            Planned::Ambiguous(choice) => {
                return Ok(ToggleOutcome::ChoiceRequired {
                    choices: vec![choice],
                })
            }
        };
        let display_price = enable_display_price(&item, &plan);
        let snapshot = match &config {
            None => unconfigured_snapshot(&item, display_price),
            Some(direct) => snapshot_of(&item, direct, display_price),
        };

        let mut warnings = Vec::new();
        self.enable_one(&store, &item, config.as_ref(), plan, now, &mut warnings)
            .await?;
        let snapshots = vec![snapshot];

        self.ledger.register(
            store.id,
            UndoState {
                tag: UndoTag::IndividualOn,
                created_at: now,
                snapshots: snapshots.clone(),
                description: format!("enabled automated pricing for \"{}\"", item.name),
            },
        );
        PRICING_METRICS.automation_enabled.inc();
        info!(item_name = %item.name, "Enabled automated pricing");
        self.send_event(Event::AutomationEnabled { item_id }).await;

        Ok(ToggleOutcome::Applied {
            count: 1,
            snapshots,
            warnings,
        })
    }

    /// Disables every enabled item of the store, one undo state for the lot.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn disable_store(&self, store_id: Uuid) -> Result<ToggleOutcome, ServiceError> {
        let now = Utc::now();
        let store = self.catalog.get_store(store_id).await?;
        let pairs = self.catalog.normalized_enabled_pairs(store_id).await?;
        if pairs.is_empty() {
            return Ok(ToggleOutcome::Applied {
                count: 0,
                snapshots: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let mut snapshots = Vec::new();
        let mut warnings = Vec::new();
        for (item, config) in &pairs {
            match self
                .disable_one(&store, item, config, now, &mut warnings)
                .await
            {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Failed to disable item; continuing");
                    warnings.push(format!("item {} ({}): {}", item.external_id, item.id, e));
                }
            }
        }

        let count = snapshots.len() as u32;
        if count > 0 {
            self.ledger.register(
                store_id,
                UndoState {
                    tag: UndoTag::GlobalOff,
                    created_at: now,
                    snapshots: snapshots.clone(),
                    description: format!("disabled automated pricing for {} items", count),
                },
            );
            PRICING_METRICS.automation_disabled.inc_by(u64::from(count));
        }
        info!(items_affected = count, "Disabled automated pricing store-wide");
        self.send_event(Event::StoreAutomationToggled {
            store_id,
            enabled: false,
            items_affected: count,
        })
        .await;

        Ok(ToggleOutcome::Applied {
            count,
            snapshots,
            warnings,
        })
    }

    /// Enables every item of the store that has automation switched off.
    /// If any of them needs a resume choice and no strategy was given, the
    /// whole call returns `ChoiceRequired` and nothing is changed.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn enable_store(
        &self,
        store_id: Uuid,
        strategy: Option<ResumeStrategy>,
    ) -> Result<ToggleOutcome, ServiceError> {
        let now = Utc::now();
        let store = self.catalog.get_store(store_id).await?;
        let targets = self.catalog.disabled_configured_items(store_id).await?;
        if targets.is_empty() {
            return Ok(ToggleOutcome::Applied {
                count: 0,
                snapshots: Vec::new(),
                warnings: Vec::new(),
            });
        }

        // Plan everything first so an ambiguity surfaces before any write.
        let mut planned = Vec::with_capacity(targets.len());
        let mut choices = Vec::new();
        for (item, config) in targets {
            match plan_enable(&item, Some(&config), strategy) {
                Planned::Plan(plan) => planned.push((item, config, plan)),
                Planned::Ambiguous(choice) => choices.push(choice),
            }
        }
        if !choices.is_empty() {
            return Ok(ToggleOutcome::ChoiceRequired { choices });
        }

        let mut snapshots = Vec::new();
        let mut warnings = Vec::new();
        for (item, config, plan) in planned {
            let snapshot = snapshot_of(&item, &config, enable_display_price(&item, &plan));
            match self
                .enable_one(&store, &item, Some(&config), plan, now, &mut warnings)
                .await
            {
                Ok(()) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Failed to enable item; continuing");
                    warnings.push(format!("item {} ({}): {}", item.external_id, item.id, e));
                }
            }
        }

        let count = snapshots.len() as u32;
        if count > 0 {
            self.ledger.register(
                store_id,
                UndoState {
                    tag: UndoTag::GlobalOn,
                    created_at: now,
                    snapshots: snapshots.clone(),
                    description: format!("enabled automated pricing for {} items", count),
                },
            );
            PRICING_METRICS.automation_enabled.inc_by(u64::from(count));
        }
        info!(items_affected = count, "Enabled automated pricing store-wide");
        self.send_event(Event::StoreAutomationToggled {
            store_id,
            enabled: true,
            items_affected: count,
        })
        .await;

        Ok(ToggleOutcome::Applied {
            count,
            snapshots,
            warnings,
        })
    }

    /// Disables one enabled item: restore the price on the storefront (non
    /// fatal), then restore it locally, write the audit row, and flip the
    /// config off, all in one transaction.
    async fn disable_one(
        &self,
        store: &store::Model,
        item: &priced_item::Model,
        config: &pricing_config::Model,
        now: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> Result<ToggleSnapshot, ServiceError> {
        let price_to_restore = config.pre_automation_price.unwrap_or(item.starting_price);
        let snapshot = snapshot_of(item, config, price_to_restore);

        if let Err(e) = self
            .storefront
            .set_price(store, &item.external_id, price_to_restore)
            .await
        {
            warn!(item_id = %item.id, error = %e, "Storefront push failed during disable");
            warnings.push(format!(
                "storefront push failed for item {} ({}): {}",
                item.external_id, item.id, e
            ));
        }

        let item_id = item.id;
        let old_price = item.current_price;
        let item_model = item.clone();
        let config_model = config.clone();
        let db = &*self.db_pool;
        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let mut item_am: priced_item::ActiveModel = item_model.into();
                item_am.current_price = Set(price_to_restore);
                item_am.updated_at = Set(Some(now));
                item_am.update(txn).await.map_err(ServiceError::db_error)?;

                price_change::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    item_id: Set(item_id),
                    old_price: Set(old_price),
                    new_price: Set(price_to_restore),
                    action: Set(PriceAction::Revert),
                    reason: Set(format!(
                        "automated pricing disabled; price restored to {}",
                        price_to_restore
                    )),
                    current_period_revenue: Set(None),
                    previous_period_revenue: Set(None),
                    change_percent: Set(None),
                    created_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;

                let mut config_am: pricing_config::ActiveModel = config_model.into();
                config_am.auto_pricing_enabled = Set(false);
                config_am.current_state = Set(AutomationState::Increasing);
                config_am.next_eligible_change_at = Set(None);
                config_am.revert_wait_until = Set(None);
                config_am.updated_at = Set(Some(now));
                config_am.update(txn).await.map_err(ServiceError::db_error)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })?;

        Ok(snapshot)
    }

    /// Executes one enable plan. `config` is `None` only for
    /// `EnablePlan::CreateDefault`.
    async fn enable_one(
        &self,
        store: &store::Model,
        item: &priced_item::Model,
        config: Option<&pricing_config::Model>,
        plan: EnablePlan,
        now: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> Result<(), ServiceError> {
        match plan {
            EnablePlan::CreateDefault => {
                self.catalog.insert_default_config(item, now).await?;
                Ok(())
            }
            EnablePlan::Plain { set_pre } => {
                let config = config.ok_or_else(|| {
                    ServiceError::InternalError("enable plan lost its config".to_string())
                })?;
                let mut config_am: pricing_config::ActiveModel = config.clone().into();
                config_am.auto_pricing_enabled = Set(true);
                config_am.current_state = Set(AutomationState::Increasing);
                config_am.is_first_increase = Set(true);
                config_am.next_eligible_change_at = Set(Some(now));
                config_am.revert_wait_until = Set(None);
                if set_pre {
                    config_am.pre_automation_price = Set(Some(item.current_price));
                }
                config_am.updated_at = Set(Some(now));
                config_am
                    .update(&*self.db_pool)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                Ok(())
            }
            EnablePlan::Resume { price, reason } => {
                let config = config.ok_or_else(|| {
                    ServiceError::InternalError("enable plan lost its config".to_string())
                })?;
                if let Err(e) = self
                    .storefront
                    .set_price(store, &item.external_id, price)
                    .await
                {
                    warn!(item_id = %item.id, error = %e, "Storefront push failed during enable");
                    warnings.push(format!(
                        "storefront push failed for item {} ({}): {}",
                        item.external_id, item.id, e
                    ));
                }

                let item_id = item.id;
                let old_price = item.current_price;
                let item_model = item.clone();
                let config_model = config.clone();
                let db = &*self.db_pool;
                db.transaction::<_, (), ServiceError>(move |txn| {
                    Box::pin(async move {
                        let mut item_am: priced_item::ActiveModel = item_model.into();
                        item_am.current_price = Set(price);
                        item_am.updated_at = Set(Some(now));
                        item_am.update(txn).await.map_err(ServiceError::db_error)?;

                        price_change::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            item_id: Set(item_id),
                            old_price: Set(old_price),
                            new_price: Set(price),
                            action: Set(PriceAction::Increase),
                            reason: Set(reason),
                            current_period_revenue: Set(None),
                            previous_period_revenue: Set(None),
                            change_percent: Set(None),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        let mut config_am: pricing_config::ActiveModel = config_model.into();
                        config_am.auto_pricing_enabled = Set(true);
                        config_am.current_state = Set(AutomationState::Increasing);
                        config_am.is_first_increase = Set(true);
                        config_am.next_eligible_change_at = Set(Some(now));
                        config_am.revert_wait_until = Set(None);
                        config_am.updated_at = Set(Some(now));
                        config_am.update(txn).await.map_err(ServiceError::db_error)?;

                        Ok(())
                    })
                })
                .await
                .map_err(|e| match e {
                    TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                })?;
                Ok(())
            }
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send toggle event");
            }
        }
    }
}
