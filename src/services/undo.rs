//! Ten-minute undo for automation toggles.
//!
//! Every toggle (individual or store-wide, on or off) records a snapshot of
//! what it changed. The ledger keeps one undoable toggle per store; a newer
//! toggle replaces the older one, and a snapshot older than the window is
//! discarded on the next undo attempt.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{priced_item, pricing_config, AutomationState};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::PRICING_METRICS;
use crate::services::catalog::CatalogService;
use crate::services::storefront::StorefrontApi;

/// How long a toggle stays undoable. At exactly this age it is expired.
pub const UNDO_WINDOW_MINUTES: i64 = 10;

/// Which kind of toggle opened the undo window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum UndoTag {
    GlobalOn,
    GlobalOff,
    IndividualOn,
    IndividualOff,
}

/// Everything needed to put one item back the way it was before a toggle.
/// Captured before the toggle mutates anything.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToggleSnapshot {
    pub item_id: Uuid,
    pub external_id: String,
    pub price_before: Decimal,
    /// Price the toggle is putting in place; callers can show it without
    /// waiting for confirmation.
    pub display_price: Decimal,
    pub enabled_before: bool,
    #[schema(value_type = String)]
    pub state_before: AutomationState,
    pub next_eligible_change_at_before: Option<DateTime<Utc>>,
    pub revert_wait_until_before: Option<DateTime<Utc>>,
}

/// One registered, not-yet-undone toggle.
#[derive(Debug, Clone)]
pub struct UndoState {
    pub tag: UndoTag,
    pub created_at: DateTime<Utc>,
    pub snapshots: Vec<ToggleSnapshot>,
    pub description: String,
}

/// What the status endpoint reports about the store's undo window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UndoStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<UndoTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<i64>,
    pub items: u32,
}

/// In-memory map of the last toggle per store. Lost on restart, which is
/// acceptable: undo is a short-lived convenience, not an audit record.
#[derive(Debug, Default)]
pub struct UndoLedger {
    states: DashMap<Uuid, UndoState>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Registers a fresh toggle, replacing whatever was undoable before.
    pub fn register(&self, store_id: Uuid, state: UndoState) {
        self.states.insert(store_id, state);
    }

    fn is_expired(state: &UndoState, now: DateTime<Utc>) -> bool {
        now - state.created_at >= Duration::minutes(UNDO_WINDOW_MINUTES)
    }

    pub fn status(&self, store_id: Uuid, now: DateTime<Utc>) -> UndoStatus {
        match self.states.get(&store_id) {
            Some(entry) if !Self::is_expired(entry.value(), now) => {
                let state = entry.value();
                let deadline = state.created_at + Duration::minutes(UNDO_WINDOW_MINUTES);
                UndoStatus {
                    available: true,
                    tag: Some(state.tag),
                    description: Some(state.description.clone()),
                    seconds_remaining: Some((deadline - now).num_seconds().max(0)),
                    items: state.snapshots.len() as u32,
                }
            }
            _ => UndoStatus {
                available: false,
                tag: None,
                description: None,
                seconds_remaining: None,
                items: 0,
            },
        }
    }

    /// Removes and returns the store's undo state if it is still inside the
    /// window. An expired state is discarded, so a retry after expiry gets
    /// `UndoUnavailable` rather than `UndoExpired` again.
    pub fn take_fresh(
        &self,
        store_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<UndoState, ServiceError> {
        let (_, state) = self
            .states
            .remove(&store_id)
            .ok_or(ServiceError::UndoUnavailable(store_id))?;
        if Self::is_expired(&state, now) {
            return Err(ServiceError::UndoExpired);
        }
        Ok(state)
    }
}

/// Result of replaying an undo.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UndoOutcome {
    pub tag: UndoTag,
    pub description: String,
    /// Items whose local state was written back.
    pub restored: u32,
    /// Storefront pushes or item restores that failed; the rest of the undo
    /// still went through.
    pub warnings: Vec<String>,
}

/// Replays the snapshots of the store's last toggle.
#[derive(Clone)]
pub struct UndoService {
    db_pool: Arc<DbPool>,
    catalog: CatalogService,
    storefront: Arc<dyn StorefrontApi>,
    ledger: Arc<UndoLedger>,
    event_sender: Option<Arc<EventSender>>,
}

impl UndoService {
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

    pub fn status(&self, store_id: Uuid) -> UndoStatus {
        self.ledger.status(store_id, Utc::now())
    }

    /// Takes back the store's last toggle. Nothing is mutated when no fresh
    /// undo state exists.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn undo_last_toggle(&self, store_id: Uuid) -> Result<UndoOutcome, ServiceError> {
        let now = Utc::now();
        let state = match self.ledger.take_fresh(store_id, now) {
            Ok(state) => state,
            Err(e) => {
                if matches!(e, ServiceError::UndoExpired) {
                    PRICING_METRICS.undo_expired.inc();
                }
                return Err(e);
            }
        };
        let store = self.catalog.get_store(store_id).await?;

        let mut restored = 0u32;
        let mut warnings = Vec::new();
        for snapshot in &state.snapshots {
            // Push first so the storefront shows the restored price; a failed
            // push is reported but never blocks the local restore.
            if let Err(e) = self
                .storefront
                .set_price(&store, &snapshot.external_id, snapshot.price_before)
                .await
            {
                warn!(item_id = %snapshot.item_id, error = %e, "Storefront push failed during undo");
                warnings.push(format!(
                    "storefront push failed for item {}: {}",
                    snapshot.item_id, e
                ));
            }
            match self.restore_item(snapshot, now).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(item_id = %snapshot.item_id, error = %e, "Failed to restore item during undo");
                    warnings.push(format!("item {}: {}", snapshot.item_id, e));
                }
            }
        }

        PRICING_METRICS.undo_applied.inc();
        info!(
            restored = restored,
            warning_count = warnings.len(),
            "Undid last automation toggle"
        );

        if let Some(sender) = &self.event_sender {
            let event = Event::UndoApplied {
                store_id,
                items_restored: restored,
            };
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send undo applied event");
            }
        }

        Ok(UndoOutcome {
            tag: state.tag,
            description: state.description,
            restored,
            warnings,
        })
    }

    /// Writes one snapshot back: price on the item, the toggled fields on
    /// the config. Anything the toggle did not record stays as it is.
    async fn restore_item(
        &self,
        snapshot: &ToggleSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let item = self.catalog.get_item(snapshot.item_id).await?;
        let config = self
            .catalog
            .config_for_item(snapshot.item_id)
            .await?
            .ok_or(ServiceError::MissingConfig(snapshot.item_id))?;

        let snapshot = snapshot.clone();
        let db = &*self.db_pool;
        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let mut item_am: priced_item::ActiveModel = item.into();
                item_am.current_price = Set(snapshot.price_before);
                item_am.updated_at = Set(Some(now));
                item_am.update(txn).await.map_err(ServiceError::db_error)?;

                let mut config_am: pricing_config::ActiveModel = config.into();
                config_am.auto_pricing_enabled = Set(snapshot.enabled_before);
                config_am.current_state = Set(snapshot.state_before);
                config_am.next_eligible_change_at = Set(snapshot.next_eligible_change_at_before);
                config_am.revert_wait_until = Set(snapshot.revert_wait_until_before);
                config_am.updated_at = Set(Some(now));
                config_am.update(txn).await.map_err(ServiceError::db_error)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }
}
