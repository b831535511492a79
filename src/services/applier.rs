use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelTrait, Set, TransactionError, TransactionTrait};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    price_change, priced_item, pricing_config, store, AutomationState, PriceAction,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::PRICING_METRICS;
use crate::services::decision::IncreaseStep;
use crate::services::revenue::RevenueComparison;
use crate::services::storefront::StorefrontApi;

/// Applies one decided price change to one item.
///
/// The storefront push always comes first: if the platform rejects the
/// price, the catalog is left untouched and the two never disagree. The
/// catalog writes (price, audit row, config bookkeeping) then commit as a
/// single transaction.
pub struct PriceApplier {
    db_pool: Arc<DbPool>,
    storefront: Arc<dyn StorefrontApi>,
    event_sender: Option<Arc<EventSender>>,
}

impl PriceApplier {
    pub fn new(
        db_pool: Arc<DbPool>,
        storefront: Arc<dyn StorefrontApi>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            storefront,
            event_sender,
        }
    }

    #[instrument(skip(self, store, item, config, step, figures), fields(item_id = %item.id))]
    pub async fn apply_increase(
        &self,
        store: &store::Model,
        item: &priced_item::Model,
        config: &pricing_config::Model,
        step: &IncreaseStep,
        figures: Option<&RevenueComparison>,
        now: DateTime<Utc>,
    ) -> Result<price_change::Model, ServiceError> {
        self.storefront
            .set_price(store, &item.external_id, step.new_price)
            .await?;

        let new_state = if step.capped {
            AutomationState::AtMaxCap
        } else {
            AutomationState::Increasing
        };
        let next_eligible = now + Duration::hours(i64::from(config.period_hours));

        let item_id = item.id;
        let old_price = item.current_price;
        let new_price = step.new_price;
        let capped = step.capped;
        let reason = step.reason.clone();
        let (current_revenue, previous_revenue, change_percent) = match figures {
            Some(comparison) => (
                Some(comparison.current_period_revenue),
                Some(comparison.previous_period_revenue),
                Some(comparison.change_percent),
            ),
            None => (None, None, None),
        };
        let item_model = item.clone();
        let config_model = config.clone();

        let db = &*self.db_pool;
        let record = db
            .transaction::<_, price_change::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut item_am: priced_item::ActiveModel = item_model.into();
                    item_am.current_price = Set(new_price);
                    item_am.updated_at = Set(Some(now));
                    item_am.update(txn).await.map_err(ServiceError::db_error)?;

                    let record = price_change::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        item_id: Set(item_id),
                        old_price: Set(old_price),
                        new_price: Set(new_price),
                        action: Set(PriceAction::Increase),
                        reason: Set(reason),
                        current_period_revenue: Set(current_revenue),
                        previous_period_revenue: Set(previous_revenue),
                        change_percent: Set(change_percent),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut config_am: pricing_config::ActiveModel = config_model.into();
                    config_am.current_state = Set(new_state);
                    config_am.last_price_change_at = Set(Some(now));
                    config_am.next_eligible_change_at = Set(Some(next_eligible));
                    config_am.is_first_increase = Set(false);
                    config_am.last_automation_price = Set(Some(new_price));
                    config_am.updated_at = Set(Some(now));
                    config_am.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(record)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        PRICING_METRICS.price_increases.inc();
        info!(
            old_price = %old_price,
            new_price = %new_price,
            capped = capped,
            "Applied price increase"
        );

        if let Some(sender) = &self.event_sender {
            let event = Event::PriceIncreased {
                item_id,
                old_price,
                new_price,
                capped,
            };
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, item_id = %item_id, "Failed to send price increased event");
            }
        }

        Ok(record)
    }

    #[instrument(skip(self, store, item, config, comparison), fields(item_id = %item.id))]
    pub async fn apply_revert(
        &self,
        store: &store::Model,
        item: &priced_item::Model,
        config: &pricing_config::Model,
        target_price: rust_decimal::Decimal,
        reason: &str,
        comparison: &RevenueComparison,
        now: DateTime<Utc>,
    ) -> Result<price_change::Model, ServiceError> {
        self.storefront
            .set_price(store, &item.external_id, target_price)
            .await?;

        let wait_until = now + Duration::hours(i64::from(config.wait_hours_after_revert));
        let item_id = item.id;
        let old_price = item.current_price;
        let reason = reason.to_string();
        let current_revenue = comparison.current_period_revenue;
        let previous_revenue = comparison.previous_period_revenue;
        let change_percent = comparison.change_percent;
        let item_model = item.clone();
        let config_model = config.clone();

        let db = &*self.db_pool;
        let record = db
            .transaction::<_, price_change::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut item_am: priced_item::ActiveModel = item_model.into();
                    item_am.current_price = Set(target_price);
                    item_am.updated_at = Set(Some(now));
                    item_am.update(txn).await.map_err(ServiceError::db_error)?;

                    let record = price_change::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        item_id: Set(item_id),
                        old_price: Set(old_price),
                        new_price: Set(target_price),
                        action: Set(PriceAction::Revert),
                        reason: Set(reason),
                        current_period_revenue: Set(Some(current_revenue)),
                        previous_period_revenue: Set(Some(previous_revenue)),
                        change_percent: Set(Some(change_percent)),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut config_am: pricing_config::ActiveModel = config_model.into();
                    config_am.current_state = Set(AutomationState::WaitingAfterRevert);
                    config_am.last_price_change_at = Set(Some(now));
                    // The item is not reconsidered until the wait elapses.
                    config_am.next_eligible_change_at = Set(Some(wait_until));
                    config_am.revert_wait_until = Set(Some(wait_until));
                    config_am.last_automation_price = Set(Some(target_price));
                    config_am.updated_at = Set(Some(now));
                    config_am.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(record)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        PRICING_METRICS.price_reverts.inc();
        info!(
            old_price = %old_price,
            new_price = %target_price,
            wait_until = %wait_until,
            "Reverted price after revenue drop"
        );

        if let Some(sender) = &self.event_sender {
            let event = Event::PriceReverted {
                item_id,
                old_price,
                new_price: target_price,
            };
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, item_id = %item_id, "Failed to send price reverted event");
            }
        }

        Ok(record)
    }
}
