use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{
    price_change, priced_item, pricing_config, pricing_run, store, AutomationState, PriceAction,
};
use crate::errors::ServiceError;

/// Default tunables applied when a pricing config row is first created.
#[derive(Debug, Clone, Copy)]
pub struct PricingDefaults {
    pub increment_percentage: Decimal,
    pub period_hours: i32,
    pub revenue_drop_threshold_percent: Decimal,
    pub wait_hours_after_revert: i32,
    pub max_increase_percentage: Decimal,
}

impl From<&AppConfig> for PricingDefaults {
    fn from(config: &AppConfig) -> Self {
        Self {
            increment_percentage: config.default_increment_percentage,
            period_hours: config.default_period_hours,
            revenue_drop_threshold_percent: config.default_revenue_drop_threshold_percent,
            wait_hours_after_revert: config.default_wait_hours_after_revert,
            max_increase_percentage: config.default_max_increase_percentage,
        }
    }
}

/// A partial update to the tunables of one pricing config. `None` leaves
/// the field as it is.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub increment_percentage: Option<Decimal>,
    pub period_hours: Option<i32>,
    pub revenue_drop_threshold_percent: Option<Decimal>,
    pub wait_hours_after_revert: Option<i32>,
    pub max_increase_percentage: Option<Decimal>,
}

/// Shared read, lock, and config-shaping access to the catalog tables.
/// Everything that must be answered the same way by the sweep, the toggles,
/// and undo lives here.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    defaults: PricingDefaults,
    lock_timeout_minutes: i64,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        Self {
            db_pool,
            defaults: PricingDefaults::from(config),
            lock_timeout_minutes: config.sweep_lock_timeout_minutes,
        }
    }

    pub fn defaults(&self) -> PricingDefaults {
        self.defaults
    }

    pub async fn get_store(&self, store_id: Uuid) -> Result<store::Model, ServiceError> {
        store::Entity::find_by_id(store_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))
    }

    pub async fn list_stores(&self) -> Result<Vec<store::Model>, ServiceError> {
        store::Entity::find()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<priced_item::Model, ServiceError> {
        priced_item::Entity::find_by_id(item_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Priced item {} not found", item_id)))
    }

    /// The config row attached directly to this item, if any.
    pub async fn config_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<pricing_config::Model>, ServiceError> {
        pricing_config::Entity::find()
            .filter(pricing_config::Column::ItemId.eq(item_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Resolves the config governing an item: its own row when present,
    /// otherwise the row attached to its group's parent item.
    pub async fn effective_config(
        &self,
        item: &priced_item::Model,
    ) -> Result<Option<pricing_config::Model>, ServiceError> {
        if let Some(direct) = self.config_for_item(item.id).await? {
            return Ok(Some(direct));
        }
        match item.group_id {
            Some(parent_id) => self.config_for_item(parent_id).await,
            None => Ok(None),
        }
    }

    /// Normalizes a group-attached config to a per-item row. Direct rows
    /// pass through untouched.
    pub async fn ensure_direct_config(
        &self,
        item: &priced_item::Model,
        config: &pricing_config::Model,
    ) -> Result<pricing_config::Model, ServiceError> {
        if config.item_id == item.id {
            return Ok(config.clone());
        }
        self.materialize_member_config(item, config).await
    }

    /// Copies a group parent's tunables into a fresh per-item config row.
    /// The member starts with clean bookkeeping: it has no automated moves
    /// of its own yet, so it behaves like a newly enabled item.
    async fn materialize_member_config(
        &self,
        item: &priced_item::Model,
        parent: &pricing_config::Model,
    ) -> Result<pricing_config::Model, ServiceError> {
        let now = Utc::now();
        let model = pricing_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            auto_pricing_enabled: Set(parent.auto_pricing_enabled),
            current_state: Set(AutomationState::Increasing),
            increment_percentage: Set(parent.increment_percentage),
            period_hours: Set(parent.period_hours),
            revenue_drop_threshold_percent: Set(parent.revenue_drop_threshold_percent),
            wait_hours_after_revert: Set(parent.wait_hours_after_revert),
            max_increase_percentage: Set(parent.max_increase_percentage),
            last_price_change_at: Set(None),
            next_eligible_change_at: Set(None),
            revert_wait_until: Set(None),
            pre_automation_price: Set(Some(item.current_price)),
            last_automation_price: Set(None),
            is_first_increase: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(
            item_id = %item.id,
            parent_item_id = %parent.item_id,
            "Materialized per-item pricing config for group member"
        );
        Ok(model)
    }

    /// Creates a config row from the configured defaults for an item that
    /// has never had automation, enabled and immediately eligible.
    pub async fn insert_default_config(
        &self,
        item: &priced_item::Model,
        now: DateTime<Utc>,
    ) -> Result<pricing_config::Model, ServiceError> {
        pricing_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            auto_pricing_enabled: Set(true),
            current_state: Set(AutomationState::Increasing),
            increment_percentage: Set(self.defaults.increment_percentage),
            period_hours: Set(self.defaults.period_hours),
            revenue_drop_threshold_percent: Set(self.defaults.revenue_drop_threshold_percent),
            wait_hours_after_revert: Set(self.defaults.wait_hours_after_revert),
            max_increase_percentage: Set(self.defaults.max_increase_percentage),
            last_price_change_at: Set(None),
            next_eligible_change_at: Set(Some(now)),
            revert_wait_until: Set(None),
            pre_automation_price: Set(Some(item.current_price)),
            last_automation_price: Set(None),
            is_first_increase: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::DatabaseError)
    }

    /// All (item, config) pairs of the store with automation on, with group
    /// attachment normalized away: a member item covered only by its group
    /// parent's enabled config gets its own materialized row, so every
    /// returned pair can be mutated independently.
    #[instrument(skip(self))]
    pub async fn normalized_enabled_pairs(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<(priced_item::Model, pricing_config::Model)>, ServiceError> {
        let items = priced_item::Entity::find()
            .filter(priced_item::Column::StoreId.eq(store_id))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let configs = pricing_config::Entity::find()
            .filter(pricing_config::Column::ItemId.is_in(item_ids))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let by_item: HashMap<Uuid, pricing_config::Model> = configs
            .into_iter()
            .map(|config| (config.item_id, config))
            .collect();

        let mut pairs = Vec::new();
        for item in &items {
            if let Some(config) = by_item.get(&item.id) {
                // A direct config always wins, even when disabled.
                if config.auto_pricing_enabled {
                    pairs.push((item.clone(), config.clone()));
                }
                continue;
            }

            let parent_config = match item.group_id.and_then(|parent| by_item.get(&parent)) {
                Some(config) if config.auto_pricing_enabled => config.clone(),
                _ => continue,
            };
            let materialized = self.materialize_member_config(item, &parent_config).await?;
            pairs.push((item.clone(), materialized));
        }
        Ok(pairs)
    }

    /// Items of the store that carry their own config with automation off;
    /// the target set for a store-wide enable.
    pub async fn disabled_configured_items(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<(priced_item::Model, pricing_config::Model)>, ServiceError> {
        let items = priced_item::Entity::find()
            .filter(priced_item::Column::StoreId.eq(store_id))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let configs = pricing_config::Entity::find()
            .filter(pricing_config::Column::ItemId.is_in(item_ids))
            .filter(pricing_config::Column::AutoPricingEnabled.eq(false))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let mut by_item: HashMap<Uuid, pricing_config::Model> = configs
            .into_iter()
            .map(|config| (config.item_id, config))
            .collect();

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let config = by_item.remove(&item.id)?;
                Some((item, config))
            })
            .collect())
    }

    /// Applies a partial tunables update to the config governing the item.
    /// A group-attached config is normalized to a per-item row first, so the
    /// patch never leaks to sibling items.
    pub async fn update_config(
        &self,
        item_id: Uuid,
        patch: ConfigPatch,
    ) -> Result<pricing_config::Model, ServiceError> {
        let item = self.get_item(item_id).await?;
        let shared = self
            .effective_config(&item)
            .await?
            .ok_or(ServiceError::MissingConfig(item_id))?;
        let config = self.ensure_direct_config(&item, &shared).await?;

        let mut config_am: pricing_config::ActiveModel = config.into();
        if let Some(value) = patch.increment_percentage {
            config_am.increment_percentage = Set(value);
        }
        if let Some(value) = patch.period_hours {
            config_am.period_hours = Set(value);
        }
        if let Some(value) = patch.revenue_drop_threshold_percent {
            config_am.revenue_drop_threshold_percent = Set(value);
        }
        if let Some(value) = patch.wait_hours_after_revert {
            config_am.wait_hours_after_revert = Set(value);
        }
        if let Some(value) = patch.max_increase_percentage {
            config_am.max_increase_percentage = Set(value);
        }
        config_am.updated_at = Set(Some(Utc::now()));
        config_am
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Claims the store's sweep lock: succeeds only when the store is
    /// unlocked or the previous claim has expired. The claim is a single
    /// conditional UPDATE, so two concurrent sweeps can never both win.
    pub async fn claim_sweep_lock(
        &self,
        store_id: Uuid,
        holder: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let expires_at = now + Duration::minutes(self.lock_timeout_minutes);
        let result = store::Entity::update_many()
            .col_expr(store::Column::SweepLockedBy, Expr::value(holder))
            .col_expr(store::Column::SweepLockExpiresAt, Expr::value(expires_at))
            .filter(store::Column::Id.eq(store_id))
            .filter(
                Condition::any()
                    .add(store::Column::SweepLockedBy.is_null())
                    .add(store::Column::SweepLockExpiresAt.lt(now)),
            )
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(result.rows_affected > 0)
    }

    /// Releases the sweep lock, but only for the holder that claimed it.
    pub async fn release_sweep_lock(
        &self,
        store_id: Uuid,
        holder: Uuid,
    ) -> Result<(), ServiceError> {
        store::Entity::update_many()
            .col_expr(store::Column::SweepLockedBy, Expr::value(Option::<Uuid>::None))
            .col_expr(
                store::Column::SweepLockExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(store::Column::Id.eq(store_id))
            .filter(store::Column::SweepLockedBy.eq(holder))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    /// `old_price` of the most recent `increase` record for the item; the
    /// revert target when present.
    pub async fn latest_increase_old_price(
        &self,
        item_id: Uuid,
    ) -> Result<Option<Decimal>, ServiceError> {
        let record = price_change::Entity::find()
            .filter(price_change::Column::ItemId.eq(item_id))
            .filter(price_change::Column::Action.eq(PriceAction::Increase))
            .order_by_desc(price_change::Column::CreatedAt)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(record.map(|record| record.old_price))
    }

    /// Price change rows for one item, newest first, paginated.
    pub async fn price_history(
        &self,
        item_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<price_change::Model>, u64), ServiceError> {
        let paginator = price_change::Entity::find()
            .filter(price_change::Column::ItemId.eq(item_id))
            .order_by_desc(price_change::Column::CreatedAt)
            .paginate(&*self.db_pool, limit.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let records = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok((records, total))
    }

    pub async fn insert_run(
        &self,
        run: pricing_run::ActiveModel,
    ) -> Result<pricing_run::Model, ServiceError> {
        run.insert(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Recent sweep summaries for one store, newest first.
    pub async fn recent_runs(
        &self,
        store_id: Uuid,
        limit: u64,
    ) -> Result<Vec<pricing_run::Model>, ServiceError> {
        pricing_run::Entity::find()
            .filter(pricing_run::Column::StoreId.eq(store_id))
            .order_by_desc(pricing_run::Column::StartedAt)
            .limit(limit.max(1))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
