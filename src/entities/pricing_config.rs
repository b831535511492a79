use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle state of automated pricing for one item.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum AutomationState {
    /// Normal operation. The next decision may raise the price.
    #[sea_orm(string_value = "Increasing")]
    Increasing,
    /// A revert happened and the item holds until `revert_wait_until`.
    #[sea_orm(string_value = "WaitingAfterRevert")]
    WaitingAfterRevert,
    /// The ceiling was reached. Sweeps never raise the price again;
    /// only disabling and re-enabling automation leaves this state.
    #[sea_orm(string_value = "AtMaxCap")]
    AtMaxCap,
}

/// Per-item automation settings and engine bookkeeping.
///
/// Exactly one row exists per priced item once automation has been enabled
/// at least once. `pre_automation_price` is captured when automation first
/// turns on and never overwritten while set; `last_automation_price` tracks
/// the most recent price the engine itself wrote.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "pricing_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub item_id: Uuid,

    pub auto_pricing_enabled: bool,
    pub current_state: AutomationState,

    pub increment_percentage: Decimal,
    pub period_hours: i32,
    pub revenue_drop_threshold_percent: Decimal,
    pub wait_hours_after_revert: i32,
    pub max_increase_percentage: Decimal,

    pub last_price_change_at: Option<DateTime<Utc>>,
    pub next_eligible_change_at: Option<DateTime<Utc>>,
    pub revert_wait_until: Option<DateTime<Utc>>,

    pub pre_automation_price: Option<Decimal>,
    pub last_automation_price: Option<Decimal>,

    /// True until the engine applies its first increase for this item.
    /// The first increase skips the revenue comparison entirely.
    pub is_first_increase: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::priced_item::Entity",
        from = "Column::ItemId",
        to = "super::priced_item::Column::Id"
    )]
    PricedItem,
}

impl Related<super::priced_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricedItem.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let active_model = self;
        Ok(active_model)
    }
}
