use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a price change did to the price.
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
pub enum PriceAction {
    #[sea_orm(string_value = "increase")]
    #[strum(serialize = "increase")]
    Increase,
    #[sea_orm(string_value = "revert")]
    #[strum(serialize = "revert")]
    Revert,
}

/// Append-only audit row for every price the engine (or a toggle) wrote.
///
/// The revenue columns are populated only when the decision consulted a
/// revenue comparison; first increases and data-starved increases leave
/// them null.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_changes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub item_id: Uuid,

    pub old_price: Decimal,
    pub new_price: Decimal,

    pub action: PriceAction,
    pub reason: String,

    pub current_period_revenue: Option<Decimal>,
    pub previous_period_revenue: Option<Decimal>,
    pub change_percent: Option<Decimal>,

    pub created_at: DateTime<Utc>,
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
