use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed sale of an item, the raw input to revenue comparisons.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub store_id: Uuid,
    pub item_id: Uuid,

    pub quantity: i32,

    /// Revenue for the sale, quantity already included.
    pub total: Decimal,

    pub occurred_at: DateTime<Utc>,
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
