use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// An item whose price the engine manages.
///
/// `starting_price` is the anchor for the maximum-increase ceiling and the
/// fallback revert target. `current_price` is the live price and always
/// mirrors what was last pushed to the storefront.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "priced_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub store_id: Uuid,

    /// Optional parent grouping (e.g. the product a variant belongs to).
    /// A member without its own pricing config falls back to the config
    /// attached to the parent item.
    pub group_id: Option<Uuid>,

    /// Identifier of the listing on the storefront platform.
    #[validate(length(min = 1, max = 255, message = "External ID must not be empty"))]
    pub external_id: String,

    #[validate(length(min = 1, max = 512, message = "Item name must not be empty"))]
    pub name: String,

    pub starting_price: Decimal,
    pub current_price: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    #[sea_orm(has_one = "super::pricing_config::Entity")]
    PricingConfig,
    #[sea_orm(has_many = "super::price_change::Entity")]
    PriceChanges,
    #[sea_orm(has_many = "super::sale_record::Entity")]
    SaleRecords,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::pricing_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricingConfig.def()
    }
}

impl Related<super::price_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceChanges.def()
    }
}

impl Related<super::sale_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleRecords.def()
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
