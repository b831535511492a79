use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A storefront whose items are managed by the pricing engine.
///
/// `sweep_locked_by` and `sweep_lock_expires_at` form the sweep mutex:
/// a sweep claims the row before touching any item and releases it when done.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Store name must not be empty"))]
    pub name: String,

    pub storefront_domain: String,

    #[serde(skip_serializing)]
    pub storefront_access_token: String,

    /// Store-wide kill switch. When false, sweeps return an empty summary.
    pub auto_pricing_enabled: bool,

    pub sweep_locked_by: Option<Uuid>,
    pub sweep_lock_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::priced_item::Entity")]
    PricedItems,
    #[sea_orm(has_many = "super::pricing_run::Entity")]
    PricingRuns,
}

impl Related<super::priced_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricedItems.def()
    }
}

impl Related<super::pricing_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricingRuns.def()
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
