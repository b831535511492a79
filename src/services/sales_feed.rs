use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::sale_record;
use crate::errors::ServiceError;

/// Totals for one item over one half-open time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowTotals {
    pub revenue: Decimal,
    pub units: u32,
}

/// Read side of the sales feed: answers "revenue and unit count for item X
/// over [start, end)".
#[async_trait]
pub trait SalesFeed: Send + Sync {
    async fn window_totals(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WindowTotals, ServiceError>;
}

/// Sales feed backed by the `sale_records` table.
pub struct DbSalesFeed {
    db_pool: Arc<DbPool>,
}

impl DbSalesFeed {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SalesFeed for DbSalesFeed {
    #[instrument(skip(self))]
    async fn window_totals(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WindowTotals, ServiceError> {
        // Half-open window: start is included, end is not.
        let rows = sale_record::Entity::find()
            .filter(sale_record::Column::ItemId.eq(item_id))
            .filter(sale_record::Column::OccurredAt.gte(start))
            .filter(sale_record::Column::OccurredAt.lt(end))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut totals = WindowTotals::default();
        for row in rows {
            totals.revenue += row.total;
            totals.units += row.quantity.max(0) as u32;
        }
        Ok(totals)
    }
}
