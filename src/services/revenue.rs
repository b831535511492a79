use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::sales_feed::SalesFeed;

/// Current-vs-previous-period revenue for one item. Derived on demand,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueComparison {
    pub current_period_revenue: Decimal,
    pub previous_period_revenue: Decimal,
    pub current_units: u32,
    pub previous_units: u32,
    pub change_percent: Decimal,
    pub has_sufficient_data: bool,
}

/// Compares revenue across two adjacent lookback windows of equal length.
pub struct RevenueComparator {
    feed: Arc<dyn SalesFeed>,
    min_sales_per_window: u32,
}

impl RevenueComparator {
    pub fn new(feed: Arc<dyn SalesFeed>, min_sales_per_window: u32) -> Self {
        Self {
            feed,
            min_sales_per_window,
        }
    }

    /// Sums `[now - period, now)` against `[now - 2*period, now - period)`.
    ///
    /// `has_sufficient_data` requires non-zero revenue in both windows and
    /// at least `min_sales_per_window` units in each, so a single outlier
    /// sale cannot masquerade as a trend. Read-only; safe to call again.
    #[instrument(skip(self))]
    pub async fn compare(
        &self,
        item_id: Uuid,
        period_hours: i32,
        now: DateTime<Utc>,
    ) -> Result<RevenueComparison, ServiceError> {
        let period = Duration::hours(i64::from(period_hours));
        let current_start = now - period;
        let previous_start = current_start - period;

        let current = self.feed.window_totals(item_id, current_start, now).await?;
        let previous = self
            .feed
            .window_totals(item_id, previous_start, current_start)
            .await?;

        let change_percent = if previous.revenue.is_zero() {
            Decimal::ZERO
        } else {
            (current.revenue - previous.revenue) / previous.revenue * dec!(100)
        };

        let has_sufficient_data = !current.revenue.is_zero()
            && !previous.revenue.is_zero()
            && current.units >= self.min_sales_per_window
            && previous.units >= self.min_sales_per_window;

        debug!(
            "Revenue comparison for item {}: current={} previous={} change={}% sufficient={}",
            item_id, current.revenue, previous.revenue, change_percent, has_sufficient_data
        );

        Ok(RevenueComparison {
            current_period_revenue: current.revenue,
            previous_period_revenue: previous.revenue,
            current_units: current.units,
            previous_units: previous.units,
            change_percent,
            has_sufficient_data,
        })
    }
}
