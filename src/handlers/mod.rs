pub mod automation;
pub mod common;
pub mod pricing;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::rate_limiter::StorefrontThrottle;
use crate::services::applier::PriceApplier;
use crate::services::catalog::CatalogService;
use crate::services::revenue::RevenueComparator;
use crate::services::sales_feed::DbSalesFeed;
use crate::services::storefront::{HttpStorefrontClient, StorefrontApi, ThrottledStorefront};
use crate::services::sweep::SweepService;
use crate::services::toggles::ToggleService;
use crate::services::undo::{UndoLedger, UndoService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates the pricing engine used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub sweep: SweepService,
    pub toggles: ToggleService,
    pub undo: UndoService,
    /// Shared handle to the undo ledger backing `toggles` and `undo`.
    pub undo_ledger: Arc<UndoLedger>,
}

impl AppServices {
    /// Builds the full service graph against the real storefront client.
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
    ) -> Result<Self, ServiceError> {
        let client = HttpStorefrontClient::from_config(config)?;
        let throttle = StorefrontThrottle::new(
            config.storefront_rate_limit_per_sec,
            config.storefront_rate_limit_burst,
        );
        let storefront: Arc<dyn StorefrontApi> =
            Arc::new(ThrottledStorefront::new(Arc::new(client), throttle));
        Ok(Self::with_storefront(
            db_pool,
            config,
            event_sender,
            storefront,
        ))
    }

    /// Same wiring with a caller-supplied storefront client. Tests inject
    /// their fake through here; everything downstream is shared with `new`.
    pub fn with_storefront(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        storefront: Arc<dyn StorefrontApi>,
    ) -> Self {
        let catalog = CatalogService::new(db_pool.clone(), config);
        let feed = Arc::new(DbSalesFeed::new(db_pool.clone()));
        let comparator = Arc::new(RevenueComparator::new(feed, config.min_sales_per_window));
        let applier = Arc::new(PriceApplier::new(
            db_pool.clone(),
            storefront.clone(),
            Some(event_sender.clone()),
        ));
        // One ledger shared by the toggles that register undo states and the
        // undo service that consumes them.
        let ledger = Arc::new(UndoLedger::new());

        let sweep = SweepService::new(
            catalog.clone(),
            comparator,
            applier,
            Some(event_sender.clone()),
        );
        let toggles = ToggleService::new(
            db_pool.clone(),
            catalog.clone(),
            storefront.clone(),
            ledger.clone(),
            Some(event_sender.clone()),
        );
        let undo = UndoService::new(
            db_pool,
            catalog.clone(),
            storefront,
            ledger.clone(),
            Some(event_sender),
        );

        Self {
            catalog,
            sweep,
            toggles,
            undo,
            undo_ledger: ledger,
        }
    }
}
