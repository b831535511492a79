#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use repricer_api::config::AppConfig;
use repricer_api::db;
use repricer_api::entities::{
    price_change, priced_item, pricing_config, pricing_run, sale_record, store, AutomationState,
    PriceAction,
};
use repricer_api::errors::ServiceError;
use repricer_api::events::{self, EventSender};
use repricer_api::handlers::AppServices;
use repricer_api::services::storefront::StorefrontApi;
use repricer_api::AppState;

/// One price push observed by the fake storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePush {
    pub external_id: String,
    pub price: Decimal,
}

/// Storefront double that records every push and can be told to reject
/// specific listings.
#[derive(Default)]
pub struct RecordingStorefront {
    pushes: Mutex<Vec<PricePush>>,
    rejecting: Mutex<HashSet<String>>,
}

impl RecordingStorefront {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All pushes seen so far, in order.
    pub fn pushes(&self) -> Vec<PricePush> {
        self.pushes.lock().unwrap().clone()
    }

    /// Pushes for a single listing, in order.
    pub fn pushes_for(&self, external_id: &str) -> Vec<Decimal> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|push| push.external_id == external_id)
            .map(|push| push.price)
            .collect()
    }

    /// Makes every future push for this listing fail.
    pub fn reject(&self, external_id: &str) {
        self.rejecting.lock().unwrap().insert(external_id.to_string());
    }

    /// Clears a rejection set earlier with [`reject`](Self::reject).
    pub fn accept(&self, external_id: &str) {
        self.rejecting.lock().unwrap().remove(external_id);
    }
}

#[async_trait]
impl StorefrontApi for RecordingStorefront {
    async fn set_price(
        &self,
        _store: &store::Model,
        external_id: &str,
        price: Decimal,
    ) -> Result<(), ServiceError> {
        if self.rejecting.lock().unwrap().contains(external_id) {
            return Err(ServiceError::ExternalApiError(format!(
                "storefront rejected price update for {}",
                external_id
            )));
        }
        self.pushes.lock().unwrap().push(PricePush {
            external_id: external_id.to_string(),
            price,
        });
        Ok(())
    }
}

/// Field bundle for seeding a pricing config row. Start from one of the
/// constructors and override what the test cares about.
pub struct ConfigSeed {
    pub enabled: bool,
    pub state: AutomationState,
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
    pub is_first_increase: bool,
}

impl Default for ConfigSeed {
    fn default() -> Self {
        Self {
            enabled: true,
            state: AutomationState::Increasing,
            increment_percentage: dec!(5),
            period_hours: 24,
            revenue_drop_threshold_percent: dec!(10),
            wait_hours_after_revert: 72,
            max_increase_percentage: dec!(30),
            last_price_change_at: None,
            next_eligible_change_at: None,
            revert_wait_until: None,
            pre_automation_price: None,
            last_automation_price: None,
            is_first_increase: true,
        }
    }
}

impl ConfigSeed {
    /// Past the eligibility gate with the first increase already behind it,
    /// so the next sweep consults revenue.
    pub fn due_for_comparison() -> Self {
        Self {
            is_first_increase: false,
            last_price_change_at: Some(Utc::now() - Duration::hours(24)),
            next_eligible_change_at: Some(Utc::now() - Duration::minutes(5)),
            ..Self::default()
        }
    }

    /// Automation switched off with remembered prices, as after a manual
    /// disable partway through automation.
    pub fn disabled_with_prices(pre: Decimal, last: Option<Decimal>) -> Self {
        Self {
            enabled: false,
            pre_automation_price: Some(pre),
            last_automation_price: last,
            ..Self::default()
        }
    }
}

/// Test application backed by a throwaway SQLite database and the recording
/// storefront double.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub storefront: Arc<RecordingStorefront>,
    _db_dir: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("repricer_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let storefront = RecordingStorefront::new();
        let services = AppServices::with_storefront(
            db_arc.clone(),
            &cfg,
            Arc::new(event_sender.clone()),
            storefront.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", repricer_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            storefront,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_store(&self, auto_pricing_enabled: bool) -> store::Model {
        store::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Store".to_string()),
            storefront_domain: Set("test-store.example.com".to_string()),
            storefront_access_token: Set("token-test".to_string()),
            auto_pricing_enabled: Set(auto_pricing_enabled),
            sweep_locked_by: Set(None),
            sweep_lock_expires_at: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed store")
    }

    pub async fn seed_item(
        &self,
        store_id: Uuid,
        external_id: &str,
        price: Decimal,
    ) -> priced_item::Model {
        priced_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            group_id: Set(None),
            external_id: Set(external_id.to_string()),
            name: Set(format!("Item {}", external_id)),
            starting_price: Set(price),
            current_price: Set(price),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed item")
    }

    pub async fn seed_config(&self, item_id: Uuid, seed: ConfigSeed) -> pricing_config::Model {
        pricing_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item_id),
            auto_pricing_enabled: Set(seed.enabled),
            current_state: Set(seed.state),
            increment_percentage: Set(seed.increment_percentage),
            period_hours: Set(seed.period_hours),
            revenue_drop_threshold_percent: Set(seed.revenue_drop_threshold_percent),
            wait_hours_after_revert: Set(seed.wait_hours_after_revert),
            max_increase_percentage: Set(seed.max_increase_percentage),
            last_price_change_at: Set(seed.last_price_change_at),
            next_eligible_change_at: Set(seed.next_eligible_change_at),
            revert_wait_until: Set(seed.revert_wait_until),
            pre_automation_price: Set(seed.pre_automation_price),
            last_automation_price: Set(seed.last_automation_price),
            is_first_increase: Set(seed.is_first_increase),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed pricing config")
    }

    pub async fn seed_sale(
        &self,
        store_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        total: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> sale_record::Model {
        sale_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            item_id: Set(item_id),
            quantity: Set(quantity),
            total: Set(total),
            occurred_at: Set(occurred_at),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed sale record")
    }

    /// Seeds a historical automated increase, giving a later revert a price
    /// to walk back to.
    pub async fn seed_increase_record(
        &self,
        item_id: Uuid,
        old_price: Decimal,
        new_price: Decimal,
        ago: Duration,
    ) -> price_change::Model {
        price_change::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item_id),
            old_price: Set(old_price),
            new_price: Set(new_price),
            action: Set(PriceAction::Increase),
            reason: Set("seeded automated increase".to_string()),
            current_period_revenue: Set(None),
            previous_period_revenue: Set(None),
            change_percent: Set(None),
            created_at: Set(Utc::now() - ago),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed price change")
    }

    /// Overwrites an item's current price directly, as if earlier automated
    /// steps had already happened.
    pub async fn set_item_price(&self, item_id: Uuid, price: Decimal) -> priced_item::Model {
        let mut item: priced_item::ActiveModel = self.item_by_id(item_id).await.into();
        item.current_price = Set(price);
        item.update(self.state.db.as_ref())
            .await
            .expect("set item price")
    }

    pub async fn item_by_id(&self, id: Uuid) -> priced_item::Model {
        priced_item::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("query item")
            .expect("item exists")
    }

    pub async fn config_for(&self, item_id: Uuid) -> pricing_config::Model {
        pricing_config::Entity::find()
            .filter(pricing_config::Column::ItemId.eq(item_id))
            .one(self.state.db.as_ref())
            .await
            .expect("query pricing config")
            .expect("pricing config exists")
    }

    /// Price change rows for one item, oldest first.
    pub async fn price_changes(&self, item_id: Uuid) -> Vec<price_change::Model> {
        price_change::Entity::find()
            .filter(price_change::Column::ItemId.eq(item_id))
            .order_by_asc(price_change::Column::CreatedAt)
            .all(self.state.db.as_ref())
            .await
            .expect("query price changes")
    }

    /// Persisted sweep runs for one store, oldest first.
    pub async fn runs_for(&self, store_id: Uuid) -> Vec<pricing_run::Model> {
        pricing_run::Entity::find()
            .filter(pricing_run::Column::StoreId.eq(store_id))
            .order_by_asc(pricing_run::Column::StartedAt)
            .all(self.state.db.as_ref())
            .await
            .expect("query pricing runs")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be json")
}

/// Parses a JSON field as a decimal, so comparisons ignore trailing zeros.
pub fn decimal_field(value: &Value) -> Decimal {
    serde_json::from_value(value.clone()).expect("decimal field")
}
