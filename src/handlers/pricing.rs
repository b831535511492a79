use super::common::PaginationParams;
use crate::entities::{price_change, pricing_config, pricing_run, AutomationState};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::catalog::ConfigPatch;
use crate::services::sweep::RunSummary;
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// One persisted sweep, as returned by the run history endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunHistoryEntry {
    pub run_id: Uuid,
    pub store_id: Uuid,
    pub items_processed: i32,
    pub increased: i32,
    pub reverted: i32,
    pub waiting: i32,
    pub skipped: i32,
    pub errors: Vec<String>,
    pub note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl From<pricing_run::Model> for RunHistoryEntry {
    fn from(model: pricing_run::Model) -> Self {
        Self {
            run_id: model.id,
            store_id: model.store_id,
            items_processed: model.items_processed,
            increased: model.items_increased,
            reverted: model.items_reverted,
            waiting: model.items_waiting,
            skipped: model.items_skipped,
            errors: serde_json::from_value(model.errors).unwrap_or_default(),
            note: model.note,
            started_at: model.started_at,
            duration_ms: model.duration_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfigResponse {
    pub item_id: Uuid,
    pub auto_pricing_enabled: bool,
    /// `Increasing`, `WaitingAfterRevert`, or `AtMaxCap`
    #[schema(value_type = String)]
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
    pub is_first_increase: bool,
}

impl From<pricing_config::Model> for ConfigResponse {
    fn from(model: pricing_config::Model) -> Self {
        Self {
            item_id: model.item_id,
            auto_pricing_enabled: model.auto_pricing_enabled,
            current_state: model.current_state,
            increment_percentage: model.increment_percentage,
            period_hours: model.period_hours,
            revenue_drop_threshold_percent: model.revenue_drop_threshold_percent,
            wait_hours_after_revert: model.wait_hours_after_revert,
            max_increase_percentage: model.max_increase_percentage,
            last_price_change_at: model.last_price_change_at,
            next_eligible_change_at: model.next_eligible_change_at,
            revert_wait_until: model.revert_wait_until,
            pre_automation_price: model.pre_automation_price,
            last_automation_price: model.last_automation_price,
            is_first_increase: model.is_first_increase,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "increment_percentage": "5",
    "period_hours": 24,
    "revenue_drop_threshold_percent": "10",
    "wait_hours_after_revert": 72,
    "max_increase_percentage": "30"
}))]
pub struct UpdateConfigRequest {
    /// Percentage applied per increase step
    #[validate(custom = "validate_positive_decimal")]
    pub increment_percentage: Option<Decimal>,
    /// Hours between evaluations of the item
    #[validate(range(min = 1))]
    pub period_hours: Option<i32>,
    /// Revenue drop (percent) that triggers a revert
    #[validate(custom = "validate_positive_decimal")]
    pub revenue_drop_threshold_percent: Option<Decimal>,
    /// Cool-down after a revert before increases resume
    #[validate(range(min = 1))]
    pub wait_hours_after_revert: Option<i32>,
    /// Ceiling as a percentage above the starting price
    #[validate(custom = "validate_positive_decimal")]
    pub max_increase_percentage: Option<Decimal>,
}

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("value must be positive".into());
        return Err(err);
    }
    Ok(())
}

/// One price change, as returned by the history endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PriceChangeEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// `increase` or `revert`
    pub action: String,
    pub reason: String,
    pub current_period_revenue: Option<Decimal>,
    pub previous_period_revenue: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<price_change::Model> for PriceChangeEntry {
    fn from(model: price_change::Model) -> Self {
        Self {
            id: model.id,
            item_id: model.item_id,
            old_price: model.old_price,
            new_price: model.new_price,
            action: model.action.to_string(),
            reason: model.reason,
            current_period_revenue: model.current_period_revenue,
            previous_period_revenue: model.previous_period_revenue,
            change_percent: model.change_percent,
            created_at: model.created_at,
        }
    }
}

// Handler functions

/// Run a pricing sweep over a store
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/pricing/sweep",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Sweep summary", body = crate::ApiResponse<crate::services::sweep::RunSummary>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "A sweep is already running for this store", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
async fn run_sweep(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunSummary>>, ServiceError> {
    let summary = state.services.sweep.run_pricing_sweep(store_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Recent sweep summaries for a store
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_id}/pricing/runs",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Recent runs, newest first", body = crate::ApiResponse<Vec<RunHistoryEntry>>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
async fn list_runs(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<Vec<RunHistoryEntry>>>, ServiceError> {
    state.services.catalog.get_store(store_id).await?;
    let runs = state
        .services
        .catalog
        .recent_runs(store_id, params.per_page)
        .await?;
    let entries: Vec<RunHistoryEntry> = runs.into_iter().map(RunHistoryEntry::from).collect();
    Ok(Json(ApiResponse::success(entries)))
}

/// Read the pricing config governing an item
#[utoipa::path(
    get,
    path = "/api/v1/items/{item_id}/pricing/config",
    params(
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Effective pricing config", body = crate::ApiResponse<ConfigResponse>),
        (status = 404, description = "Item or config not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
async fn get_config(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ConfigResponse>>, ServiceError> {
    let item = state.services.catalog.get_item(item_id).await?;
    let config = state
        .services
        .catalog
        .effective_config(&item)
        .await?
        .ok_or(ServiceError::MissingConfig(item_id))?;
    Ok(Json(ApiResponse::success(ConfigResponse::from(config))))
}

/// Update the pricing tunables of an item
#[utoipa::path(
    patch,
    path = "/api/v1/items/{item_id}/pricing/config",
    params(
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Updated config", body = crate::ApiResponse<ConfigResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item or config not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
async fn update_config(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateConfigRequest>,
) -> Result<Json<ApiResponse<ConfigResponse>>, ServiceError> {
    request.validate()?;

    let patch = ConfigPatch {
        increment_percentage: request.increment_percentage,
        period_hours: request.period_hours,
        revenue_drop_threshold_percent: request.revenue_drop_threshold_percent,
        wait_hours_after_revert: request.wait_hours_after_revert,
        max_increase_percentage: request.max_increase_percentage,
    };
    let config = state.services.catalog.update_config(item_id, patch).await?;
    Ok(Json(ApiResponse::success(ConfigResponse::from(config))))
}

/// Price change history for an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/items/{item_id}/pricing/history",
    params(
        ("item_id" = Uuid, Path, description = "Item ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Price changes", body = crate::ApiResponse<crate::PaginatedResponse<PriceChangeEntry>>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
async fn get_history(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<crate::PaginatedResponse<PriceChangeEntry>>>, ServiceError> {
    state.services.catalog.get_item(item_id).await?;

    let page = params.page;
    let limit = params.per_page.max(1);
    let (records, total) = state
        .services
        .catalog
        .price_history(item_id, page, limit)
        .await?;

    let response = crate::PaginatedResponse {
        items: records.into_iter().map(PriceChangeEntry::from).collect(),
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    };
    Ok(Json(ApiResponse::success(response)))
}

/// Sweep and run-history routes nested under `/stores`
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/:store_id/pricing/sweep", post(run_sweep))
        .route("/:store_id/pricing/runs", get(list_runs))
}

/// Config and history routes nested under `/items`
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:item_id/pricing/config",
            get(get_config).patch(update_config),
        )
        .route("/:item_id/pricing/history", get(get_history))
}
