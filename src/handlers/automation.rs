use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::toggles::{ResumeStrategy, ToggleOutcome};
use crate::services::undo::{UndoOutcome, UndoStatus};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body for the enable endpoints. The whole body may be omitted; the
/// strategy is only needed when the base and last automated prices differ.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "resume_strategy": "last" }))]
pub struct EnableRequest {
    /// `base` resumes from the pre-automation price, `last` from the price
    /// automation had last settled on
    pub resume_strategy: Option<ResumeStrategy>,
}

// Handler functions

/// Enable automated pricing for one item
#[utoipa::path(
    post,
    path = "/api/v1/items/{item_id}/pricing/enable",
    params(
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = EnableRequest,
    responses(
        (status = 200, description = "Applied, or a resume choice is required", body = crate::ApiResponse<crate::services::toggles::ToggleOutcome>),
        (status = 400, description = "Already enabled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn enable_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    body: Option<Json<EnableRequest>>,
) -> Result<Json<ApiResponse<ToggleOutcome>>, ServiceError> {
    let strategy = body.and_then(|Json(request)| request.resume_strategy);
    let outcome = state.services.toggles.enable_item(item_id, strategy).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Disable automated pricing for one item and restore its price
#[utoipa::path(
    post,
    path = "/api/v1/items/{item_id}/pricing/disable",
    params(
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Automation disabled", body = crate::ApiResponse<crate::services::toggles::ToggleOutcome>),
        (status = 400, description = "Already disabled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn disable_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ToggleOutcome>>, ServiceError> {
    let outcome = state.services.toggles.disable_item(item_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Enable automated pricing for every switched-off item of a store
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/pricing/enable",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    request_body = EnableRequest,
    responses(
        (status = 200, description = "Applied, or resume choices are required", body = crate::ApiResponse<crate::services::toggles::ToggleOutcome>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn enable_store(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    body: Option<Json<EnableRequest>>,
) -> Result<Json<ApiResponse<ToggleOutcome>>, ServiceError> {
    let strategy = body.and_then(|Json(request)| request.resume_strategy);
    let outcome = state
        .services
        .toggles
        .enable_store(store_id, strategy)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Disable automated pricing for every enabled item of a store
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/pricing/disable",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Automation disabled store-wide", body = crate::ApiResponse<crate::services::toggles::ToggleOutcome>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn disable_store(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ToggleOutcome>>, ServiceError> {
    let outcome = state.services.toggles.disable_store(store_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Whether the store's last toggle can still be undone
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_id}/pricing/undo",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Undo availability", body = crate::ApiResponse<crate::services::undo::UndoStatus>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn undo_status(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UndoStatus>>, ServiceError> {
    state.services.catalog.get_store(store_id).await?;
    let status = state.services.undo.status(store_id);
    Ok(Json(ApiResponse::success(status)))
}

/// Take back the store's last automation toggle
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/pricing/undo",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Toggle undone", body = crate::ApiResponse<crate::services::undo::UndoOutcome>),
        (status = 404, description = "No undo window is open", body = crate::errors::ErrorResponse),
        (status = 410, description = "The undo window has expired", body = crate::errors::ErrorResponse)
    ),
    tag = "Automation"
)]
async fn execute_undo(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UndoOutcome>>, ServiceError> {
    let outcome = state.services.undo.undo_last_toggle(store_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Toggle routes nested under `/items`
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/:item_id/pricing/enable", post(enable_item))
        .route("/:item_id/pricing/disable", post(disable_item))
}

/// Toggle and undo routes nested under `/stores`
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/:store_id/pricing/enable", post(enable_store))
        .route("/:store_id/pricing/disable", post(disable_store))
        .route(
            "/:store_id/pricing/undo",
            get(undo_status).post(execute_undo),
        )
}
