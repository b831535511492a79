//! Repricer API Library
//!
//! Automated pricing for storefront catalogs. The crate walks every item a
//! store has opted into automation, raises prices on a configurable cadence,
//! watches revenue across each change, and walks a price back when the revenue
//! comparison says the increase cost more than it earned.
//!
//! The main components are:
//! - Entities: database models for stores, items, pricing configuration and
//!   the pricing audit trail
//! - Services: the decision pipeline, the sweep orchestrator, automation
//!   toggles and the undo window
//! - Handlers: the HTTP surface on top of the services
//! - Events: broadcast of pricing outcomes to background consumers

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

use axum::{
    routing::get,
    Json,
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Standard envelope for all API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// The response data (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (if unsuccessful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Validation errors keyed by field (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
    /// Request metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

/// Metadata attached to API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Timestamp of the response
    pub timestamp: String,
}

impl ResponseMeta {
    /// Captures the request id from the current tracing scope.
    pub fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|id| id.as_str().to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Convenient alias for handler return types.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Builds the version 1 API router.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest(
            "/stores",
            handlers::pricing::store_routes().merge(handlers::automation::store_routes()),
        )
        .nest(
            "/items",
            handlers::pricing::item_routes().merge(handlers::automation::item_routes()),
        )
}

/// Reports the service name, version and build information.
async fn api_status() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "repricer-api",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("GIT_HASH").unwrap_or("unknown"),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "api_version": "v1",
        "status": "operational",
    }))
}

/// Liveness check that verifies database connectivity.
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let database = match state.db.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            crate::tracing::error!(error = %e, "Database health check failed");
            "unhealthy"
        }
    };

    Json(serde_json::json!({
        "status": if database == "healthy" { "ok" } else { "degraded" },
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use crate::tracing::{scope_request_id, RequestId};

    #[tokio::test]
    async fn success_response_carries_the_request_id() {
        let response = scope_request_id(RequestId::new("req-1234"), async {
            ApiResponse::success(42)
        })
        .await;

        assert!(response.success);
        assert_eq!(response.data, Some(42));
        let meta = response.meta.expect("meta should be captured");
        assert_eq!(meta.request_id.as_deref(), Some("req-1234"));
    }

    #[tokio::test]
    async fn error_response_has_no_data() {
        let response: ApiResponse<()> = ApiResponse::error("nope");

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn responses_outside_a_request_scope_have_no_request_id() {
        let response = ApiResponse::success("data");

        let meta = response.meta.expect("meta should be captured");
        assert!(meta.request_id.is_none());
    }
}

/// Commonly used imports for working with the crate.
pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::rate_limiter::*;
    pub use crate::services::*;
    pub use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};
}
