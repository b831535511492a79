use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Repricer API",
        version = "1.0.0",
        description = r#"
# Repricer API

Automated pricing for storefront catalogs: periodic sweeps that raise prices
step by step while revenue holds, revert them when it drops, and operator
controls to switch the automation on and off with a ten-minute undo window.

## How a sweep decides

For every item with automation enabled the engine compares revenue over the
last period against the period before it. Steady or insufficient data means
another increase (up to a per-item ceiling); a drop beyond the configured
threshold reverts the price to the level before the last increase and pauses
the item for a cool-down.

## Error Handling

Errors use consistent response bodies with appropriate HTTP status codes:

```json
{
  "error": "Conflict",
  "message": "A pricing sweep is already running for store ...",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

Notable statuses: `409` when a sweep is already running for the store,
`404` when no undo window is open, `410` when the undo window has expired.

## Pagination

List endpoints accept `page` and `per_page` query parameters
(defaults: 1 and 20).
        "#,
        contact(
            name = "Repricer Support"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Pricing", description = "Sweeps, run history, and pricing configuration"),
        (name = "Automation", description = "Enable/disable toggles and undo"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Pricing
        crate::handlers::pricing::run_sweep,
        crate::handlers::pricing::list_runs,
        crate::handlers::pricing::get_config,
        crate::handlers::pricing::update_config,
        crate::handlers::pricing::get_history,

        // Automation
        crate::handlers::automation::enable_item,
        crate::handlers::automation::disable_item,
        crate::handlers::automation::enable_store,
        crate::handlers::automation::disable_store,
        crate::handlers::automation::undo_status,
        crate::handlers::automation::execute_undo,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Pricing types
            crate::services::sweep::RunSummary,
            crate::handlers::pricing::RunHistoryEntry,
            crate::handlers::pricing::ConfigResponse,
            crate::handlers::pricing::UpdateConfigRequest,
            crate::handlers::pricing::PriceChangeEntry,

            // Automation types
            crate::handlers::automation::EnableRequest,
            crate::services::toggles::ResumeStrategy,
            crate::services::toggles::ResumeChoice,
            crate::services::toggles::ToggleOutcome,
            crate::services::undo::ToggleSnapshot,
            crate::services::undo::UndoTag,
            crate::services::undo::UndoStatus,
            crate::services::undo::UndoOutcome,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
