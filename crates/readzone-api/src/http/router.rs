//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Operator routes live under
//! `/api/v1/admin/` and require the bearer token.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Drafts (caller-scoped)
        .route(
            "/drafts",
            post(handlers::draft::create_draft).get(handlers::draft::list_drafts),
        )
        .route("/drafts/expiring", get(handlers::draft::expiring_drafts))
        .route(
            "/drafts/{id}",
            get(handlers::draft::get_draft)
                .put(handlers::draft::update_draft)
                .delete(handlers::draft::delete_draft),
        )
        .route("/drafts/{id}/restore", post(handlers::draft::restore_draft))
        .route("/drafts/{id}/sync", post(handlers::draft::sync_draft))
        .route("/drafts/{id}/history", get(handlers::draft::draft_history))
        // Operator
        .route("/admin/sync/batch", post(handlers::admin::batch_sync))
        .route("/admin/sync/metrics", get(handlers::admin::sync_metrics))
        .route(
            "/admin/expiration-targets",
            get(handlers::admin::expiration_targets),
        )
        .route("/admin/notify", post(handlers::admin::notify))
        .route(
            "/admin/migration/status",
            get(handlers::admin::migration_status),
        )
        .route(
            "/admin/migration/validate",
            get(handlers::admin::migration_validate),
        )
        .route(
            "/admin/drafts/{id}/abandon",
            post(handlers::admin::abandon_draft),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness plus pool utilization (no auth required).
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let pools = state.db_pool.health();
    let stressed = pools.iter().any(|p| p.under_stress);
    axum::Json(serde_json::json!({
        "status": if stressed { "degraded" } else { "ok" },
        "version": env!("CARGO_PKG_VERSION"),
        "pools": pools,
    }))
}
