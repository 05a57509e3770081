//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check (unauthenticated, for load balancers / probes)
        .route("/v1/health", get(handlers::health))
        // Upload control plane
        .route("/v1/uploads", post(handlers::init_upload))
        .route("/v1/uploads/{upload_id}", get(handlers::upload_status))
        .route(
            "/v1/uploads/{upload_id}/chunks/{index}",
            put(handlers::upload_chunk),
        )
        .route(
            "/v1/uploads/{upload_id}/complete",
            post(handlers::complete_upload),
        );

    // Conditionally expose metrics based on config. Restrict this endpoint
    // to the scrapers' network when enabled.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
