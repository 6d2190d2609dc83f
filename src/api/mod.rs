//! HTTP API for Bastion
//!
//! Operational endpoints only; turns are driven by the workflow through the
//! library facade, not over HTTP.

pub mod health;
pub mod metrics;

use axum::Router;

pub use health::health_routes;
pub use metrics::metrics_routes;

/// Create the API router with all endpoints
///
/// Handlers expect an `Extension<Arc<Orchestrator>>` layer.
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(metrics_routes())
        .route("/", axum::routing::get(|| async { "Bastion" }))
}
