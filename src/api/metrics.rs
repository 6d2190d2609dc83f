//! Metrics and alert endpoints
//!
//! - `GET /metrics?hours=N`: system metrics over the last N hours (default 24)
//! - `GET /alerts`: unresolved alerts, newest first
//! - `POST /alerts/:id/resolve`: mark an alert resolved

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bastion_core::{Alert, Orchestrator, SystemMetrics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Query for `/metrics`
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub hours: Option<u32>,
}

/// `/alerts` response
#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub count: usize,
    pub alerts: Vec<Alert>,
}

/// `/alerts/:id/resolve` response
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub id: String,
    pub resolved: bool,
}

async fn system_metrics(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
    Query(query): Query<MetricsQuery>,
) -> Json<SystemMetrics> {
    let hours = query.hours.unwrap_or(DEFAULT_WINDOW_HOURS);
    debug!(hours, "Metrics snapshot requested");
    Json(orchestrator.metrics().system_metrics(hours).await)
}

async fn active_alerts(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
) -> Json<AlertsResponse> {
    let alerts = orchestrator.metrics().active_alerts().await;
    Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    })
}

async fn resolve_alert(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Response {
    let resolved = orchestrator.metrics().resolve_alert(&id).await;
    let status = if resolved {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(ResolveResponse { id, resolved })).into_response()
}

/// Create metrics and alert routes
pub fn metrics_routes() -> Router {
    Router::new()
        .route("/metrics", get(system_metrics))
        .route("/alerts", get(active_alerts))
        .route("/alerts/:id/resolve", post(resolve_alert))
}
