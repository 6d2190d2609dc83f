//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/health`: simple "healthy" + version (for load balancers)
//! - `/health/detailed`: store ping plus per-provider gateway health

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use bastion_core::Orchestrator;
use bastion_llm::ProviderStatus;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub store: ComponentHealth,
    pub providers: ProvidersHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
        }
    }
}

/// Gateway view of the configured providers
#[derive(Debug, Serialize)]
pub struct ProvidersHealth {
    pub status: &'static str,
    pub configured: usize,
    pub available: usize,
    pub details: Vec<ProviderStatus>,
}

impl ProvidersHealth {
    fn from_statuses(details: Vec<ProviderStatus>) -> Self {
        let configured = details.len();
        let available = details.iter().filter(|p| p.healthy).count();
        let status = if configured == 0 || available == 0 {
            "unhealthy"
        } else if available < configured {
            "degraded"
        } else {
            "healthy"
        };
        Self {
            status,
            configured,
            available,
            details,
        }
    }
}

/// Overall status from the component statuses
fn overall_status(store: &ComponentHealth, providers: &ProvidersHealth) -> &'static str {
    match (store.status, providers.status) {
        ("healthy", "healthy") => "healthy",
        ("healthy", _) => "degraded",
        _ => "unhealthy",
    }
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Detailed health check with store and provider status
async fn detailed_health_check(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
) -> Json<DetailedHealthResponse> {
    let start = Instant::now();
    let store = match orchestrator.store().ping().await {
        Ok(()) => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    };
    let providers = ProvidersHealth::from_statuses(orchestrator.gateway().provider_status());

    Json(DetailedHealthResponse {
        status: overall_status(&store, &providers),
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks { store, providers },
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}
