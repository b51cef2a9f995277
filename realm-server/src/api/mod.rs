//! HTTP status API
//!
//! Read-only view of the running server, separate from the game port.
//!
//! ```text
//! GET /health        liveness + version
//! GET /metrics       Prometheus text
//! GET /metrics/json  same counters as JSON
//! GET /world         live WorldSnapshot
//! ```

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ecs_bridge::{SharedWorldSnapshot, WorldSnapshot};
use crate::metrics::ServerMetrics;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Snapshot of the live world, republished every tick
    pub world_snapshot: SharedWorldSnapshot,
    pub metrics: Arc<ServerMetrics>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn world_handler(State(state): State<ApiState>) -> Json<WorldSnapshot> {
    let snap = state
        .world_snapshot
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    Json(snap)
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .route("/world", get(world_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the status API on `0.0.0.0:port` until the runtime stops.
pub async fn start_api_server(
    world_snapshot: SharedWorldSnapshot,
    metrics: Arc<ServerMetrics>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(ApiState {
        world_snapshot,
        metrics,
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
