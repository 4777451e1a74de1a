//! HTTP and WebSocket surface
//!
//! The WebSocket route is the transport adapter for a live test: it turns
//! the orchestrator's progress events into JSON text frames. Everything
//! else is plain REST around admission and the result store, plus the
//! public share pages under `/share` and `/s`.

mod error;
mod rest;
mod share;
mod types;
mod websocket;

pub use error::{ApiError, ApiResult};
pub use types::*;
pub use websocket::speedtest_ws;

use crate::admission::AdmissionController;
use crate::config::{SpeedcoreConfig, TestConfig};
use crate::latency::LoopbackRoundTrip;
use crate::metrics::metrics_route;
use crate::orchestrator::{OrchestratorResult, OrchestratorSettings, TestOrchestrator};
use crate::store::{hash_client_ip, ResultStore};
use crate::transfer::SimulatedChannel;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state behind every route
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: TestOrchestrator,
    pub admission: AdmissionController,
    pub store: Arc<dyn ResultStore>,
    pub test: TestConfig,
    /// Server-wide token; every session runs under a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the in-process transfer channel and loopback prober from config
    pub fn from_config(
        config: &SpeedcoreConfig,
        store: Arc<dyn ResultStore>,
        shutdown: CancellationToken,
    ) -> OrchestratorResult<Self> {
        let orchestrator = TestOrchestrator::new(
            Arc::new(SimulatedChannel::new()),
            Arc::new(LoopbackRoundTrip::default()),
            store.clone(),
            OrchestratorSettings::from_config(&config.test),
        )?;

        Ok(Self {
            orchestrator,
            admission: AdmissionController::new(config.admission.limits()?),
            store,
            test: config.test.clone(),
            shutdown,
        })
    }
}

/// Admission key for a peer; raw addresses never leave the edge
pub(crate) fn client_key(addr: &SocketAddr) -> String {
    hash_client_ip(&addr.ip().to_string())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(AllowOrigin::exact(value)),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

/// Create the complete API server with REST and WebSocket routes
pub fn create_api_server(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(rest::health_check))
        .route("/metrics", metrics_route())
        .route("/api/v1/healthz", get(rest::health_check))
        .route("/api/v1/speedtest/start", post(rest::start_test))
        .route("/api/v1/speedtest/ws", get(speedtest_ws))
        .route("/api/v1/speedtest/download", get(rest::download))
        .route("/api/v1/speedtest/upload", post(rest::upload))
        .route("/api/v1/speedtest/active", get(rest::list_active))
        .route("/api/v1/speedtest/result/:id", get(rest::get_result))
        .route("/api/v1/share/:code", get(rest::get_share))
        .route("/share/:code", get(share::share_page))
        .route("/s/:code", get(share::share_page))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}
