//! Shared fixtures for integration tests

use speedcore::api::{create_api_server, AppState};
use speedcore::config::SpeedcoreConfig;
use speedcore::store::{MemoryResultStore, ResultStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One-second phases over a small pool so a full session runs in ~2.5s
pub fn fast_config() -> SpeedcoreConfig {
    let mut config = SpeedcoreConfig::default();
    config.test.duration_secs = 1;
    config.test.worker_count = 2;
    config.test.chunk_size = 64 * 1024;
    config.test.latency_samples = 3;
    config.test.session_timeout_secs = 10;
    config.validate().unwrap();
    config
}

pub fn test_state(config: &SpeedcoreConfig) -> AppState {
    test_state_with_store(config, Arc::new(MemoryResultStore::new()))
}

/// Like [`test_state`], keeping a typed handle on the memory store
#[allow(dead_code)]
pub fn test_state_with_store(config: &SpeedcoreConfig, store: Arc<MemoryResultStore>) -> AppState {
    let store: Arc<dyn ResultStore> = store;
    AppState::from_config(config, store, CancellationToken::new()).unwrap()
}

/// Serve the API on an ephemeral local port
#[allow(dead_code)]
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = create_api_server(state, "*");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}
