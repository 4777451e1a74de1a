use anyhow::Context;
use speedcore::api::{create_api_server, AppState};
use speedcore::config::SpeedcoreConfig;
use speedcore::metrics::{init_metrics, start_metrics_server};
use speedcore::store::{MemoryResultStore, ResultStore, SqliteResultStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// `database_url` value selecting the process-local store
const MEMORY_STORE: &str = "memory";

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("speedcore=info,tower_http=info")),
        )
        .init();

    let config = SpeedcoreConfig::from_env().context("failed to load configuration")?;

    if config.metrics.enabled {
        start_metrics_server(&config.metrics).context("failed to start metrics exporter")?;
    } else {
        init_metrics();
    }

    let store: Arc<dyn ResultStore> = if config.server.database_url == MEMORY_STORE {
        Arc::new(MemoryResultStore::new())
    } else {
        Arc::new(
            SqliteResultStore::new(&config.server.database_url)
                .await
                .with_context(|| format!("failed to open {}", config.server.database_url))?,
        )
    };

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(&config, store, shutdown.clone())
        .context("invalid test configuration")?;

    // Forget clients whose slots have been idle past the spacing window
    let admission = state.admission.clone();
    let prune_token = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            tokio::select! {
                _ = prune_token.cancelled() => break,
                _ = ticker.tick() => {
                    admission.prune_idle();
                }
            }
        }
    });

    let app = create_api_server(state, &config.server.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;

    tracing::info!(
        addr = %config.server.listen_addr,
        duration_secs = config.test.duration_secs,
        workers = config.test.worker_count,
        chunk_size = config.test.chunk_size,
        "speedcore server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await
    .context("server error")?;

    tracing::info!("speedcore server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested, cancelling running tests");
    shutdown.cancel();
}
