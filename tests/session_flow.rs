//! End-to-end test sessions over a real WebSocket

mod common;

use futures::StreamExt;
use speedcore::progress::{ProgressUpdate, Stage};
use speedcore::store::{MemoryResultStore, ResultStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{self, Message};

/// Everything the server sent before closing: progress updates and the
/// optional error frame
struct Transcript {
    updates: Vec<ProgressUpdate>,
    error: Option<serde_json::Value>,
}

async fn run_client(addr: SocketAddr, query: &str) -> Transcript {
    let url = format!("ws://{addr}/api/v1/speedtest/ws{query}");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url).await.unwrap();

    let mut transcript = Transcript {
        updates: Vec::new(),
        error: None,
    };

    let read = async {
        while let Some(frame) = ws.next().await {
            match frame.unwrap() {
                Message::Text(text) => match serde_json::from_str::<ProgressUpdate>(&text) {
                    Ok(update) => transcript.updates.push(update),
                    Err(_) => transcript.error = Some(serde_json::from_str(&text).unwrap()),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(20), read)
        .await
        .expect("session did not finish in time");

    transcript
}

/// Pull `(result id, share code)` out of the completion message
fn parse_complete(message: &str) -> (String, Option<String>) {
    let inner = message
        .trim_start_matches("Test complete (")
        .trim_end_matches(')');
    let mut parts = inner.split(", ");
    let id = parts.next().unwrap().trim_start_matches("result ").to_string();
    let share = parts.next().map(|p| p.trim_start_matches("share ").to_string());
    (id, share)
}

#[tokio::test]
async fn test_full_session_over_websocket() {
    let state = common::test_state(&common::fast_config());
    let store: Arc<dyn ResultStore> = state.store.clone();
    let admission = state.admission.clone();
    let addr = common::spawn_server(state).await;

    let transcript = run_client(addr, "").await;
    println!("✓ Received {} progress updates", transcript.updates.len());

    assert!(transcript.error.is_none());
    let updates = &transcript.updates;
    assert!(updates.windows(2).all(|w| w[0].stage <= w[1].stage));
    for stage in [Stage::Latency, Stage::Download, Stage::Upload] {
        let progress: Vec<f64> = updates
            .iter()
            .filter(|u| u.stage == stage)
            .map(|u| u.progress)
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{stage} went backwards");
        assert_eq!(progress.last().copied(), Some(1.0));
    }

    let complete = updates.last().unwrap();
    assert_eq!(complete.stage, Stage::Complete);
    assert_eq!(updates.iter().filter(|u| u.is_terminal()).count(), 1);

    let (id, share) = parse_complete(&complete.message);
    let stored = store.get_result(&id).await.unwrap().expect("result stored");
    assert!(stored.result.download_mbps > 0.0);
    assert!(stored.result.upload_mbps > 0.0);

    // shared by default
    let code = share.expect("share code issued");
    let shared = store.get_by_share_code(&code).await.unwrap().unwrap();
    assert_eq!(shared.id, id);

    // the slot is released once the stream ends
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(admission.total_active(), 0);
}

#[tokio::test]
async fn test_session_without_share() {
    let state = common::test_state(&common::fast_config());
    let store = state.store.clone();
    let addr = common::spawn_server(state).await;

    let transcript = run_client(addr, "?share=false").await;
    let complete = transcript.updates.last().unwrap();
    let (id, share) = parse_complete(&complete.message);

    assert!(share.is_none());
    let stored = store.get_result(&id).await.unwrap().unwrap();
    assert!(stored.share_code.is_none());
}

#[tokio::test]
async fn test_second_concurrent_session_rejected() {
    let mut config = common::fast_config();
    config.admission.max_concurrent_per_client = 1;
    config.admission.min_interval_secs = 0;
    let addr = common::spawn_server(common::test_state(&config)).await;

    let first = tokio::spawn(run_client(addr, ""));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let url = format!("ws://{addr}/api/v1/speedtest/ws");
    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 429);
            assert!(response.headers().contains_key("retry-after"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second concurrent session was admitted"),
    }

    let transcript = first.await.unwrap();
    assert_eq!(transcript.updates.last().unwrap().stage, Stage::Complete);
}

#[tokio::test]
async fn test_shutdown_cancels_running_session() {
    let state = common::test_state(&common::fast_config());
    let shutdown = state.shutdown.clone();
    let store = state.store.clone();
    let addr = common::spawn_server(state).await;

    let client = tokio::spawn(run_client(addr, ""));
    tokio::time::sleep(Duration::from_millis(1200)).await;
    shutdown.cancel();

    let transcript = client.await.unwrap();
    let error = transcript.error.expect("error frame sent");
    assert_eq!(error["code"], "CANCELLED");
    assert!(transcript.updates.iter().all(|u| u.stage != Stage::Complete));
    assert!(store.get_by_share_code("anything").await.unwrap().is_none());
}

#[tokio::test]
async fn test_share_unless_explicitly_false() {
    let state = common::test_state(&common::fast_config());
    let addr = common::spawn_server(state).await;

    let transcript = run_client(addr, "?share=no").await;
    let (_, share) = parse_complete(&transcript.updates.last().unwrap().message);
    assert!(share.is_some());
}

#[tokio::test]
async fn test_client_disconnect_discards_session() {
    let store = Arc::new(MemoryResultStore::new());
    let state = common::test_state_with_store(&common::fast_config(), store.clone());
    let admission = state.admission.clone();
    let orchestrator = state.orchestrator.clone();
    let addr = common::spawn_server(state).await;

    let url = format!("ws://{addr}/api/v1/speedtest/ws");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url).await.unwrap();

    let first_download = async {
        while let Some(frame) = ws.next().await {
            if let Message::Text(text) = frame.unwrap() {
                let update: ProgressUpdate = serde_json::from_str(&text).unwrap();
                if update.stage == Stage::Download {
                    return;
                }
            }
        }
        panic!("stream ended before the download phase");
    };
    tokio::time::timeout(Duration::from_secs(5), first_download)
        .await
        .expect("no download update received");
    assert_eq!(orchestrator.active_count(), 1);

    // hang up without a close handshake
    drop(ws);

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(admission.total_active(), 0);
    assert_eq!(orchestrator.active_count(), 0);
    assert!(store.is_empty());

    // well past the point the session would have finished
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(store.is_empty());
    println!("✓ Disconnected session left no result behind");
}
