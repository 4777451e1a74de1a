use crate::admission::AdmissionGuard;
use crate::api::error::{ApiError, ApiResult};
use crate::api::types::TestStreamQuery;
use crate::api::{client_key, AppState};
use crate::metrics;
use crate::orchestrator::TestRequest;
use crate::progress::{ChannelSink, ProgressUpdate};
use crate::store::ResultMeta;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;

/// Events buffered between the session and a slow socket
const PROGRESS_BUFFER: usize = 64;

/// Admission-gated test stream. A rejected client gets 429 with
/// `Retry-After` and no upgrade.
pub async fn speedtest_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<TestStreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let client = client_key(&addr);
    let guard = state.admission.try_admit(&client).map_err(|rejected| {
        metrics::record_admission_rejected(rejected.reason());
        ApiError::from(rejected)
    })?;

    let request = TestRequest {
        params: state.test.phase_params(),
        share: query.wants_share(state.test.share_by_default),
        meta: ResultMeta {
            client_ip_hash: client,
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        },
    };

    Ok(ws.on_upgrade(move |socket| stream_test(socket, state, request, guard)))
}

async fn stream_test(
    socket: WebSocket,
    state: AppState,
    request: TestRequest,
    guard: AdmissionGuard,
) {
    let (sink, mut updates) = ChannelSink::channel(PROGRESS_BUFFER, state.test.emit_timeout());
    let cancel = state.shutdown.child_token();
    let (mut outgoing, mut incoming) = socket.split();

    let orchestrator = state.orchestrator.clone();
    let session_cancel = cancel.clone();
    let session = tokio::spawn(async move {
        orchestrator
            .run(request, Arc::new(sink), session_cancel)
            .await
    });

    let mut client_gone = false;
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => {
                    if send_json(&mut outgoing, &update).await.is_err() {
                        client_gone = true;
                        break;
                    }
                }
                // every sink handle dropped: the session has finished
                None => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    tracing::debug!(client = %guard.client_id(), "Client closed test stream");
                    client_gone = true;
                    break;
                }
                _ => {}
            },
        }
    }
    // Close the receiver before cancelling so the session reports a
    // disconnect rather than a server-side cancellation.
    drop(updates);
    if client_gone {
        cancel.cancel();
    }

    match session.await {
        Ok(Ok(done)) => {
            tracing::debug!(session_id = %done.session_id, result_id = %done.result_id, "Test stream finished");
        }
        Ok(Err(e)) => {
            let body = ApiError::from(e).body();
            if let Ok(json) = serde_json::to_string(&body) {
                let _ = outgoing.send(Message::Text(json)).await;
            }
        }
        Err(e) => tracing::error!(error = %e, "Test session task panicked"),
    }

    let _ = outgoing.send(Message::Close(None)).await;
    guard.release();
}

async fn send_json<S>(outgoing: &mut S, update: &ProgressUpdate) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(update) {
        Ok(json) => outgoing.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize progress update");
            Ok(())
        }
    }
}
