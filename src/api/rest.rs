use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::api::{client_key, AppState};
use crate::metrics;
use crate::store::StoredResult;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use rand::Rng;
use std::convert::Infallible;
use std::net::SocketAddr;

const PAYLOAD_CHUNK: usize = 64 * 1024;

pub(crate) async fn health_check() -> &'static str {
    "OK"
}

/// Pre-flight for a test. Only checks admission; the slot is taken when
/// the WebSocket session actually starts.
pub(crate) async fn start_test(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> ApiResult<Json<StartTestResponse>> {
    let client = client_key(&addr);
    if let Err(rejected) = state.admission.check(&client) {
        metrics::record_admission_rejected(rejected.reason());
        tracing::warn!(client = %client, reason = rejected.reason(), "Test start refused");
        return Err(rejected.into());
    }

    Ok(Json(StartTestResponse {
        test_id: uuid::Uuid::new_v4().to_string(),
        status: "started".to_string(),
    }))
}

fn random_payload(size: usize) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    futures::stream::unfold(size, |remaining| async move {
        if remaining == 0 {
            return None;
        }
        let n = remaining.min(PAYLOAD_CHUNK);
        let mut buf = vec![0u8; n];
        rand::thread_rng().fill(&mut buf[..]);
        Some((Ok(Bytes::from(buf)), remaining - n))
    })
}

pub(crate) async fn download(Query(query): Query<DownloadQuery>) -> ApiResult<Response> {
    let size = query.size.unwrap_or(DEFAULT_DOWNLOAD_SIZE);
    if size > MAX_DOWNLOAD_SIZE {
        return Err(ApiError::InvalidRequest(format!(
            "size {size} exceeds the {MAX_DOWNLOAD_SIZE} byte limit"
        )));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Body::from_stream(random_payload(size)),
    )
        .into_response())
}

pub(crate) async fn upload(body: Body) -> ApiResult<Json<UploadResponse>> {
    let mut stream = body.into_data_stream();
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload body: {e}")))?;
        bytes += chunk.len() as u64;
    }

    Ok(Json(UploadResponse { bytes }))
}

pub(crate) async fn list_active(State(state): State<AppState>) -> Json<ActiveTestsResponse> {
    let tests = state.orchestrator.list_active();
    Json(ActiveTestsResponse {
        count: tests.len(),
        tests,
    })
}

pub(crate) async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StoredResult>> {
    state
        .store
        .get_result(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("result {id}")))
}

pub(crate) async fn get_share(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<StoredResult>> {
    let mut stored = state
        .store
        .get_by_share_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("share {code}")))?;

    state.store.increment_share_views(&code).await?;
    stored.share_views += 1;
    Ok(Json(stored))
}
