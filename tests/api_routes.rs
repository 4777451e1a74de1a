//! REST surface driven through the router without a listener

mod common;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use speedcore::api::{create_api_server, AppState};
use speedcore::orchestrator::TestResult;
use speedcore::store::{hash_client_ip, ResultMeta, ResultStore};
use std::net::SocketAddr;
use tower::ServiceExt;

const PEER: &str = "192.0.2.10:40000";

fn router(state: AppState) -> Router {
    let peer: SocketAddr = PEER.parse().unwrap();
    create_api_server(state, "*").layer(MockConnectInfo(peer))
}

fn sample_result() -> TestResult {
    TestResult {
        download_mbps: 480.5,
        upload_mbps: 92.25,
        ping_ms: 7.5,
        jitter_ms: 0.5,
        packet_loss_pct: 0.0,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = router(common::test_state(&common::fast_config()));

    for uri in ["/health", "/api/v1/healthz"] {
        let (status, _, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }
}

#[tokio::test]
async fn test_start_does_not_hold_a_slot() {
    let state = common::test_state(&common::fast_config());
    let admission = state.admission.clone();
    let app = router(state);

    for _ in 0..2 {
        let (status, _, body) = send(&app, post("/api/v1/speedtest/start", Body::empty())).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "started");
        assert!(!json["test_id"].as_str().unwrap().is_empty());
    }
    assert_eq!(admission.total_active(), 0);
}

#[tokio::test]
async fn test_start_rejected_inside_spacing_window() {
    let state = common::test_state(&common::fast_config());
    let peer: SocketAddr = PEER.parse().unwrap();
    let client = hash_client_ip(&peer.ip().to_string());
    let _running = state.admission.try_admit(&client).unwrap();
    let app = router(state);

    let (status, headers, body) = send(&app, post("/api/v1/speedtest/start", Body::empty())).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=5).contains(&retry));

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "INTERVAL_TOO_SHORT");
    assert!(json["error"].as_str().unwrap().contains("interval"));
}

#[tokio::test]
async fn test_download_payload_size() {
    let app = router(common::test_state(&common::fast_config()));

    let (status, headers, body) = send(&app, get("/api/v1/speedtest/download?size=200000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(body.len(), 200_000);

    let (status, _, body) = send(&app, get("/api/v1/speedtest/download?size=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_download_size_limit() {
    let app = router(common::test_state(&common::fast_config()));
    let uri = format!("/api/v1/speedtest/download?size={}", 100 * 1024 * 1024 + 1);

    let (status, _, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_upload_counts_bytes() {
    let app = router(common::test_state(&common::fast_config()));
    let payload = vec![0xA5u8; 300_000];

    let (status, _, body) = send(&app, post("/api/v1/speedtest/upload", Body::from(payload))).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["bytes"], 300_000);
}

#[tokio::test]
async fn test_result_lookup() {
    let state = common::test_state(&common::fast_config());
    let store = state.store.clone();
    let app = router(state);

    let meta = ResultMeta {
        client_ip_hash: "hash".into(),
        user_agent: Some("integration".into()),
    };
    let id = store.save_result(sample_result(), &meta).await.unwrap();

    let (status, _, body) = send(&app, get(&format!("/api/v1/speedtest/result/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["download_mbps"], 480.5);
    assert_eq!(json["user_agent"], "integration");
    assert!(json.get("client_ip_hash").is_none());

    let (status, _, _) = send(&app, get("/api/v1/speedtest/result/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_lookup_counts_views() {
    let state = common::test_state(&common::fast_config());
    let store = state.store.clone();
    let app = router(state);

    let id = store
        .save_result(sample_result(), &ResultMeta::default())
        .await
        .unwrap();
    let code = store.issue_share_code(&id).await.unwrap();

    let uri = format!("/api/v1/share/{code}");
    let (status, _, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = send(&app, get(&uri)).await;

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["share_code"], code.as_str());
    assert_eq!(json["share_views"], 2);

    let (status, _, _) = send(&app, get("/api/v1/share/unknown0000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_share_page_and_cards() {
    let state = common::test_state(&common::fast_config());
    let store = state.store.clone();
    let app = router(state);

    let id = store
        .save_result(sample_result(), &ResultMeta::default())
        .await
        .unwrap();
    let code = store.issue_share_code(&id).await.unwrap();

    for prefix in ["/share", "/s"] {
        let (status, headers, body) = send(&app, get(&format!("{prefix}/{code}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains(&format!("/s/{code}.png")));
        assert!(html.contains("Download: 480.5 Mbps"));
    }

    let (status, headers, body) = send(&app, get(&format!("/s/{code}.png"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");

    let (status, headers, body) = send(&app, get(&format!("/share/{code}.svg"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");
    assert!(String::from_utf8(body).unwrap().contains("Download: 480.5 Mbps"));

    // two page views; card fetches are not counted
    let shared = store.get_by_share_code(&code).await.unwrap().unwrap();
    assert_eq!(shared.share_views, 2);

    for uri in ["/share/unknown0000", "/s/unknown0000.png", "/share/unknown0000.svg"] {
        let (status, _, _) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_active_listing_empty() {
    let app = router(common::test_state(&common::fast_config()));

    let (status, _, body) = send(&app, get("/api/v1/speedtest/active")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["count"], 0);
    assert_eq!(json["tests"].as_array().unwrap().len(), 0);
}
