use super::*;
use crate::answer::Answerer;
use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::service::ServiceOptions;
use crate::test_support::{CharEmbedder, EchoAnswerer, StaticSource};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, header};
use std::time::Duration;
use tower::ServiceExt;

fn service_with(answerer: EchoAnswerer) -> Arc<RetrievalService> {
    Arc::new(RetrievalService::new(
        Arc::new(CharEmbedder::default()) as Arc<dyn Embedder>,
        Arc::new(answerer) as Arc<dyn Answerer>,
        ServiceOptions {
            chunking: ChunkingConfig::new(4, 3),
            ..ServiceOptions::default()
        },
    ))
}

async fn initialized(service: Arc<RetrievalService>, source: StaticSource) -> Arc<RetrievalService> {
    // Failures are inspected through the status snapshot
    let _ = Arc::clone(&service)
        .initialize(Arc::new(source), Duration::from_secs(5))
        .await;
    service
}

async fn ready_service() -> Arc<RetrievalService> {
    initialized(
        service_with(EchoAnswerer::default()),
        StaticSource::new(&["ABCDEFGHIJ"]),
    )
    .await
}

fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("request should build")
}

async fn send(service: Arc<RetrievalService>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router(service)
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn chat_answers_when_ready() {
    let (status, body) = send(ready_service().await, chat_request(r#"{"message":"DEFG"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "DEFG");
    let confidence = body["confidence"].as_f64().expect("confidence is a number");
    assert!((confidence - 0.75).abs() < 1e-6);
}

#[tokio::test]
async fn chat_rejects_missing_or_empty_message() {
    let service = ready_service().await;

    for payload in [r"{}", r#"{"message":""}"#, r#"{"message":"   "}"#] {
        let (status, body) = send(Arc::clone(&service), chat_request(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "No message provided");
    }
}

#[tokio::test]
async fn chat_rejects_malformed_body() {
    let service = ready_service().await;

    for payload in ["not json", r#"{"message": 42}"#, ""] {
        let (status, body) = send(Arc::clone(&service), chat_request(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload:?}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn chat_is_unavailable_before_initialization() {
    let service = service_with(EchoAnswerer::default());

    let (status, body) = send(service, chat_request(r#"{"message":"DEFG"}"#)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_started");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn chat_is_unavailable_after_failed_initialization() {
    let source = StaticSource {
        fail: true,
        ..StaticSource::default()
    };
    let service = initialized(service_with(EchoAnswerer::default()), source).await;

    let (status, body) = send(service, chat_request(r#"{"message":"DEFG"}"#)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn chat_reports_upstream_failures() {
    let answerer = EchoAnswerer {
        fail_answer: true,
        ..EchoAnswerer::default()
    };
    let service = initialized(service_with(answerer), StaticSource::new(&["ABCDEFGHIJ"])).await;

    let (status, body) = send(service, chat_request(r#"{"message":"DEFG"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .is_some_and(|e| e.contains("answer model crashed"))
    );
}

#[tokio::test]
async fn health_reports_each_state() {
    let fresh = service_with(EchoAnswerer::default());
    let health = || {
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request should build")
    };

    let (status, body) = send(Arc::clone(&fresh), health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_started");
    assert!(body["message"].is_string());
    assert!(body["updated_at"].is_string());

    let (status, body) = send(ready_service().await, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["message"], "Knowledge base ready with 4 chunks");

    let failed = initialized(
        service_with(EchoAnswerer::default()),
        StaticSource::new(&[""]),
    )
    .await;
    let (status, body) = send(failed, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .expect("request should build");

    let response = router(ready_service().await)
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let request = Request::builder()
        .uri("/missing")
        .body(Body::empty())
        .expect("request should build");

    let (status, body) = send(ready_service().await, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
