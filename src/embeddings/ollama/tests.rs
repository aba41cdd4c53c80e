use super::*;
use crate::config::{MAX_RETRY_ATTEMPTS, OllamaConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OllamaConfig {
    let url = Url::parse(&server.uri()).expect("mock server uri should parse");
    OllamaConfig {
        protocol: "http".to_string(),
        host: url.host_str().unwrap_or("127.0.0.1").to_string(),
        port: url.port().unwrap_or(80),
        model: "all-minilm".to_string(),
        batch_size: 2,
        ..OllamaConfig::default()
    }
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);

    let client = client.with_retry_attempts(70);
    assert_eq!(client.retry_attempts, MAX_RETRY_ATTEMPTS);
}

#[test]
fn retry_delay_grows_and_saturates() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_retry_base_delay(Duration::from_millis(100));

    assert_eq!(client.retry_delay(1), Duration::from_millis(100));
    assert_eq!(client.retry_delay(3), Duration::from_millis(400));
    assert_eq!(client.retry_delay(20), MAX_RETRY_DELAY);
    assert_eq!(client.retry_delay(70), MAX_RETRY_DELAY);
    assert_eq!(client.retry_delay(u32::MAX), MAX_RETRY_DELAY);
}

#[tokio::test]
async fn batches_requests_and_preserves_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["one", "two"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["three"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server)).expect("Failed to create client");
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

    let embeddings = tokio::task::spawn_blocking(move || client.encode(&texts))
        .await
        .expect("task should not panic")
        .expect("embedding should succeed");

    assert_eq!(
        embeddings,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server)).expect("Failed to create client");
    let texts = vec!["one".to_string(), "two".to_string()];

    let result = tokio::task::spawn_blocking(move || client.encode(&texts))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server))
        .expect("Failed to create client")
        .with_retry_attempts(3)
        .with_retry_base_delay(Duration::from_millis(1));

    let result = tokio::task::spawn_blocking(move || client.encode_one("hello"))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test]
async fn server_errors_retry_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server))
        .expect("Failed to create client")
        .with_retry_attempts(3)
        .with_retry_base_delay(Duration::from_millis(1));

    let result = tokio::task::spawn_blocking(move || client.encode_one("hello"))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test]
async fn health_check_accepts_implicit_latest_tag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "all-minilm:latest", "size": 45_000_000 }]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server)).expect("Failed to create client");
    let result = tokio::task::spawn_blocking(move || client.load())
        .await
        .expect("task should not panic");

    assert!(result.is_ok());
}

#[tokio::test]
async fn health_check_reports_missing_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "nomic-embed-text:latest" }]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server)).expect("Failed to create client");
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}
