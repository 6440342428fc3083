#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama embedding backend against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use rag_store::config::{Config, EmbeddingBackend, EmbeddingConfig, OllamaConfig};
use rag_store::embeddings::{Chunk, Embedder, OllamaClient};
use rag_store::index::Metric;
use rag_store::store::RagStore;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TEST_MODEL: &str = "test-embed:latest";

/// Answers `/api/embed` with letter-count vectors, one per input
struct LetterCountEmbeddings;

impl Respond for LetterCountEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request is JSON");
        assert_eq!(body["model"], TEST_MODEL);

        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .expect("input is an array")
            .iter()
            .map(|text| {
                let text = text.as_str().expect("input items are strings");
                let count = |letter: char| text.chars().filter(|c| *c == letter).count() as f32;
                vec![count('a'), count('b'), count('c'), 0.1]
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

fn config_for(server: &MockServer, batch_size: u32) -> Config {
    let address = server.address();
    Config {
        embedding: EmbeddingConfig {
            backend: EmbeddingBackend::Ollama,
            ..EmbeddingConfig::default()
        },
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: address.ip().to_string(),
            port: address.port(),
            model: TEST_MODEL.to_string(),
            batch_size,
        },
        ..Config::default()
    }
}

fn client_for(server: &MockServer, batch_size: u32) -> OllamaClient {
    OllamaClient::new(&config_for(server, batch_size))
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn embeddings_are_requested_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LetterCountEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let vectors = tokio::task::spawn_blocking(move || {
        let texts: Vec<String> = ["a", "bb", "ccc", "ab", "abc"]
            .iter()
            .map(|text| (*text).to_string())
            .collect();
        client.embed_batch(&texts)
    })
    .await
    .expect("task completes")
    .expect("embedding succeeds");

    assert_eq!(vectors.len(), 5);
    assert_eq!(vectors[2], vec![0.0, 0.0, 3.0, 0.1]);
    assert_eq!(vectors[4], vec![1.0, 1.0, 1.0, 0.1]);
}

#[tokio::test]
async fn store_ingests_and_queries_through_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LetterCountEmbeddings)
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let hits = tokio::task::spawn_blocking(move || {
        let store = RagStore::open(Arc::new(client), None, Metric::Cosine)?;
        store.ingest(vec![
            Chunk::new("aaaa", "a.txt"),
            Chunk::new("bbbb", "b.txt"),
            Chunk::new("cccc", "c.txt"),
        ])?;
        store.query("bbb", 2)
    })
    .await
    .expect("task completes")
    .expect("query succeeds");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.source, "b.txt");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 16).with_retry_attempts(2);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("task completes");

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

    let client = client_for(&server, 16).with_retry_attempts(3);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("task completes");

    assert!(result.is_err());
}

#[tokio::test]
async fn short_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let result = tokio::task::spawn_blocking(move || {
        client.embed_batch(&["one".to_string(), "two".to_string()])
    })
    .await
    .expect("task completes");

    assert!(result.is_err());
}

#[tokio::test]
async fn health_check_requires_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": TEST_MODEL, "size": 45_000_000 },
                { "name": "llama3:latest" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let missing = OllamaClient::new(&Config {
        ollama: OllamaConfig {
            model: "absent:latest".to_string(),
            ..config_for(&server, 16).ollama
        },
        ..Config::default()
    })
    .expect("Failed to create Ollama client");

    let (healthy, unhealthy) =
        tokio::task::spawn_blocking(move || (client.health_check(), missing.health_check()))
            .await
            .expect("task completes");

    assert!(healthy.is_ok(), "health check failed: {:?}", healthy);
    let message = format!("{:#}", unhealthy.expect_err("absent model is reported"));
    assert!(message.contains("absent:latest"), "{}", message);
    assert!(message.contains("llama3:latest"), "{}", message);
}

#[tokio::test]
async fn health_check_reports_unreachable_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task completes");

    let message = format!("{:#}", result.expect_err("404 fails the health check"));
    assert!(message.contains("not reachable"), "{}", message);
}

#[tokio::test]
async fn embedder_from_config_selects_ollama() {
    let server = MockServer::start().await;
    let config = config_for(&server, 16);

    let embedder =
        rag_store::embeddings::embedder_from_config(&config).expect("embedder builds");
    assert_eq!(embedder.model_id(), format!("ollama/{}", TEST_MODEL));
}
