//! HTTP client tests against local stub servers
//!
//! `cargo test -p taskhook-provider --test clients_test`

use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use taskhook_provider::{
    GenerationOptions, HealthStatus, OllamaClient, ProviderError, TextGenerator, TrendsClient,
    TrendsQuery, TrendsSource,
};

async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn llm_stub() -> Router {
    Router::new()
        .route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                // echo back the request so the test can inspect it
                Json(json!({
                    "model": body["model"],
                    "response": format!(
                        "  <think>t={}</think>{}  ",
                        body["temperature"], body["prompt"].as_str().unwrap_or_default()
                    ),
                    "stream": body["stream"],
                }))
            }),
        )
        .route(
            "/api/tags",
            get(|| async { Json(json!({"models": [{"name": "deepseek-r1:1.5b"}]})) }),
        )
}

#[tokio::test]
async fn test_ollama_generate() {
    let base = spawn_stub(llm_stub()).await;
    let client =
        OllamaClient::new(format!("{}/api/", base), "deepseek-r1:1.5b", Duration::from_secs(5))
            .unwrap();

    let options = GenerationOptions {
        temperature: 0.5,
        max_tokens: 32,
    };
    let text = client.generate("hello", options).await.unwrap();

    assert_eq!(text, "<think>t=0.5</think>hello");
    assert_eq!(client.model(), "deepseek-r1:1.5b");
}

#[tokio::test]
async fn test_ollama_health() {
    let base = spawn_stub(llm_stub()).await;

    let loaded = OllamaClient::new(
        format!("{}/api", base),
        "deepseek-r1:1.5b",
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(loaded.health().await.status, HealthStatus::Ok);

    let missing = OllamaClient::new(format!("{}/api", base), "llama3", Duration::from_secs(5))
        .unwrap();
    assert_eq!(missing.health().await.status, HealthStatus::Warning);
}

#[tokio::test]
async fn test_ollama_unreachable() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OllamaClient::new(format!("http://{}/api", addr), "m", Duration::from_secs(2))
        .unwrap();
    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Error);

    let err = client
        .generate("x", GenerationOptions::default())
        .await
        .unwrap_err();
    let err: taskhook_foundation::Error = err.into();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_ollama_server_error() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
    );
    let base = spawn_stub(app).await;
    let client =
        OllamaClient::new(format!("{}/api", base), "m", Duration::from_secs(5)).unwrap();

    let err = client
        .generate("x", GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ServerError(ref msg) if msg.contains("model loading")));
}

#[tokio::test]
async fn test_trends_interest_over_time() {
    let app = Router::new().route(
        "/interest_over_time",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("kw").map(String::as_str), Some("rust,go"));
            assert_eq!(params.get("hl").map(String::as_str), Some("en-US"));
            Json(json!([
                {"date": "2024-01-07", "isPartial": false, "rust": 40, "go": 20},
                {"date": "2024-01-14", "isPartial": true, "rust": 55, "go": 10},
            ]))
        }),
    );
    let base = spawn_stub(app).await;
    let client = TrendsClient::new(base, Duration::from_secs(5)).unwrap();

    let points = client
        .interest_over_time(&TrendsQuery::new(["rust", "go"]))
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[1].date, "2024-01-14");
    assert!(points[1].is_partial);
    assert_eq!(points[1].q_list[0].query, "rust");
    assert_eq!(points[1].q_list[0].value, 55.0);
}

#[tokio::test]
async fn test_trends_bad_request() {
    let app = Router::new().route(
        "/interest_over_time",
        get(|| async { (StatusCode::BAD_REQUEST, "unknown geo") }),
    );
    let base = spawn_stub(app).await;
    let client = TrendsClient::new(base, Duration::from_secs(5)).unwrap();

    let err = client
        .interest_over_time(&TrendsQuery::new(["rust"]).with_geo("XX"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}
