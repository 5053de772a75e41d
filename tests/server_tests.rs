// HTTP router tests
// Author: kelexine (https://github.com/kelexine)

use adforge::config::AppConfig;
use adforge::error::ErrorClass;
use adforge::orchestrator::AdOrchestrator;
use adforge::providers::{MockVoiceProvider, ProviderError, TextCompletion, TextProvider, TextRequest};
use adforge::server::create_router;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Always answers with `variations` distinct, well-formed variations.
#[derive(Debug)]
struct FixedText {
    variations: usize,
}

#[async_trait]
impl TextProvider for FixedText {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn generate_text(&self, request: TextRequest) -> Result<TextCompletion, ProviderError> {
        if request.prompt.contains("Broken Product") {
            return Err(ProviderError::new(ErrorClass::AuthError, "invalid x-api-key"));
        }
        let items: Vec<_> = (0..self.variations)
            .map(|i| {
                json!({
                    "tagline": format!("Pure Gold {}", i),
                    "script": vec!["smooth"; 40].join(" "),
                    "cta": "Order today"
                })
            })
            .collect();
        Ok(TextCompletion {
            text: json!({ "variations": items }).to_string(),
            input_tokens: 120,
            output_tokens: 60,
        })
    }
}

fn app() -> Router {
    let config = AppConfig::default();
    let orchestrator = Arc::new(AdOrchestrator::new(
        &config,
        Arc::new(FixedText { variations: 2 }),
        Arc::new(MockVoiceProvider::new()),
    ));
    create_router(config, orchestrator).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn coffee() -> Value {
    json!({
        "product": "Premium Coffee",
        "tone": "luxury",
        "duration_secs": 15,
        "variations": 2,
        "content_type": "tagline"
    })
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    // Mock voice provider is wired in.
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["text_provider"]["status"], "ok");
}

#[tokio::test]
async fn test_request_id_is_set() {
    let app = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(id.starts_with("req_"));
}

#[tokio::test]
async fn test_voices() {
    let app = app();
    let (status, body) = send(&app, get("/api/voices")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
    assert_eq!(body[0]["id"], "alloy");
}

#[tokio::test]
async fn test_generate_then_usage_and_stats() {
    let app = app();

    let (status, first) = send(&app, post("/api/campaigns/camp-1/ads/generate", coffee())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cache_hit"], false);
    assert_eq!(first["tier"], "fast");
    assert_eq!(first["variations"].as_array().unwrap().len(), 2);

    let (_, second) = send(&app, post("/api/campaigns/camp-1/ads/generate", coffee())).await;
    assert_eq!(second["cache_hit"], true);
    assert_eq!(second["cost"], 0.0);

    let (status, usage) = send(&app, get("/api/campaigns/camp-1/usage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["call_count"], 1);
    assert_eq!(usage["total_tokens"], 180);

    let (status, stats) = send(&app, get("/api/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["ad_copy"]["hits"], 1);
    assert_eq!(stats["ad_copy"]["misses"], 1);
    assert_eq!(stats["ad_copy"]["hit_rate"], 0.5);
    assert_eq!(stats["voice"]["entry_count"], 0);
}

#[tokio::test]
async fn test_generate_validation_error() {
    let app = app();
    let mut body = coffee();
    body["duration_secs"] = json!(90);

    let (status, body) = send(&app, post("/api/campaigns/camp-1/ads/generate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_generate_malformed_json() {
    let app = app();
    let (status, body) = send(
        &app,
        post("/api/campaigns/camp-1/ads/generate", json!({"product": "Coffee"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "error");
}

#[tokio::test]
async fn test_upstream_auth_error() {
    let app = app();
    let mut body = coffee();
    body["product"] = json!("Broken Product");

    let (status, body) = send(&app, post("/api/campaigns/camp-1/ads/generate", body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "authentication_error");
    assert_eq!(body["error"]["attempts"], 1);
}

#[tokio::test]
async fn test_voice_round_trip() {
    let app = app();
    let (_, ad) = send(&app, post("/api/campaigns/camp-1/ads/generate", coffee())).await;
    let ad_id = ad["ad_id"].as_str().unwrap().to_string();

    let (status, clip) = send(
        &app,
        post(&format!("/api/ads/{}/voice", ad_id), json!({"voice_id": "nova", "variation": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clip["voice_id"], "nova");
    assert_eq!(clip["audio"]["kind"], "inline");
    assert_eq!(clip["audio"]["mime_type"], "audio/wav");
    assert!(clip["audio"]["data_base64"].as_str().unwrap().len() > 60);
}

#[tokio::test]
async fn test_voice_unknown_ad() {
    let app = app();
    let (status, body) = send(
        &app,
        post(
            "/api/ads/00000000-0000-0000-0000-000000000000/voice",
            json!({"voice_id": "nova"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    send(&app, post("/api/campaigns/camp-1/ads/generate", coffee())).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("generation_requests_total"));
    assert!(text.contains("cache_operations_total"));
}
