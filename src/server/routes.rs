// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::{
    cache_stats_handler, generate_handler, health_handler, metrics_handler, usage_handler,
    voice_handler, voices_handler,
};
use super::middleware::request_id_layers;
use crate::config::AppConfig;
use crate::error::Result;
use crate::orchestrator::AdOrchestrator;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<AdOrchestrator>,
}

pub fn create_router(config: AppConfig, orchestrator: Arc<AdOrchestrator>) -> Result<Router> {
    let state = AppState {
        config,
        orchestrator,
    };

    let (set_request_id, propagate_request_id) = request_id_layers();

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/voices", get(voices_handler))
        .route(
            "/api/campaigns/:campaign_id/ads/generate",
            post(generate_handler),
        )
        .route("/api/campaigns/:campaign_id/usage", get(usage_handler))
        .route("/api/ads/:ad_id/voice", post(voice_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id)
                .layer(propagate_request_id)
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)),
        )
        .with_state(state);

    Ok(app)
}
