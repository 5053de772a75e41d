// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::cache::CacheStats;
use crate::error::{AdError, Result};
use crate::ledger::UsageSummary;
use crate::metrics::gather_metrics;
use crate::models::{GeneratedAd, GenerationRequest, VoiceClip, VoiceProfile};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;
    let orchestrator = &state.orchestrator;

    checks.insert(
        "text_provider".to_string(),
        HealthCheck {
            status: "ok".to_string(),
            message: format!(
                "{} (fast: {}, capable: {})",
                orchestrator.text_provider_name(),
                state.config.text.fast_model,
                state.config.text.capable_model
            ),
        },
    );

    let voice_check = if orchestrator.voice_provider_name() == "mock" {
        overall_status = HealthStatus::Degraded;
        HealthCheck {
            status: "warning".to_string(),
            message: "No voice API key configured, serving silent mock audio".to_string(),
        }
    } else {
        HealthCheck {
            status: "ok".to_string(),
            message: orchestrator.voice_provider_name().to_string(),
        }
    };
    checks.insert("voice_provider".to_string(), voice_check);

    let stats = orchestrator.cache_stats();
    checks.insert(
        "cache".to_string(),
        HealthCheck {
            status: if state.config.cache.enabled { "ok" } else { "disabled" }.to_string(),
            message: format!(
                "{} of {} entries, {} in flight",
                stats.entry_count, state.config.cache.max_entries, stats.in_flight
            ),
        },
    );

    Json(HealthResponse {
        status: overall_status,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

pub async fn voices_handler(State(state): State<AppState>) -> Json<&'static [VoiceProfile]> {
    Json(state.orchestrator.voices())
}

/// Handler for POST /api/campaigns/:campaign_id/ads/generate
pub async fn generate_handler(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    payload: std::result::Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GeneratedAd>> {
    let Json(request) = payload.map_err(|e| AdError::Validation(e.body_text()))?;
    info!(
        "Generate request for campaign {}: '{}' ({}, {}s)",
        campaign_id, request.product, request.tone, request.duration_secs
    );

    let ad = state.orchestrator.generate_ad(&campaign_id, request).await?;
    Ok(Json(ad))
}

pub async fn usage_handler(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
) -> Json<UsageSummary> {
    Json(state.orchestrator.usage(&campaign_id))
}

#[derive(Debug, Deserialize)]
pub struct VoiceBody {
    pub voice_id: String,
    /// Which variation of the ad to read, 0-based.
    #[serde(default)]
    pub variation: usize,
}

/// Handler for POST /api/ads/:ad_id/voice
pub async fn voice_handler(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
    payload: std::result::Result<Json<VoiceBody>, JsonRejection>,
) -> Result<Json<VoiceClip>> {
    let Json(body) = payload.map_err(|e| AdError::Validation(e.body_text()))?;
    let clip = state
        .orchestrator
        .synthesize_voice(ad_id, &body.voice_id, body.variation)
        .await?;
    Ok(Json(clip))
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub eviction_count: u64,
}

impl From<CacheStats> for CacheReport {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            eviction_count: stats.eviction_count(),
            stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub ad_copy: CacheReport,
    pub voice: CacheReport,
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        ad_copy: state.orchestrator.cache_stats().into(),
        voice: state.orchestrator.voice_cache_stats().into(),
    })
}
