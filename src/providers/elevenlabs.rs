// ElevenLabs text-to-speech client
// Author: kelexine (https://github.com/kelexine)

use super::{retry_after, ProviderError, VoiceProvider, VoiceRequest};
use crate::config::VoiceProviderConfig;
use crate::error::{AdError, ErrorClass, Result};
use crate::models::AudioRef;
use crate::utils::logging::sanitize;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElevenLabsProvider {
    http_client: Client,
    config: VoiceProviderConfig,
}

impl ElevenLabsProvider {
    pub fn new(config: &VoiceProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AdError::Config(
                "voice.api_key is not set (or export ELEVENLABS_API_KEY)".into(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| AdError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    fn url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base_url.trim_end_matches('/'),
            voice_id
        )
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, request: VoiceRequest) -> std::result::Result<AudioRef, ProviderError> {
        let payload = SpeechRequest {
            text: &request.text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings::default(),
        };

        let response = self
            .http_client
            .post(self.url(&request.voice_id))
            .header("xi-api-key", self.config.api_key.expose())
            .header("accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), &e))?;

        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            error!("ElevenLabs API error {}: {}", status.as_u16(), sanitize(&body));
            return Err(ProviderError::new(
                ErrorClass::from_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), sanitize(&body)),
            )
            .with_retry_after(hint));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let data = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), &e))?;

        debug!(
            "Synthesized {} bytes with voice {}",
            data.len(),
            request.voice_id
        );

        Ok(AudioRef::Inline { mime_type, data })
    }
}
