// Anthropic Messages API client for ad copy generation
// Author: kelexine (https://github.com/kelexine)

use super::{retry_after, ProviderError, TextCompletion, TextProvider, TextRequest};
use crate::config::TextProviderConfig;
use crate::error::{AdError, ErrorClass, Result};
use crate::utils::logging::sanitize;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Client for an Anthropic-style Messages API.
///
/// Each call is one attempt; retries belong to the orchestrator.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    http_client: Client,
    config: TextProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: &TextProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AdError::Config(
                "text.api_key is not set (or export ANTHROPIC_API_KEY)".into(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .use_rustls_tls()
            .build()
            .map_err(|e| AdError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created Anthropic client for {}", config.api_base_url);

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.api_base_url.trim_end_matches('/'))
    }

    /// Extract the error message from an API error body
    fn extract_error_message(body: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: Option<String>,
            #[serde(rename = "type")]
            kind: Option<String>,
        }

        serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .and_then(|e| e.message.or(e.kind))
    }
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate_text(&self, request: TextRequest) -> std::result::Result<TextCompletion, ProviderError> {
        let payload = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let started = Instant::now();
        let response = self
            .http_client
            .post(self.url())
            .header("x-api-key", self.config.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), &e))?;

        let status = response.status();
        let hint = retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), &e))?;

        debug!(
            "Anthropic {} responded {} in {}ms",
            request.model,
            status.as_u16(),
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            let class = ErrorClass::from_status(status.as_u16());
            let message = Self::extract_error_message(&body).unwrap_or_else(|| body.clone());
            error!("Anthropic API error {}: {}", status.as_u16(), sanitize(&body));
            return Err(ProviderError::new(
                class,
                format!("HTTP {}: {}", status.as_u16(), sanitize(&message)),
            )
            .with_retry_after(hint));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(
                ErrorClass::InvalidRequest,
                format!("Invalid Messages response: {}", e),
            )
        })?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(TextCompletion {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;

    #[test]
    fn test_missing_key_is_config_error() {
        let config = TextProviderConfig::default();
        assert!(matches!(AnthropicProvider::new(&config), Err(AdError::Config(_))));
    }

    #[test]
    fn test_url_joins_base() {
        let config = TextProviderConfig {
            api_base_url: "http://localhost:1234/".into(),
            api_key: SecretString::new("sk-ant-test"),
            ..TextProviderConfig::default()
        };
        let provider = AnthropicProvider::new(&config).unwrap();
        assert_eq!(provider.url(), "http://localhost:1234/v1/messages");
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(
            AnthropicProvider::extract_error_message(body).as_deref(),
            Some("Overloaded")
        );
        assert_eq!(AnthropicProvider::extract_error_message("<html>"), None);
    }
}
