//! Upstream AI provider boundary.
//!
//! The orchestrator talks to providers only through [`TextProvider`] and
//! [`VoiceProvider`]. Every failure is a [`ProviderError`] carrying an
//! [`ErrorClass`] so the retry executor can decide what to do without
//! knowing anything about HTTP.
//!
//! - `anthropic`: Messages API client for ad copy
//! - `elevenlabs`: text-to-speech client
//! - `mock`: offline voice provider that renders silent WAV audio
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod anthropic;
pub mod elevenlabs;
pub mod mock;

pub use anthropic::AnthropicProvider;
pub use elevenlabs::ElevenLabsProvider;
pub use mock::MockVoiceProvider;

use crate::error::ErrorClass;
use crate::models::AudioRef;
use crate::utils::retry::RetryableError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One text completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextCompletion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    pub text: String,
    pub voice_id: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{class}: {message}")]
pub struct ProviderError {
    pub class: ErrorClass,
    pub message: String,
    /// Delay requested by the upstream via `retry-after`.
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Classify a transport-level failure.
    pub fn from_reqwest(provider: &str, e: &reqwest::Error) -> Self {
        let class = if e.is_timeout() {
            ErrorClass::Timeout
        } else if e.is_connect() || e.is_request() {
            ErrorClass::ServiceUnavailable
        } else if let Some(status) = e.status() {
            ErrorClass::from_status(status.as_u16())
        } else {
            ErrorClass::ServiceUnavailable
        };
        Self::new(class, format!("{} request failed: {}", provider, e))
    }
}

impl RetryableError for ProviderError {
    fn class(&self) -> ErrorClass {
        self.class
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    fn timed_out(after: Duration) -> Self {
        Self::new(
            ErrorClass::Timeout,
            format!("attempt exceeded {}ms", after.as_millis()),
        )
    }
}

/// Parse a `retry-after` header given in whole seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Text generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync + fmt::Debug {
    /// Provider name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn generate_text(&self, request: TextRequest) -> Result<TextCompletion, ProviderError>;
}

/// Voice synthesis backend.
#[async_trait]
pub trait VoiceProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, request: VoiceRequest) -> Result<AudioRef, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_timeout_error_is_retryable() {
        let err = ProviderError::timed_out(Duration::from_secs(20));
        assert_eq!(err.class, ErrorClass::Timeout);
        assert!(err.class().is_retryable());
        assert_eq!(err.to_string(), "timeout: attempt exceeded 20000ms");
    }
}
