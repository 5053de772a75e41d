//! Structured logging and secret-scrubbing utilities.
//!
//! This module configures the `tracing` ecosystem for the service and provides
//! [`sanitize`] to keep provider API keys out of log sinks when upstream error
//! bodies or request echoes are logged.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::{AdError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Anthropic keys (`sk-ant-...`), ElevenLabs-style keys (`sk_...`) and key headers.
static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"sk-ant-[A-Za-z0-9_\-]+").expect("static regex"),
            "[REDACTED_API_KEY]",
        ),
        (
            Regex::new(r"\bsk_[A-Fa-f0-9]{16,}").expect("static regex"),
            "[REDACTED_API_KEY]",
        ),
        (
            Regex::new(r#"(?i)(xi-api-key|x-api-key)(["']?\s*[:=]\s*["']?)[^\s"',}]+"#)
                .expect("static regex"),
            "$1$2[REDACTED]",
        ),
    ]
});

/// Initializes the global tracing subscriber.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `compact`: Single-line human-readable output.
/// - `pretty` (default): Multi-line colorized output for development.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let initialized = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "compact" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    initialized.map_err(|e| AdError::Internal(format!("Failed to initialize logging: {}", e)))
}

/// Replaces provider API keys found in `input` with redaction placeholders.
pub fn sanitize(input: &str) -> String {
    SECRET_PATTERNS
        .iter()
        .fold(input.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_anthropic_key() {
        let input = "request failed with key sk-ant-api03-AbCd_123-xyz in header";
        let output = sanitize(input);
        assert!(output.contains("[REDACTED_API_KEY]"));
        assert!(!output.contains("AbCd_123"));
        assert!(output.ends_with("in header"));
    }

    #[test]
    fn test_sanitize_header_values() {
        let output = sanitize(r#"{"xi-api-key": "abc123secret", "voice": "alloy"}"#);
        assert!(!output.contains("abc123secret"));
        assert!(output.contains("alloy"));

        let output = sanitize("x-api-key=topsecret");
        assert_eq!(output, "x-api-key=[REDACTED]");
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        let input = "Upstream returned 503: overloaded";
        assert_eq!(sanitize(input), input);
    }
}
