//! Configuration data structures for adforge.
//!
//! This module defines the schema for the application settings: the HTTP server,
//! both upstream providers, the response cache, retry policy, price table and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, workers).
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream text-generation provider settings.
    #[serde(default)]
    pub text: TextProviderConfig,

    /// Upstream voice-synthesis provider settings.
    #[serde(default)]
    pub voice: VoiceProviderConfig,

    /// Response cache sizing and TTLs.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Backoff schedule for upstream calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Dollar rates used by the cost ledger.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `8080`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of tokio worker threads.
    /// Default: Number of logical CPU cores.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Settings for the Anthropic-compatible Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextProviderConfig {
    /// Base URL of the Messages API.
    /// Default: `https://api.anthropic.com`
    #[serde(default = "default_text_base_url")]
    pub api_base_url: String,

    /// API key. Falls back to `ANTHROPIC_API_KEY` when empty.
    #[serde(default)]
    pub api_key: SecretString,

    /// Model used for the Fast tier.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model used for the Capable tier.
    #[serde(default = "default_capable_model")]
    pub capable_model: String,

    /// Output token ceiling per generation.
    /// Default: `1024`
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-attempt request timeout in seconds.
    /// Default: `20`
    #[serde(default = "default_attempt_timeout")]
    pub timeout_seconds: u64,
}

/// Settings for the ElevenLabs-compatible text-to-speech API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProviderConfig {
    /// Base URL of the text-to-speech API.
    /// Default: `https://api.elevenlabs.io`
    #[serde(default = "default_voice_base_url")]
    pub api_base_url: String,

    /// API key. Falls back to `ELEVENLABS_API_KEY`; when still empty a silent mock
    /// synthesizer is used instead.
    #[serde(default)]
    pub api_key: SecretString,

    /// Synthesis model identifier.
    /// Default: `eleven_monolingual_v1`
    #[serde(default = "default_voice_model")]
    pub model_id: String,

    /// Per-attempt request timeout in seconds.
    /// Default: `30`
    #[serde(default = "default_voice_timeout")]
    pub timeout_seconds: u64,
}

/// Settings for the response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether generated content is cached at all.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live for ordinary entries, in seconds.
    /// Default: `86400` (24 hours)
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Time-to-live for time-sensitive promotional copy, in seconds.
    /// Default: `3600` (1 hour)
    #[serde(default = "default_promo_ttl")]
    pub promo_ttl_seconds: u64,

    /// Maximum number of entries before least-recently-used eviction kicks in.
    /// Default: `1000`
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Interval of the background sweep that drops expired entries, in seconds.
    /// Default: `60`
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

/// Backoff schedule for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    /// Default: `500`
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds.
    /// Default: `8000`
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Total attempts, including the first one.
    /// Default: `4`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to add random jitter in `[0, delay)` to every wait.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub jitter: bool,
}

/// Dollar rates per tier and for voice synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_fast_input")]
    pub fast_input_per_1k: f64,
    #[serde(default = "default_fast_output")]
    pub fast_output_per_1k: f64,
    #[serde(default = "default_capable_input")]
    pub capable_input_per_1k: f64,
    #[serde(default = "default_capable_output")]
    pub capable_output_per_1k: f64,
    /// Voice synthesis, per 1,000 characters of script.
    #[serde(default = "default_voice_per_1k_chars")]
    pub voice_per_1k_chars: f64,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to mask API keys in logged upstream error bodies.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub sanitize_tokens: bool,
}

/// A credential that is wiped from memory on drop and never printed by `Debug`.
///
/// It serializes transparently so the `config` layering can round-trip it; use
/// [`AppConfig::redacted`] before showing a config to anyone.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretString(<empty>)")
        } else {
            f.write_str("SecretString(<redacted>)")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl AppConfig {
    /// Copy of the config with every credential replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in [&mut copy.text.api_key, &mut copy.voice.api_key] {
            if !key.is_empty() {
                *key = SecretString::new("[REDACTED]");
            }
        }
        copy
    }
}

// Default trait implementations linking to custom logic

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

impl Default for TextProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_text_base_url(),
            api_key: SecretString::default(),
            fast_model: default_fast_model(),
            capable_model: default_capable_model(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_attempt_timeout(),
        }
    }
}

impl Default for VoiceProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_voice_base_url(),
            api_key: SecretString::default(),
            model_id: default_voice_model(),
            timeout_seconds: default_voice_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl(),
            promo_ttl_seconds: default_promo_ttl(),
            max_entries: default_max_entries(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
            jitter: true,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fast_input_per_1k: default_fast_input(),
            fast_output_per_1k: default_fast_output(),
            capable_input_per_1k: default_capable_input(),
            capable_output_per_1k: default_capable_output(),
            voice_per_1k_chars: default_voice_per_1k_chars(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sanitize_tokens: true,
        }
    }
}

// Helper functions for serde defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_true() -> bool {
    true
}

fn default_text_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_fast_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_capable_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_attempt_timeout() -> u64 {
    20
}

fn default_voice_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_voice_model() -> String {
    "eleven_monolingual_v1".to_string()
}

fn default_voice_timeout() -> u64 {
    30
}

fn default_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_promo_ttl() -> u64 {
    3_600
}

fn default_max_entries() -> usize {
    1_000
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    8_000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_fast_input() -> f64 {
    0.000_25
}

fn default_fast_output() -> f64 {
    0.001_25
}

fn default_capable_input() -> f64 {
    0.003
}

fn default_capable_output() -> f64 {
    0.015
}

fn default_voice_per_1k_chars() -> f64 {
    0.10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SecretString::new("sk-ant-api03-abcdef");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("abcdef"));
        assert_eq!(secret.expose(), "sk-ant-api03-abcdef");
    }

    #[test]
    fn test_redacted_config_hides_keys() {
        let mut config = AppConfig::default();
        config.text.api_key = SecretString::new("sk-ant-secret");
        let redacted = config.redacted();
        assert_eq!(redacted.text.api_key.expose(), "[REDACTED]");
        assert!(redacted.voice.api_key.is_empty());
    }
}
