// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{AdError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. CLI arguments (highest, applied by the caller)
    /// 2. Environment variables (`ADFORGE__SECTION__KEY`)
    /// 3. Config file (`path`, or `~/.adforge/config.toml`)
    /// 4. Defaults (lowest)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(p) => File::with_name(p).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("ADFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AdError::Config(e.to_string()))?;

        let mut loaded: AppConfig = config
            .try_deserialize()
            .map_err(|e| AdError::Config(e.to_string()))?;

        loaded.apply_provider_env();
        loaded.validate()?;
        Ok(loaded)
    }

    /// Pick up the providers' conventional key variables when the config leaves keys empty.
    fn apply_provider_env(&mut self) {
        if self.text.api_key.is_empty() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                self.text.api_key = SecretString::new(key);
            }
        }
        if self.voice.api_key.is_empty() {
            if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
                self.voice.api_key = SecretString::new(key);
            }
        }
    }

    /// Reject settings that would make the retry or cache machinery misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(AdError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(AdError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(AdError::Config("cache.max_entries must be at least 1".into()));
        }
        if self.cache.ttl_seconds == 0 || self.cache.promo_ttl_seconds == 0 {
            return Err(AdError::Config("cache TTLs must be positive".into()));
        }
        if self.text.timeout_seconds == 0 || self.voice.timeout_seconds == 0 {
            return Err(AdError::Config("provider timeouts must be positive".into()));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".adforge")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
