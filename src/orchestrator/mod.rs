//! Ad generation orchestrator.
//!
//! Composes the fingerprint builder, response cache, model selector, retry
//! executor and cost ledger into the two core operations:
//!
//! - [`AdOrchestrator::generate_ad`]: validate, fingerprint, serve from cache or
//!   select a tier, call the text provider with retries, parse, bill and cache.
//! - [`AdOrchestrator::synthesize_voice`]: voice a variation of a recently
//!   generated ad, deduplicated through its own cache.
//!
//! Upstream work runs inside the cache's spawned computation, so billing and
//! caching complete even if the caller that started it disconnects.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod parser;
pub mod prompt;

use crate::cache::{CacheError, CacheSource, CacheStats, Clock, Lookup, ResponseCache, SystemClock};
use crate::config::{AppConfig, TextProviderConfig};
use crate::error::{AdError, ErrorClass, Result};
use crate::fingerprint::{fingerprint, fingerprint_voice, Fingerprint};
use crate::ledger::{CallOutcome, CostLedger, PriceTable, UsageKind, UsageRecord, UsageSummary};
use crate::metrics;
use crate::models::voice::{estimate_duration, MIN_SCRIPT_CHARS};
use crate::models::{
    find_voice, AdCopy, AdVariation, AudioRef, GeneratedAd, GenerationRequest, VoiceClip,
    VoiceProfile, VOICES,
};
use crate::providers::{ProviderError, TextCompletion, TextProvider, TextRequest, VoiceProvider, VoiceRequest};
use crate::selector::{select_tier, ModelTier};
use crate::utils::retry::{self, RetryFailure, RetryPolicy};
use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Generated ads remembered for later voice synthesis.
const AD_INDEX_CAPACITY: usize = 4096;

/// What `synthesize_voice` needs to know about an ad it did not just generate.
#[derive(Debug, Clone)]
struct AdRecord {
    campaign_id: String,
    variations: Vec<AdVariation>,
}

/// Map a terminal retry failure to the caller-facing error.
fn upstream_error(failure: &RetryFailure<ProviderError>, prior_attempts: u32) -> AdError {
    let attempts = prior_attempts + failure.attempts;
    match failure.class {
        ErrorClass::AuthError => AdError::Auth {
            attempts,
            message: failure.error.message.clone(),
        },
        class => AdError::Upstream {
            class,
            attempts,
            message: failure.error.message.clone(),
        },
    }
}

fn outcome_label<T>(result: &std::result::Result<T, ProviderError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.class.as_str(),
    }
}

/// One upstream ad copy generation, owned by the cache's computation task.
struct CopyJob {
    provider: Arc<dyn TextProvider>,
    ledger: Arc<CostLedger>,
    policy: RetryPolicy,
    text_config: TextProviderConfig,
    campaign_id: String,
    request: GenerationRequest,
    tier: ModelTier,
}

impl CopyJob {
    async fn run(self) -> Result<AdCopy> {
        let model = self.tier.model_name(&self.text_config).to_string();
        let system = prompt::system_prompt(&self.request);

        let (first, attempts) = self.call(&model, &system, prompt::user_prompt(&self.request), 0).await?;
        let problem = match parser::parse_variations(&first.text, &self.request) {
            Ok(variations) => return Ok(self.finish(model, variations, None, &first, attempts)),
            Err(problem) => problem,
        };

        metrics::record_parse_failure("initial");
        warn!(
            "Unparseable {} response for '{}', re-prompting: {}",
            model, self.request.product, problem
        );
        self.bill(&first, CallOutcome::Failed, attempts);

        let repair = prompt::repair_prompt(&self.request, &problem);
        let (second, attempts) = self.call(&model, &system, repair, attempts).await?;
        match parser::parse_variations(&second.text, &self.request) {
            Ok(variations) => Ok(self.finish(model, variations, Some(&first), &second, attempts)),
            Err(problem) => {
                metrics::record_parse_failure("reprompt");
                error!(
                    "Unparseable {} response for '{}' after re-prompt: {}",
                    model, self.request.product, problem
                );
                self.bill(&second, CallOutcome::Failed, attempts);
                Err(AdError::Parse {
                    attempts,
                    message: problem,
                })
            }
        }
    }

    /// Call the provider with retries. Returns the completion and the running attempt total.
    async fn call(
        &self,
        model: &str,
        system: &str,
        prompt: String,
        prior_attempts: u32,
    ) -> Result<(TextCompletion, u32)> {
        let request = TextRequest {
            model: model.to_string(),
            system: system.to_string(),
            prompt,
            max_tokens: self.text_config.max_tokens,
        };
        let tier = self.tier;

        let outcome = retry::execute(&self.policy, "generate_text", || {
            let provider = Arc::clone(&self.provider);
            let request = request.clone();
            async move {
                let started = Instant::now();
                let result = provider.generate_text(request).await;
                metrics::record_upstream_call(
                    provider.name(),
                    tier.as_str(),
                    outcome_label(&result),
                    started.elapsed().as_secs_f64(),
                );
                result
            }
        })
        .await;

        match outcome {
            Ok((completion, report)) => Ok((completion, prior_attempts + report.attempts)),
            Err(failure) => {
                let err = upstream_error(&failure, prior_attempts);
                error!("Text generation failed for '{}': {}", self.request.product, err);
                self.ledger.record(UsageRecord::failed(
                    self.campaign_id.clone(),
                    UsageKind::Text { tier },
                    failure.attempts,
                ));
                Err(err)
            }
        }
    }

    fn bill(&self, completion: &TextCompletion, outcome: CallOutcome, attempts: u32) -> f64 {
        let record = UsageRecord::text(
            self.campaign_id.clone(),
            self.tier,
            completion.input_tokens,
            completion.output_tokens,
            outcome,
            attempts,
            self.ledger.prices(),
        );
        let cost = record.cost;
        self.ledger.record(record);
        cost
    }

    /// Bill the accepted completion and assemble the cacheable copy.
    ///
    /// `rejected` is the completion that failed validation before a successful
    /// re-prompt; it was billed already and only contributes to the totals.
    fn finish(
        &self,
        model: String,
        variations: Vec<AdVariation>,
        rejected: Option<&TextCompletion>,
        accepted: &TextCompletion,
        attempts: u32,
    ) -> AdCopy {
        let prices = self.ledger.prices();
        let rejected_cost = rejected
            .map(|c| prices.text_cost(self.tier, c.input_tokens, c.output_tokens))
            .unwrap_or(0.0);
        let cost = rejected_cost + self.bill(accepted, CallOutcome::Success, attempts);

        info!(
            "Generated {} variation(s) for '{}' with {} ({} attempt(s), ${:.6})",
            variations.len(),
            self.request.product,
            model,
            attempts,
            cost
        );

        AdCopy {
            variations,
            tier: self.tier,
            model,
            input_tokens: accepted.input_tokens + rejected.map_or(0, |c| c.input_tokens),
            output_tokens: accepted.output_tokens + rejected.map_or(0, |c| c.output_tokens),
            cost,
            generated_at: Utc::now(),
        }
    }
}

/// One upstream voice synthesis, owned by the voice cache's computation task.
struct VoiceJob {
    provider: Arc<dyn VoiceProvider>,
    ledger: Arc<CostLedger>,
    policy: RetryPolicy,
    campaign_id: String,
    script: String,
    voice_id: &'static str,
}

impl VoiceJob {
    async fn run(self) -> Result<AudioRef> {
        let characters = self.script.chars().count() as u64;
        let request = VoiceRequest {
            text: self.script.clone(),
            voice_id: self.voice_id.to_string(),
        };

        let outcome = retry::execute(&self.policy, "synthesize_voice", || {
            let provider = Arc::clone(&self.provider);
            let request = request.clone();
            async move {
                let started = Instant::now();
                let result = provider.synthesize(request).await;
                metrics::record_upstream_call(
                    provider.name(),
                    "voice",
                    outcome_label(&result),
                    started.elapsed().as_secs_f64(),
                );
                result
            }
        })
        .await;

        match outcome {
            Ok((audio, report)) => {
                self.ledger.record(UsageRecord::voice(
                    self.campaign_id.clone(),
                    characters,
                    CallOutcome::Success,
                    report.attempts,
                    self.ledger.prices(),
                ));
                info!(
                    "Synthesized {} characters with voice {} ({} attempt(s))",
                    characters, self.voice_id, report.attempts
                );
                Ok(audio)
            }
            Err(failure) => {
                let err = upstream_error(&failure, 0);
                error!("Voice synthesis failed with {}: {}", self.voice_id, err);
                self.ledger.record(UsageRecord::voice(
                    self.campaign_id.clone(),
                    characters,
                    CallOutcome::Failed,
                    failure.attempts,
                    self.ledger.prices(),
                ));
                Err(err)
            }
        }
    }
}

/// Run an uncached job on its own task. Dropping the caller does not cancel it.
async fn run_detached<V, Fut>(job: Fut) -> Result<V>
where
    V: Send + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    tokio::spawn(job)
        .await
        .map_err(|e| AdError::Internal(format!("generation task ended early: {}", e)))?
}

/// Entry point for ad copy and voice generation.
pub struct AdOrchestrator {
    text: Arc<dyn TextProvider>,
    voice: Arc<dyn VoiceProvider>,
    ad_cache: Arc<ResponseCache<AdCopy, AdError>>,
    voice_cache: Arc<ResponseCache<AudioRef, AdError>>,
    ledger: Arc<CostLedger>,
    ads: Mutex<LruCache<Uuid, AdRecord>>,
    config: AppConfig,
}

impl AdOrchestrator {
    pub fn new(
        config: &AppConfig,
        text: Arc<dyn TextProvider>,
        voice: Arc<dyn VoiceProvider>,
    ) -> Self {
        Self::with_clock(config, text, voice, Arc::new(SystemClock))
    }

    /// Build an orchestrator whose caches read time from `clock`.
    pub fn with_clock(
        config: &AppConfig,
        text: Arc<dyn TextProvider>,
        voice: Arc<dyn VoiceProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = NonZeroUsize::new(AD_INDEX_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            text,
            voice,
            ad_cache: Arc::new(ResponseCache::new("ad_copy", &config.cache, clock.clone())),
            voice_cache: Arc::new(ResponseCache::new("voice", &config.cache, clock)),
            ledger: Arc::new(CostLedger::new(PriceTable::from_config(&config.pricing))),
            ads: Mutex::new(LruCache::new(capacity)),
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn text_provider_name(&self) -> &'static str {
        self.text.name()
    }

    pub fn voice_provider_name(&self) -> &'static str {
        self.voice.name()
    }

    fn text_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            &self.config.retry,
            Duration::from_secs(self.config.text.timeout_seconds),
        )
    }

    fn voice_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            &self.config.retry,
            Duration::from_secs(self.config.voice.timeout_seconds),
        )
    }

    /// Run `job` through `cache`, or on its own task when caching is off or the cache fails.
    async fn through_cache<V, Fut>(
        &self,
        cache: &ResponseCache<V, AdError>,
        key: Fingerprint,
        ttl: Duration,
        job: impl Fn() -> Fut,
    ) -> Result<Lookup<V>>
    where
        V: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if !self.config.cache.enabled {
            return Ok(Lookup {
                value: run_detached(job()).await?,
                source: CacheSource::Computed,
            });
        }

        match cache.get_or_compute(key, ttl, &job).await {
            Ok(lookup) => Ok(lookup),
            Err(CacheError::Compute(e)) => Err(e),
            Err(CacheError::Unavailable(reason)) => {
                warn!(
                    "{} cache unavailable for {} ({}), computing directly",
                    cache.name(),
                    key.short(),
                    reason
                );
                Ok(Lookup {
                    value: run_detached(job()).await?,
                    source: CacheSource::Computed,
                })
            }
        }
    }

    /// Generate ad copy for `campaign_id`, serving identical requests from cache.
    pub async fn generate_ad(
        &self,
        campaign_id: &str,
        request: GenerationRequest,
    ) -> Result<GeneratedAd> {
        if campaign_id.trim().is_empty() {
            metrics::record_generation("invalid");
            return Err(AdError::Validation("Campaign ID must not be empty".into()));
        }
        if let Err(e) = request.validate() {
            metrics::record_generation("invalid");
            return Err(e);
        }

        let key = fingerprint(&request);
        let tier = select_tier(&request);
        let ttl = Duration::from_secs(if request.time_sensitive {
            self.config.cache.promo_ttl_seconds
        } else {
            self.config.cache.ttl_seconds
        });
        debug!(
            "Generating ad for '{}' ({}, tier {}, key {})",
            request.product,
            request.content_type,
            tier,
            key.short()
        );

        let job = || CopyJob {
            provider: Arc::clone(&self.text),
            ledger: Arc::clone(&self.ledger),
            policy: self.text_policy(),
            text_config: self.config.text.clone(),
            campaign_id: campaign_id.to_string(),
            request: request.clone(),
            tier,
        }
        .run();

        let lookup = match self.through_cache(&self.ad_cache, key, ttl, job).await {
            Ok(lookup) => lookup,
            Err(e) => {
                metrics::record_generation(e.kind());
                return Err(e);
            }
        };

        let cache_hit = lookup.is_cache_hit();
        metrics::record_generation(if cache_hit { "cache_hit" } else { "generated" });
        let copy = lookup.value;

        let ad = GeneratedAd {
            ad_id: Uuid::new_v4(),
            campaign_id: campaign_id.to_string(),
            fingerprint: key,
            variations: copy.variations,
            tier: copy.tier,
            model: copy.model,
            input_tokens: copy.input_tokens,
            output_tokens: copy.output_tokens,
            cost: if cache_hit { 0.0 } else { copy.cost },
            cache_hit,
        };

        self.ads.lock().put(
            ad.ad_id,
            AdRecord {
                campaign_id: ad.campaign_id.clone(),
                variations: ad.variations.clone(),
            },
        );
        Ok(ad)
    }

    /// Voice variation `variation` (0-based) of a previously generated ad.
    pub async fn synthesize_voice(
        &self,
        ad_id: Uuid,
        voice_id: &str,
        variation: usize,
    ) -> Result<VoiceClip> {
        let record = self
            .ads
            .lock()
            .get(&ad_id)
            .cloned()
            .ok_or(AdError::UnknownAd(ad_id))?;
        let voice = find_voice(voice_id)?;

        let script = record
            .variations
            .get(variation)
            .map(|v| v.script.trim().to_string())
            .ok_or_else(|| {
                AdError::Validation(format!(
                    "Ad {} has {} variation(s), index {} is out of range",
                    ad_id,
                    record.variations.len(),
                    variation
                ))
            })?;
        if script.chars().count() < MIN_SCRIPT_CHARS {
            return Err(AdError::Validation(format!(
                "Script must be at least {} characters",
                MIN_SCRIPT_CHARS
            )));
        }

        let key = fingerprint_voice(&script, voice.id);
        let ttl = Duration::from_secs(self.config.cache.ttl_seconds);
        let job = || VoiceJob {
            provider: Arc::clone(&self.voice),
            ledger: Arc::clone(&self.ledger),
            policy: self.voice_policy(),
            campaign_id: record.campaign_id.clone(),
            script: script.clone(),
            voice_id: voice.id,
        }
        .run();

        let lookup = self.through_cache(&self.voice_cache, key, ttl, job).await?;
        let cache_hit = lookup.is_cache_hit();
        let cost = if cache_hit {
            0.0
        } else {
            self.ledger.prices().voice_cost(script.chars().count() as u64)
        };

        Ok(VoiceClip {
            ad_id,
            voice_id: voice.id.to_string(),
            audio: lookup.value,
            duration_seconds: estimate_duration(&script),
            cost,
            cache_hit,
        })
    }

    pub fn voices(&self) -> &'static [VoiceProfile] {
        &VOICES
    }

    pub fn usage(&self, campaign_id: &str) -> UsageSummary {
        self.ledger.aggregate(campaign_id)
    }

    /// Statistics of the ad copy cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.ad_cache.stats()
    }

    pub fn voice_cache_stats(&self) -> CacheStats {
        self.voice_cache.stats()
    }

    /// Start the periodic expiry sweep for both caches.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        let interval = Duration::from_secs(self.config.cache.sweep_interval_seconds.max(1));
        vec![
            self.ad_cache.spawn_sweeper(interval),
            self.voice_cache.spawn_sweeper(interval),
        ]
    }
}
