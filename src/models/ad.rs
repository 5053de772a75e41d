// Generated ad copy types
// Author: kelexine (https://github.com/kelexine)

use crate::fingerprint::Fingerprint;
use crate::selector::ModelTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One distinct take on the ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdVariation {
    pub tagline: String,
    pub script: String,
    pub cta: String,
}

/// Validated output of a single upstream generation. This is what the response cache stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdCopy {
    pub variations: Vec<AdVariation>,
    pub tier: ModelTier,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Dollar cost of the generation that produced this copy, repair attempt included.
    pub cost: f64,
    pub generated_at: DateTime<Utc>,
}

/// Result handed back to the caller of `generate_ad`.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAd {
    pub ad_id: Uuid,
    pub campaign_id: String,
    pub fingerprint: Fingerprint,
    pub variations: Vec<AdVariation>,
    pub tier: ModelTier,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Spend incurred by this call; zero whenever no upstream call was made for it.
    pub cost: f64,
    pub cache_hit: bool,
}
