// Model tier selection
// Author: kelexine (https://github.com/kelexine)

use crate::config::TextProviderConfig;
use crate::models::{ContentType, GenerationRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality/cost class of upstream text generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    Capable,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Capable => "capable",
        }
    }

    /// Upstream model name configured for this tier.
    pub fn model_name(self, config: &TextProviderConfig) -> &str {
        match self {
            ModelTier::Fast => &config.fast_model,
            ModelTier::Capable => &config.capable_model,
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the tier for a request. Rules are checked in order:
///
/// 1. Short (≤ 15s) taglines or product descriptions with at most 3 variations → Fast.
/// 2. Scripts, multi-product or storytelling spots, anything over 30s, or more than
///    3 variations → Capable.
/// 3. Anything else → Capable.
///
/// Duration is taken after bucketing so the tier agrees with the cache key.
pub fn select_tier(request: &GenerationRequest) -> ModelTier {
    let duration = request.duration_bucket();
    let short_form = matches!(
        request.content_type,
        ContentType::Tagline | ContentType::ProductDescription
    );

    if short_form && duration <= 15 && request.variations <= 3 {
        return ModelTier::Fast;
    }

    let long_form = matches!(
        request.content_type,
        ContentType::Script | ContentType::MultiProduct | ContentType::BrandStorytelling
    );
    if long_form || duration > 30 || request.variations > 3 {
        return ModelTier::Capable;
    }

    ModelTier::Capable
}
