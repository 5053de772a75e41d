// Generation request types and input validation
// Author: kelexine (https://github.com/kelexine)

use crate::error::{AdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shortest and longest supported spot length, in seconds.
pub const MIN_DURATION_SECS: u32 = 15;
pub const MAX_DURATION_SECS: u32 = 60;

/// Supported duration buckets; requests are rounded to the nearest one.
pub const DURATION_BUCKETS: [u32; 4] = [15, 30, 45, 60];

pub const MAX_VARIATIONS: u32 = 5;
pub const MAX_HINTS: usize = 8;
pub const MAX_HINT_LEN: usize = 64;
const MIN_PRODUCT_LEN: usize = 2;
const MAX_PRODUCT_LEN: usize = 200;

/// Brand voice requested for the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Casual,
    Energetic,
    Luxury,
    Playful,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Professional,
        Tone::Casual,
        Tone::Energetic,
        Tone::Luxury,
        Tone::Playful,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Energetic => "energetic",
            Tone::Luxury => "luxury",
            Tone::Playful => "playful",
        }
    }

    /// Copywriting guidance injected into the system prompt.
    pub fn guidance(self) -> &'static str {
        match self {
            Tone::Professional => {
                "Use formal, business-focused language. Emphasize reliability, expertise, and ROI."
            }
            Tone::Casual => "Use friendly, conversational language. Keep it light and approachable.",
            Tone::Energetic => "Use dynamic, exciting language. Create urgency and enthusiasm.",
            Tone::Luxury => {
                "Use premium, sophisticated language. Emphasize exclusivity and craftsmanship."
            }
            Tone::Playful => "Use humorous, creative language. Don't take yourself too seriously.",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = AdError;

    fn from_str(s: &str) -> Result<Self> {
        let folded = s.trim().to_lowercase();
        Tone::ALL
            .into_iter()
            .find(|t| t.as_str() == folded)
            .ok_or_else(|| {
                AdError::Validation(format!(
                    "Invalid tone: {}. Valid: {}",
                    s,
                    Tone::ALL.map(Tone::as_str).join(", ")
                ))
            })
    }
}

/// What kind of copy is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Tagline,
    ProductDescription,
    Script,
    MultiProduct,
    BrandStorytelling,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Tagline => "tagline",
            ContentType::ProductDescription => "product_description",
            ContentType::Script => "script",
            ContentType::MultiProduct => "multi_product",
            ContentType::BrandStorytelling => "brand_storytelling",
        }
    }

    /// Human phrasing used inside prompts.
    pub fn describe(self) -> &'static str {
        match self {
            ContentType::Tagline => "a punchy tagline-led spot",
            ContentType::ProductDescription => "a concise product description spot",
            ContentType::Script => "a full ad script",
            ContentType::MultiProduct => "a spot featuring several products",
            ContentType::BrandStorytelling => "a brand storytelling spot",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ad generation request.
///
/// Values are immutable once validated; the fingerprint and the model tier are
/// both derived from the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub product: String,
    pub tone: Tone,
    pub duration_secs: u32,
    #[serde(default = "default_variations")]
    pub variations: u32,
    #[serde(default = "default_content_type")]
    pub content_type: ContentType,
    /// Free-text steering such as "mention free shipping".
    #[serde(default)]
    pub hints: Vec<String>,
    /// Promotional copy that goes stale quickly and gets the short cache TTL.
    #[serde(default)]
    pub time_sensitive: bool,
}

fn default_variations() -> u32 {
    1
}

fn default_content_type() -> ContentType {
    ContentType::Script
}

impl GenerationRequest {
    pub fn new(
        product: impl Into<String>,
        tone: Tone,
        duration_secs: u32,
        variations: u32,
        content_type: ContentType,
    ) -> Self {
        Self {
            product: product.into(),
            tone,
            duration_secs,
            variations,
            content_type,
            hints: Vec::new(),
            time_sensitive: false,
        }
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn time_sensitive(mut self, yes: bool) -> Self {
        self.time_sensitive = yes;
        self
    }

    /// Reject malformed input before it reaches the fingerprint builder.
    pub fn validate(&self) -> Result<()> {
        let product_len = self.product.trim().chars().count();
        if product_len < MIN_PRODUCT_LEN {
            return Err(AdError::Validation(format!(
                "Product name must be at least {} characters",
                MIN_PRODUCT_LEN
            )));
        }
        if product_len > MAX_PRODUCT_LEN {
            return Err(AdError::Validation(format!(
                "Product name must be at most {} characters",
                MAX_PRODUCT_LEN
            )));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(AdError::Validation(format!(
                "Duration must be between {} and {} seconds",
                MIN_DURATION_SECS, MAX_DURATION_SECS
            )));
        }
        if !(1..=MAX_VARIATIONS).contains(&self.variations) {
            return Err(AdError::Validation(format!(
                "Variation count must be between 1 and {}",
                MAX_VARIATIONS
            )));
        }
        if self.hints.len() > MAX_HINTS {
            return Err(AdError::Validation(format!(
                "At most {} hints are allowed",
                MAX_HINTS
            )));
        }
        if let Some(hint) = self.hints.iter().find(|h| h.chars().count() > MAX_HINT_LEN) {
            return Err(AdError::Validation(format!(
                "Hint exceeds {} characters: {}",
                MAX_HINT_LEN, hint
            )));
        }
        Ok(())
    }

    /// Product name trimmed and case-folded.
    pub fn normalized_product(&self) -> String {
        self.product.trim().to_lowercase()
    }

    /// Duration rounded to the nearest supported bucket.
    pub fn duration_bucket(&self) -> u32 {
        bucket_duration(self.duration_secs)
    }

    /// Hints trimmed, case-folded, de-duplicated and sorted; blanks dropped.
    pub fn normalized_hints(&self) -> Vec<String> {
        let mut hints: Vec<String> = self
            .hints
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        hints.sort();
        hints.dedup();
        hints
    }
}

/// Round a duration to the closest entry of [`DURATION_BUCKETS`].
pub fn bucket_duration(secs: u32) -> u32 {
    DURATION_BUCKETS
        .into_iter()
        .min_by_key(|b| b.abs_diff(secs))
        .unwrap_or(MIN_DURATION_SECS)
}
