//! Deterministic cache keys for generation and synthesis requests.
//!
//! Fields are normalized (trimmed, case-folded, duration bucketed, hints sorted) and
//! fed to SHA-256 in a fixed order. Every field is length-prefixed so adjacent values
//! can never run together, and each request kind carries its own domain tag.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::models::GenerationRequest;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

const AD_DOMAIN: &[u8] = b"adforge/ad/v1";
const VOICE_DOMAIN: &[u8] = b"adforge/voice/v1";

/// 32-byte SHA-256 digest identifying a normalized request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex characters, enough to tell keys apart in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct KeyHasher(Sha256);

impl KeyHasher {
    fn new(domain: &[u8]) -> Self {
        let mut hasher = KeyHasher(Sha256::new());
        hasher.field(domain);
        hasher
    }

    fn field(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
    }

    fn finish(self) -> Fingerprint {
        Fingerprint(self.0.finalize().into())
    }
}

/// Fingerprint of an ad generation request.
///
/// Callers validate the request first; this function never fails.
pub fn fingerprint(request: &GenerationRequest) -> Fingerprint {
    let mut hasher = KeyHasher::new(AD_DOMAIN);
    hasher.field(request.normalized_product().as_bytes());
    hasher.field(request.tone.as_str().as_bytes());
    hasher.field(&request.duration_bucket().to_be_bytes());
    hasher.field(&request.variations.to_be_bytes());
    hasher.field(request.content_type.as_str().as_bytes());
    hasher.field(&[request.time_sensitive as u8]);

    let hints = request.normalized_hints();
    hasher.field(&(hints.len() as u64).to_be_bytes());
    for hint in &hints {
        hasher.field(hint.as_bytes());
    }

    hasher.finish()
}

/// Fingerprint of a voice synthesis request.
///
/// Whitespace runs in the script collapse to one space; the voice id is case-folded.
pub fn fingerprint_voice(script: &str, voice_id: &str) -> Fingerprint {
    let script = script.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = KeyHasher::new(VOICE_DOMAIN);
    hasher.field(voice_id.trim().to_lowercase().as_bytes());
    hasher.field(script.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Tone};

    fn request(product: &str, duration: u32) -> GenerationRequest {
        GenerationRequest::new(product, Tone::Luxury, duration, 2, ContentType::Tagline)
    }

    #[test]
    fn test_normalization_is_applied() {
        let a = request("Premium Coffee", 15);
        let b = request("  premium COFFEE ", 20);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_hint_order_does_not_matter() {
        let a = request("Premium Coffee", 30).with_hints(["Free shipping", "Fair trade"]);
        let b = request("Premium Coffee", 30).with_hints(["fair trade", "free shipping "]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_distinct_fields_change_fingerprint() {
        let base = request("Premium Coffee", 30);
        assert_ne!(fingerprint(&base), fingerprint(&request("Premium Tea", 30)));
        assert_ne!(fingerprint(&base), fingerprint(&request("Premium Coffee", 45)));

        let mut tone = base.clone();
        tone.tone = Tone::Casual;
        assert_ne!(fingerprint(&base), fingerprint(&tone));

        let promo = base.clone().time_sensitive(true);
        assert_ne!(fingerprint(&base), fingerprint(&promo));
    }

    #[test]
    fn test_length_prefix_prevents_concatenation_collisions() {
        let a = request("ab", 30).with_hints(["c"]);
        let b = request("abc", 30);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_hex_rendering() {
        let fp = fingerprint(&request("Premium Coffee", 15));
        assert_eq!(fp.to_hex().len(), 64);
        assert!(fp.to_hex().starts_with(&fp.short()));
    }

    #[test]
    fn test_voice_fingerprint() {
        let a = fingerprint_voice("Wake up to  luxury.\n", "Onyx");
        let b = fingerprint_voice("Wake up to luxury.", "onyx");
        assert_eq!(a, b);
        assert_ne!(a, fingerprint_voice("Wake up to luxury.", "nova"));
    }
}
