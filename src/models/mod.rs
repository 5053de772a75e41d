//! Data models for requests, generated copy and synthesized audio.
//!
//! - `request`: the validated generation request and its normalization helpers
//! - `ad`: variations, the cached copy payload and the caller-facing result
//! - `voice`: the voice catalog and audio references

// Author: kelexine (https://github.com/kelexine)

pub mod ad;
pub mod request;
pub mod voice;

pub use ad::{AdCopy, AdVariation, GeneratedAd};
pub use request::{bucket_duration, ContentType, GenerationRequest, Tone};
pub use voice::{find_voice, AudioRef, VoiceClip, VoiceProfile, VOICES};
