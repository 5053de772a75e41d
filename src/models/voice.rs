// Voice catalog and synthesized audio types
// Author: kelexine (https://github.com/kelexine)

use crate::error::{AdError, Result};
use base64::Engine;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Characters of script read per second, used for duration estimates.
pub const CHARS_PER_SECOND: f64 = 15.0;

/// Scripts shorter than this are rejected before synthesis.
pub const MIN_SCRIPT_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub gender: &'static str,
    pub accent: &'static str,
}

/// Voices the synthesis provider is allowed to use.
pub const VOICES: [VoiceProfile; 5] = [
    VoiceProfile {
        id: "alloy",
        name: "Alloy",
        description: "Neutral, clear voice - good for technical content",
        gender: "unspecified",
        accent: "american",
    },
    VoiceProfile {
        id: "echo",
        name: "Echo",
        description: "Warm, friendly voice - great for consumer products",
        gender: "male",
        accent: "american",
    },
    VoiceProfile {
        id: "fable",
        name: "Fable",
        description: "Energetic, young voice - perfect for dynamic brands",
        gender: "female",
        accent: "british",
    },
    VoiceProfile {
        id: "onyx",
        name: "Onyx",
        description: "Deep, professional voice - ideal for luxury brands",
        gender: "male",
        accent: "american",
    },
    VoiceProfile {
        id: "nova",
        name: "Nova",
        description: "Bright, modern voice - contemporary and engaging",
        gender: "female",
        accent: "american",
    },
];

/// Look a voice up by id, case-insensitively.
pub fn find_voice(voice_id: &str) -> Result<&'static VoiceProfile> {
    let folded = voice_id.trim().to_lowercase();
    VOICES.iter().find(|v| v.id == folded).ok_or_else(|| {
        AdError::Validation(format!(
            "Invalid voice ID: {}. Valid: {}",
            voice_id,
            VOICES.iter().map(|v| v.id).collect::<Vec<_>>().join(", ")
        ))
    })
}

/// Where the synthesized audio lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRef {
    Inline { mime_type: String, data: Bytes },
    Url(String),
}

impl AudioRef {
    pub fn len_bytes(&self) -> Option<usize> {
        match self {
            AudioRef::Inline { data, .. } => Some(data.len()),
            AudioRef::Url(_) => None,
        }
    }
}

// Inline audio is sent over JSON as base64.
impl Serialize for AudioRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        enum Wire<'a> {
            Inline { mime_type: &'a str, data_base64: String },
            Url { url: &'a str },
        }

        let wire = match self {
            AudioRef::Inline { mime_type, data } => Wire::Inline {
                mime_type,
                data_base64: base64::engine::general_purpose::STANDARD.encode(data),
            },
            AudioRef::Url(url) => Wire::Url { url },
        };
        wire.serialize(serializer)
    }
}

/// Result of `synthesize_voice`.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceClip {
    pub ad_id: Uuid,
    pub voice_id: String,
    pub audio: AudioRef,
    pub duration_seconds: f64,
    /// Spend incurred by this call; zero when served from cache.
    pub cost: f64,
    pub cache_hit: bool,
}

/// Rough read-aloud length of a script.
pub fn estimate_duration(script: &str) -> f64 {
    script.chars().count() as f64 / CHARS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_voice() {
        assert_eq!(find_voice("Onyx").unwrap().name, "Onyx");
        assert!(matches!(find_voice("robot"), Err(AdError::Validation(_))));
    }

    #[test]
    fn test_inline_audio_serializes_as_base64() {
        let audio = AudioRef::Inline {
            mime_type: "audio/wav".to_string(),
            data: Bytes::from_static(b"RIFF"),
        };
        let json = serde_json::to_value(&audio).unwrap();
        assert_eq!(json["kind"], "inline");
        assert_eq!(json["data_base64"], "UklGRg==");
    }
}
