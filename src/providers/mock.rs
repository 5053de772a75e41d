// Offline voice provider producing silent WAV audio
// Author: kelexine (https://github.com/kelexine)

use super::{ProviderError, VoiceProvider, VoiceRequest};
use crate::models::voice::estimate_duration;
use crate::models::AudioRef;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

const SAMPLE_RATE: u32 = 24_000;
const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Stands in for a real voice backend when no voice API key is configured.
#[derive(Debug, Clone, Default)]
pub struct MockVoiceProvider;

impl MockVoiceProvider {
    pub fn new() -> Self {
        Self
    }

    /// 16-bit mono PCM silence lasting as long as `script` takes to read.
    pub fn render_silence(script: &str) -> Bytes {
        let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
        let samples = (SAMPLE_RATE as f64 * estimate_duration(script)) as u32;
        let data_len = samples * block_align as u32;

        let mut wav = BytesMut::with_capacity(44 + data_len as usize);
        wav.put_slice(b"RIFF");
        wav.put_u32_le(36 + data_len);
        wav.put_slice(b"WAVE");

        wav.put_slice(b"fmt ");
        wav.put_u32_le(16);
        wav.put_u16_le(1); // PCM
        wav.put_u16_le(CHANNELS);
        wav.put_u32_le(SAMPLE_RATE);
        wav.put_u32_le(SAMPLE_RATE * block_align as u32);
        wav.put_u16_le(block_align);
        wav.put_u16_le(BITS_PER_SAMPLE);

        wav.put_slice(b"data");
        wav.put_u32_le(data_len);
        wav.put_bytes(0, data_len as usize);
        wav.freeze()
    }
}

#[async_trait]
impl VoiceProvider for MockVoiceProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn synthesize(&self, request: VoiceRequest) -> Result<AudioRef, ProviderError> {
        Ok(AudioRef::Inline {
            mime_type: "audio/wav".to_string(),
            data: Self::render_silence(&request.text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_layout() {
        // 30 characters read in two seconds.
        let wav = MockVoiceProvider::render_silence(&"a".repeat(30));
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");

        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_len, 2 * SAMPLE_RATE * 2);
        assert_eq!(wav.len(), 44 + data_len as usize);
    }

    #[tokio::test]
    async fn test_synthesize_returns_inline_wav() {
        let audio = MockVoiceProvider::new()
            .synthesize(VoiceRequest {
                text: "Wake up to something better.".into(),
                voice_id: "onyx".into(),
            })
            .await
            .unwrap();
        match audio {
            AudioRef::Inline { mime_type, data } => {
                assert_eq!(mime_type, "audio/wav");
                assert!(data.len() > 44);
            }
            AudioRef::Url(_) => panic!("mock renders inline audio"),
        }
    }
}
