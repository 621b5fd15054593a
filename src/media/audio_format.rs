//! Classifies synthesized audio by its declared media type.
//!
//! Speech models usually answer with headerless PCM described only by the MIME
//! string (`audio/L16;codec=pcm;rate=24000`). Anything else is assumed to be a
//! container a player already understands.
use crate::media::data_uri::essence;
use crate::media::wav::WavSpec;

const RAW_PCM_TYPES: [&str; 4] = ["audio/l16", "audio/pcm", "audio/raw", "audio/x-raw"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Headerless samples that still need WAV framing.
    RawPcm(WavSpec),
    /// Playable as-is; carries the original media type.
    Container(String),
}

impl AudioEncoding {
    /// Parses `mime_type`, taking rate/channel parameters from it when present and
    /// `fallback` otherwise.
    pub fn classify(mime_type: &str, fallback: WavSpec) -> Self {
        let essence = essence(mime_type);

        if !RAW_PCM_TYPES.contains(&essence.as_str()) {
            return AudioEncoding::Container(mime_type.trim().to_string());
        }

        let mut spec = fallback;
        if essence == "audio/l16" {
            spec.bits_per_sample = 16;
        }

        for param in mime_type.split(';').skip(1) {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };

            let value = value.trim().trim_matches('"');
            match key.trim().to_ascii_lowercase().as_str() {
                "rate" => {
                    if let Ok(rate) = value.parse() {
                        spec.sample_rate = rate;
                    }
                }
                "channels" => {
                    if let Ok(channels) = value.parse() {
                        spec.channels = channels;
                    }
                }
                "bits" | "bits_per_sample" => {
                    if let Ok(bits) = value.parse() {
                        spec.bits_per_sample = bits;
                    }
                }
                _ => {}
            }
        }

        AudioEncoding::RawPcm(spec)
    }

    pub fn is_raw_pcm(&self) -> bool {
        matches!(self, AudioEncoding::RawPcm(_))
    }
}
