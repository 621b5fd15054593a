//! Canonical RIFF/WAVE framing for raw little-endian PCM.
//!
//! Speech synthesis hands back headerless samples; browsers and most players
//! want a container. The header is 44 bytes and the sample bytes follow it
//! untouched.
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use thiserror::Error;

use crate::media::data_uri::DataUri;

pub const WAV_HEADER_LEN: usize = 44;
pub const WAV_MIME_TYPE: &str = "audio/wav";

// ChunkSize covers everything after the first 8 bytes: "WAVE" + fmt chunk + data chunk header
const RIFF_CHUNK_OVERHEAD: u32 = 36;
const FMT_CHUNK_SIZE: u32 = 16;
const FORMAT_PCM: u16 = 1;

pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

type Result<T> = std::result::Result<T, WavError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("Invalid audio parameters: {message}")]
    InvalidSpec { message: String },

    #[error("PCM buffer of {length} bytes is not a whole number of {block_align}-byte frames")]
    MisalignedFrames { length: usize, block_align: u16 },

    #[error("PCM buffer of {length} bytes does not fit in a WAV container")]
    TooLarge { length: usize },
}

/// Layout of the PCM samples: everything a reader needs that raw audio doesn't carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WavSpec {
    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
}

fn default_channels() -> u16 {
    DEFAULT_CHANNELS
}
fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}
fn default_bits_per_sample() -> u16 {
    DEFAULT_BITS_PER_SAMPLE
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
        }
    }
}

impl WavSpec {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    /// Checks the parameters and returns the size of one frame in bytes.
    pub fn block_align(&self) -> Result<u16> {
        if self.channels == 0 {
            return Err(WavError::InvalidSpec {
                message: "channel count must be positive".to_string(),
            });
        }

        if self.sample_rate == 0 {
            return Err(WavError::InvalidSpec {
                message: "sample rate must be positive".to_string(),
            });
        }

        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(WavError::InvalidSpec {
                message: format!("bits per sample must be a positive multiple of 8, got {}", self.bits_per_sample),
            });
        }

        self.channels.checked_mul(self.bits_per_sample / 8).ok_or_else(|| WavError::InvalidSpec {
            message: format!("{} channels of {} bits overflow the block alignment field", self.channels, self.bits_per_sample),
        })
    }

    /// Bytes of audio per second of playback.
    pub fn byte_rate(&self) -> Result<u32> {
        let block_align = self.block_align()?;

        self.sample_rate.checked_mul(u32::from(block_align)).ok_or_else(|| WavError::InvalidSpec {
            message: format!("sample rate {} overflows the byte rate field", self.sample_rate),
        })
    }
}

/// Header fields of a canonical 44-byte WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub spec: WavSpec,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Validates the spec and derives the header for `data_len` bytes of samples.
    pub fn new(spec: WavSpec, data_len: usize) -> Result<Self> {
        let block_align = spec.block_align()?;
        let byte_rate = spec.byte_rate()?;

        if data_len % usize::from(block_align) != 0 {
            return Err(WavError::MisalignedFrames { length: data_len, block_align });
        }

        // Both the data size and the RIFF chunk size are u32 fields
        let data_size = u32::try_from(data_len)
            .ok()
            .filter(|size| size.checked_add(RIFF_CHUNK_OVERHEAD).is_some())
            .ok_or(WavError::TooLarge { length: data_len })?;

        Ok(Self {
            spec,
            byte_rate,
            block_align,
            data_size,
        })
    }

    pub fn chunk_size(&self) -> u32 {
        RIFF_CHUNK_OVERHEAD + self.data_size
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        // RIFF descriptor
        buf.put_slice(b"RIFF");
        buf.put_u32_le(self.chunk_size());
        buf.put_slice(b"WAVE");

        // fmt sub-chunk
        buf.put_slice(b"fmt ");
        buf.put_u32_le(FMT_CHUNK_SIZE);
        buf.put_u16_le(FORMAT_PCM);
        buf.put_u16_le(self.spec.channels);
        buf.put_u32_le(self.spec.sample_rate);
        buf.put_u32_le(self.byte_rate);
        buf.put_u16_le(self.block_align);
        buf.put_u16_le(self.spec.bits_per_sample);

        // data sub-chunk header, samples follow
        buf.put_slice(b"data");
        buf.put_u32_le(self.data_size);
    }
}

/// Wraps raw PCM in a WAV container. The sample bytes are copied verbatim after the header.
pub fn encode_wav(samples: &[u8], spec: WavSpec) -> Result<Vec<u8>> {
    let header = WavHeader::new(spec, samples.len())?;

    let mut buf = BytesMut::with_capacity(WAV_HEADER_LEN + samples.len());
    header.write_to(&mut buf);
    buf.put_slice(samples);

    Ok(buf.to_vec())
}

/// Encodes raw PCM as a `data:audio/wav;base64,...` URI ready for an audio element.
pub fn wav_data_uri(samples: &[u8], spec: WavSpec) -> Result<String> {
    let wav = encode_wav(samples, spec)?;
    Ok(DataUri::new(WAV_MIME_TYPE, wav).to_string())
}
