pub mod audio_format;
pub mod data_uri;
pub mod wav;

use crate::media::audio_format::AudioEncoding;
use crate::media::data_uri::DataUri;
use crate::media::wav::{encode_wav, WavError, WAV_MIME_TYPE};

/// Audio in a form a standard player accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableAudio {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PlayableAudio {
    /// Raw PCM gets WAV framing; containers are kept untouched.
    pub fn from_encoding(encoding: AudioEncoding, data: Vec<u8>) -> Result<Self, WavError> {
        match encoding {
            AudioEncoding::RawPcm(spec) => Ok(Self {
                mime_type: WAV_MIME_TYPE.to_string(),
                data: encode_wav(&data, spec)?,
            }),
            AudioEncoding::Container(mime_type) => Ok(Self { mime_type, data }),
        }
    }

    /// A URI an audio element can play directly.
    pub fn into_data_uri(self) -> String {
        DataUri::new(self.mime_type, self.data).to_string()
    }
}
