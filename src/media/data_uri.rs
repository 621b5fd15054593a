//! `data:<mime>;base64,<payload>` URIs, the form images arrive in and audio leaves in.
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use thiserror::Error;

// Media type (with optional parameters) followed by the base64 marker and payload
static DATA_URI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^data:(?P<mime>[^;,]+/[^;,]+(?:;[^;,]*)*?)(?P<base64>;base64)?,(?P<payload>.*)$").expect("data URI pattern is valid"));

type Result<T> = std::result::Result<T, DataUriError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("Not a data URI with a media type")]
    Malformed,

    #[error("Data URI for {mime_type} is not base64 encoded")]
    NotBase64 { mime_type: String },

    #[error("Invalid base64 payload: {0}")]
    Payload(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Full media type, parameters included (e.g. `audio/L16;rate=24000`).
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Lowercased `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        essence(&self.mime_type)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn payload_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload_base64())
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = DATA_URI_PATTERN.captures(s.trim()).ok_or(DataUriError::Malformed)?;
        let mime_type = caps["mime"].to_string();

        if caps.name("base64").is_none() {
            return Err(DataUriError::NotBase64 { mime_type });
        }

        // Long payloads are sometimes line-wrapped
        let payload: String = caps["payload"].chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let data = STANDARD.decode(payload)?;

        Ok(Self { mime_type, data })
    }
}

/// Strips parameters and normalizes case: `Audio/L16; rate=24000` -> `audio/l16`.
pub fn essence(mime_type: &str) -> String {
    mime_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
