//! Wraps an uploaded raw PCM body in a WAV header.
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::genai::GenerativeModel;
use crate::handler::error::ApiError;
use crate::handler::AppState;
use crate::media::data_uri::DataUri;
use crate::media::wav::{encode_wav, WavSpec, WAV_MIME_TYPE};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavOutput {
    #[default]
    Wav,
    DataUri,
}

/// Missing layout fields fall back to the configured speech PCM layout.
#[derive(Debug, Default, Deserialize)]
pub struct WavQuery {
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u16>,

    #[serde(default)]
    pub format: WavOutput,
}

impl WavQuery {
    fn spec(&self, fallback: WavSpec) -> WavSpec {
        WavSpec::new(
            self.channels.unwrap_or(fallback.channels),
            self.sample_rate.unwrap_or(fallback.sample_rate),
            self.bits_per_sample.unwrap_or(fallback.bits_per_sample),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUriResponse {
    pub data_uri: String,
}

pub async fn encode_pcm<M: GenerativeModel>(State(state): State<AppState<M>>, Query(query): Query<WavQuery>, body: Bytes) -> Result<Response, ApiError> {
    let spec = query.spec(state.tutor.speech().pcm);
    let wav = encode_wav(&body, spec)?;
    debug!("Framed {} PCM bytes as {:?}", body.len(), spec);

    let response = match query.format {
        WavOutput::Wav => ([(header::CONTENT_TYPE, WAV_MIME_TYPE)], wav).into_response(),
        WavOutput::DataUri => Json(DataUriResponse {
            data_uri: DataUri::new(WAV_MIME_TYPE, wav).to_string(),
        })
        .into_response(),
    };

    Ok(response)
}
