/// HTTP endpoint for text-to-speech.
///
/// Synthesizes the whole clip upstream, frames raw PCM as WAV, then streams it
/// back to the client in fixed-size chunks.
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::genai::GenerativeModel;
use crate::handler::error::ApiError;
use crate::handler::AppState;

const DEFAULT_RESPONSE_FORMAT: &str = "wav";

type Result<T> = std::result::Result<T, ApiError>;

/// Request payload for speech synthesis.
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub input: String, // Text to synthesize

    #[serde(default)]
    pub voice: Option<String>, // Prebuilt voice name, e.g. "Algenib"

    #[serde(default)]
    pub response_format: Option<String>, // Output format (only "wav" supported)
}

impl SpeechRequest {
    fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(ApiError::InvalidRequest {
                message: "Input text cannot be empty".to_string(),
            });
        }

        if matches!(&self.voice, Some(voice) if voice.trim().is_empty()) {
            return Err(ApiError::InvalidRequest {
                message: "Voice cannot be empty".to_string(),
            });
        }

        if self.response_format() != DEFAULT_RESPONSE_FORMAT {
            return Err(ApiError::InvalidRequest {
                message: format!("Unsupported response format: {}", self.response_format()),
            });
        }

        Ok(())
    }

    fn response_format(&self) -> &str {
        self.response_format.as_deref().unwrap_or(DEFAULT_RESPONSE_FORMAT)
    }
}

pub async fn generate_speech<M: GenerativeModel>(State(state): State<AppState<M>>, Json(request): Json<SpeechRequest>) -> Result<Response> {
    request.validate()?;

    let voice = request.voice.as_deref().unwrap_or(state.tutor.speech().voice.as_str());
    info!("Generating speech for voice '{}' with {} chars", voice, request.input.len());

    let audio = state.tutor.synthesize(&request.input, voice).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, audio.mime_type.as_str())
        .header(header::CACHE_CONTROL, "no-cache") // Prevent caching of generated audio
        .header("X-Response-Format", request.response_format())
        .body(Body::from_stream(chunked(Bytes::from(audio.data), state.chunk_size)))?;

    Ok(response)
}

/// Splits `data` into `chunk_size` pieces without copying.
fn chunked(data: Bytes, chunk_size: usize) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<_> = (0..data.len()).step_by(chunk_size).map(|start| Ok::<_, std::io::Error>(data.slice(start..data.len().min(start + chunk_size)))).collect();

    futures::stream::iter(chunks)
}
