use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::conversation::ConversationError;
use crate::genai::GenAiError;
use crate::media::wav::WavError;
use crate::tutor::TutorError;

/// Everything a handler can fail with, mapped onto HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error(transparent)]
    Tutor(#[from] TutorError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Audio encoding failed: {0}")]
    AudioEncoding(#[from] WavError),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Standard error response format.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,

    #[serde(rename = "type")]
    pub error_type: String,
}

impl ApiError {
    /// Convert errors to API-friendly JSON responses; upstream details stay in the logs.
    fn to_error_response(&self) -> ErrorResponse {
        let (message, error_type) = match self {
            ApiError::InvalidRequest { message } => (message.clone(), "invalid_request_error"),
            ApiError::Tutor(e) | ApiError::Conversation(ConversationError::Tutor(e)) => tutor_error_detail(e),
            ApiError::Conversation(e @ ConversationError::NotFound(_)) => (e.to_string(), "not_found_error"),
            ApiError::Conversation(e @ ConversationError::Busy(_)) => (e.to_string(), "conflict_error"),
            ApiError::AudioEncoding(e @ WavError::InvalidSpec { .. }) => (e.to_string(), "invalid_request_error"),
            ApiError::AudioEncoding(e) => (e.to_string(), "audio_error"),
            ApiError::Response(_) => ("Failed to build response".to_string(), "server_error"),
        };

        ErrorResponse {
            error: ErrorDetail {
                message,
                error_type: error_type.to_string(),
            },
        }
    }

    /// Map errors to appropriate HTTP status codes.
    fn to_status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Tutor(e) | ApiError::Conversation(ConversationError::Tutor(e)) => tutor_status(e),
            ApiError::Conversation(ConversationError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Conversation(ConversationError::Busy(_)) => StatusCode::CONFLICT,
            ApiError::AudioEncoding(WavError::InvalidSpec { .. }) => StatusCode::BAD_REQUEST,
            ApiError::AudioEncoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Response(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn tutor_error_detail(e: &TutorError) -> (String, &'static str) {
    match e {
        TutorError::InvalidRequest { .. } | TutorError::InvalidImage(_) => (e.to_string(), "invalid_request_error"),
        TutorError::Upstream(GenAiError::Blocked { .. }) => ("The request was blocked by content filters".to_string(), "upstream_error"),
        TutorError::Upstream(_) => ("An error occurred while getting the explanation".to_string(), "upstream_error"),
        TutorError::Audio(_) => ("Synthesized audio was malformed".to_string(), "audio_error"),
    }
}

fn tutor_status(e: &TutorError) -> StatusCode {
    match e {
        TutorError::InvalidRequest { .. } | TutorError::InvalidImage(_) => StatusCode::BAD_REQUEST,
        TutorError::Upstream(_) => StatusCode::BAD_GATEWAY,
        TutorError::Audio(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.to_status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        (status, Json(self.to_error_response())).into_response()
    }
}
