//! Generative-AI provider boundary: typed prompts in, text or audio out.
pub mod client;
pub mod prompts;

use std::future::Future;

use thiserror::Error;

use crate::genai::prompts::Prompt;

pub use client::{GeminiClient, GeminiClientBuilder, GeminiConfig, SafetySetting};

pub type Result<T> = std::result::Result<T, GenAiError>;

/// Ways the upstream text or speech capability can fail to produce a usable result.
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("No API key configured for the generative model")]
    MissingApiKey,

    #[error("HTTP request failed with status {status}: {message}")]
    HttpStatus { status: reqwest::StatusCode, message: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request was blocked by the provider: {reason}")]
    Blocked { reason: String },

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Speech synthesis returned no audio")]
    NoAudio,

    #[error("Invalid base64 audio payload: {0}")]
    AudioPayload(#[from] base64::DecodeError),

    #[error("Output of prompt {prompt} did not match its schema: {source}")]
    OutputParsing {
        prompt: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Audio bytes exactly as the speech capability returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// The two capabilities the tutor needs from a provider.
pub trait GenerativeModel: Send + Sync {
    fn generate<P: Prompt>(&self, input: &P::Input) -> impl Future<Output = Result<P::Output>> + Send;

    fn synthesize_speech(&self, text: &str, voice: &str) -> impl Future<Output = Result<SynthesizedAudio>> + Send;
}
