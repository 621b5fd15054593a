/// HTTP client for the Gemini `generateContent` API.
///
/// Text prompts are sent with a JSON response schema so answers come back as
/// typed structs; speech synthesis asks for the AUDIO modality and returns the
/// inline audio payload with its declared media type.
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::genai::prompts::{Part, Prompt};
use crate::genai::{GenAiError, GenerativeModel, Result, SynthesizedAudio};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

// Linear backoff: attempt n waits n * RETRY_BACKOFF
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Content filter threshold for one harm category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            threshold: threshold.into(),
        }
    }
}

pub fn default_safety_settings() -> Vec<SafetySetting> {
    vec![
        SafetySetting::new("HARM_CATEGORY_HATE_SPEECH", "BLOCK_ONLY_HIGH"),
        SafetySetting::new("HARM_CATEGORY_DANGEROUS_CONTENT", "BLOCK_NONE"),
        SafetySetting::new("HARM_CATEGORY_HARASSMENT", "BLOCK_MEDIUM_AND_ABOVE"),
        SafetySetting::new("HARM_CATEGORY_SEXUALLY_EXPLICIT", "BLOCK_LOW_AND_ABOVE"),
    ]
}

/// Connection and model settings for the provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub text_model: String,
    pub tts_model: String,
    pub safety_settings: Vec<SafetySetting>,
    pub retry_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            safety_settings: default_safety_settings(),
            retry_attempts: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,

    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<&'a [SafetySetting]>,

    generation_config: GenerationConfig,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,

    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, or why there are none.
    fn into_parts(self) -> Result<Vec<Part>> {
        if let Some(reason) = self.prompt_feedback.and_then(|feedback| feedback.block_reason) {
            return Err(GenAiError::Blocked { reason });
        }

        let candidate = self.candidates.into_iter().next().ok_or(GenAiError::EmptyResponse)?;
        let parts = candidate.content.map(|content| content.parts).unwrap_or_default();

        if parts.is_empty() {
            return match candidate.finish_reason.as_deref() {
                Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => Err(GenAiError::Blocked { reason: reason.to_string() }),
                _ => Err(GenAiError::EmptyResponse),
            };
        }

        Ok(parts)
    }

    fn into_text(self) -> Result<String> {
        let text: String = self.into_parts()?.into_iter().filter_map(|part| part.text).collect();

        if text.trim().is_empty() {
            return Err(GenAiError::EmptyResponse);
        }

        Ok(text)
    }

    fn into_audio(self) -> Result<SynthesizedAudio> {
        let inline = self.into_parts()?.into_iter().find_map(|part| part.inline_data).ok_or(GenAiError::NoAudio)?;

        let data = STANDARD.decode(inline.data.trim())?;
        if data.is_empty() {
            return Err(GenAiError::NoAudio);
        }

        Ok(SynthesizedAudio {
            mime_type: inline.mime_type,
            data,
        })
    }
}

// ---------------------------------------------------------------------------

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(client: Client, config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GenAiError::MissingApiKey);
        }

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.config.api_url.trim_end_matches('/'), model)
    }

    /// POST with retries on rate limiting, server errors and transport failures.
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest<'_>) -> Result<GenerateContentResponse> {
        let url = self.endpoint(model);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once(&url, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt <= self.config.retry_attempts => {
                    warn!("Request to {model} failed (attempt {attempt}): {e}, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, request: &GenerateContentRequest<'_>) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("Content-Type", JSON_MIME_TYPE)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

            return Err(GenAiError::HttpStatus { status, message });
        }

        Ok(response.json().await?)
    }
}

impl GenerativeModel for GeminiClient {
    async fn generate<P: Prompt>(&self, input: &P::Input) -> Result<P::Output> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: P::parts(input),
            }],
            safety_settings: Some(self.config.safety_settings.as_slice()),
            generation_config: GenerationConfig {
                response_mime_type: Some(JSON_MIME_TYPE),
                response_schema: Some(P::output_schema()),
                ..Default::default()
            },
        };

        debug!("Running prompt {} on {}", P::NAME, self.config.text_model);

        let text = self.generate_content(&self.config.text_model, &request).await?.into_text()?;
        serde_json::from_str(&text).map_err(|source| GenAiError::OutputParsing { prompt: P::NAME, source })
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<SynthesizedAudio> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(text)],
            }],
            safety_settings: None,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: Some(speech_config(voice)),
                ..Default::default()
            },
        };

        debug!("Synthesizing {} chars with voice '{voice}'", text.len());

        self.generate_content(&self.config.tts_model, &request).await?.into_audio()
    }
}

fn speech_config(voice: &str) -> Value {
    serde_json::json!({
        "voiceConfig": {
            "prebuiltVoiceConfig": { "voiceName": voice }
        }
    })
}

impl GenAiError {
    /// Whether a retry has a chance of succeeding.
    fn is_transient(&self) -> bool {
        match self {
            GenAiError::HttpStatus { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            GenAiError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Builder pattern for easier configuration.
pub struct GeminiClientBuilder {
    client: Option<Client>,
    config: GeminiConfig,
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            config: GeminiConfig::default(),
        }
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: GeminiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.config.text_model = model.into();
        self
    }

    pub fn tts_model(mut self, model: impl Into<String>) -> Self {
        self.config.tts_model = model.into();
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let client = self.client.unwrap_or_default();
        GeminiClient::new(client, self.config)
    }
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
