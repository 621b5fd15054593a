use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::genai::client::default_safety_settings;
use crate::genai::{GeminiConfig, SafetySetting};
use crate::media::wav::WavSpec;
use crate::tutor::{SpeechSettings, DEFAULT_VOICE};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub genai: GenAiConfig,
    pub speech: SpeechConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenAiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_safety_settings")]
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_voice")]
    pub voice: String,

    /// Assumed layout of raw PCM when the media type doesn't say.
    #[serde(default)]
    pub pcm: WavSpec,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

// Default value functions for serde
fn default_bind_addr() -> String {
    "[::]:3000".to_string()
}
fn default_max_request_bytes() -> usize {
    20 * 1024 * 1024 // camera photos arrive base64-inflated
}
fn default_true() -> bool {
    true
}
fn default_api_url() -> String {
    GeminiConfig::default().api_url
}
fn default_text_model() -> String {
    GeminiConfig::default().text_model
}
fn default_tts_model() -> String {
    GeminiConfig::default().tts_model
}
fn default_timeout() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}
fn default_chunk_size() -> usize {
    16 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: CorsConfig::default(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            text_model: default_text_model(),
            tts_model: default_tts_model(),
            timeout_secs: default_timeout(),
            retry_attempts: default_retry_attempts(),
            safety_settings: default_safety_settings(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: default_voice(),
            pcm: WavSpec::default(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable override support.
    ///
    /// A missing file is not an error; built-in defaults are used instead.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() { Self::from_file(path)? } else { Self::default() };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind_addr) = var("SHASHA_BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }

        if let Some(api_key) = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")) {
            self.genai.api_key = api_key;
        }

        if let Some(log_level) = var("SHASHA_LOG_LEVEL") {
            self.logging.level = log_level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.genai.api_key.trim().is_empty() {
            anyhow::bail!("No API key configured: set genai.api_key or GEMINI_API_KEY");
        }

        if self.speech.voice.trim().is_empty() {
            anyhow::bail!("speech.voice cannot be empty");
        }

        if let Err(e) = self.speech.pcm.byte_rate() {
            anyhow::bail!("Invalid speech.pcm settings: {e}");
        }

        if self.streaming.chunk_size == 0 {
            anyhow::bail!("streaming.chunk_size must be positive");
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_url: self.genai.api_url.clone(),
            api_key: self.genai.api_key.clone(),
            text_model: self.genai.text_model.clone(),
            tts_model: self.genai.tts_model.clone(),
            safety_settings: self.genai.safety_settings.clone(),
            retry_attempts: self.genai.retry_attempts,
        }
    }

    pub fn speech_settings(&self) -> SpeechSettings {
        SpeechSettings {
            enabled: self.speech.enabled,
            voice: self.speech.voice.clone(),
            pcm: self.speech.pcm,
        }
    }
}
