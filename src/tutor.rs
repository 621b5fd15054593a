//! Turns a problem photo and a question into an explanation.
//!
//! A spoken explanation is two sequential upstream calls: the text answer
//! first, then speech for exactly that text. Raw PCM from the speech model is
//! framed as WAV before it becomes a data URI.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::genai::prompts::{
    ConversationalTextPrompt, ExplanationInput, HomeworkHelp, HomeworkHelpInput, HomeworkHelpPrompt, ProblemDescription, ProblemImageInput, VisualProblemPrompt,
};
use crate::genai::{GenAiError, GenerativeModel};
use crate::media::audio_format::AudioEncoding;
use crate::media::data_uri::{DataUri, DataUriError};
use crate::media::PlayableAudio;
use crate::media::wav::{WavError, WavSpec};

pub const DEFAULT_VOICE: &str = "Algenib";

type Result<T> = std::result::Result<T, TutorError>;

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Problem image is not a usable data URI: {0}")]
    InvalidImage(#[from] DataUriError),

    #[error("Upstream generation failed: {0}")]
    Upstream(#[from] GenAiError),

    #[error("Synthesized audio is malformed: {0}")]
    Audio(#[from] WavError),
}

/// Speech half of the explanation.
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    /// When false the explanation is text only.
    pub enabled: bool,
    pub voice: String,
    /// Layout assumed for raw PCM whose media type doesn't spell it out.
    pub pcm: WavSpec,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: DEFAULT_VOICE.to_string(),
            pcm: WavSpec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub text_explanation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_explanation: Option<String>,
}

pub struct Tutor<M> {
    model: M,
    speech: SpeechSettings,
}

impl<M: GenerativeModel> Tutor<M> {
    pub fn new(model: M, speech: SpeechSettings) -> Self {
        Self { model, speech }
    }

    pub fn speech(&self) -> &SpeechSettings {
        &self.speech
    }

    /// Text explanation followed, when speech is enabled, by a spoken version of it.
    pub async fn explain(&self, problem_image: &str, student_question: &str) -> Result<Explanation> {
        let input = ExplanationInput {
            problem_image: parse_image(problem_image)?,
            student_question: require_text(student_question, "Question")?,
        };

        let text_explanation = self.model.generate::<ConversationalTextPrompt>(&input).await?.text_explanation;
        if text_explanation.trim().is_empty() {
            return Err(GenAiError::EmptyResponse.into());
        }

        let audio_explanation = if self.speech.enabled {
            Some(self.speak(&text_explanation).await?)
        } else {
            debug!("Speech disabled, returning text only");
            None
        };

        Ok(Explanation {
            text_explanation,
            audio_explanation,
        })
    }

    /// Synthesizes `text` and returns a playable data URI.
    pub async fn speak(&self, text: &str) -> Result<String> {
        Ok(self.synthesize(text, &self.speech.voice).await?.into_data_uri())
    }

    /// Synthesizes `text` with `voice`, framing raw PCM as WAV.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<PlayableAudio> {
        let audio = self.model.synthesize_speech(text, voice).await?;

        let encoding = AudioEncoding::classify(&audio.mime_type, self.speech.pcm);
        info!("Synthesized {} bytes of {} (raw PCM: {})", audio.data.len(), audio.mime_type, encoding.is_raw_pcm());

        Ok(PlayableAudio::from_encoding(encoding, audio.data)?)
    }

    /// Single-shot answer to a question about the photo, no audio.
    pub async fn help(&self, query: &str, photo_data_uri: &str) -> Result<HomeworkHelp> {
        let input = HomeworkHelpInput {
            query: require_text(query, "Query")?,
            photo: parse_image(photo_data_uri)?,
        };

        Ok(self.model.generate::<HomeworkHelpPrompt>(&input).await?)
    }

    /// Describes the equation or diagram in the photo.
    pub async fn describe(&self, photo_data_uri: &str) -> Result<ProblemDescription> {
        let input = ProblemImageInput {
            photo: parse_image(photo_data_uri)?,
        };

        Ok(self.model.generate::<VisualProblemPrompt>(&input).await?)
    }
}

fn require_text(value: &str, field: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(TutorError::InvalidRequest {
            message: format!("{field} cannot be empty"),
        });
    }

    Ok(value.to_string())
}

/// Accepts only `data:image/...;base64,` URIs with a non-empty payload.
pub fn parse_image(uri: &str) -> Result<DataUri> {
    let image: DataUri = uri.parse()?;

    if !image.essence().starts_with("image/") {
        return Err(TutorError::InvalidRequest {
            message: format!("Expected an image, got {}", image.mime_type()),
        });
    }

    if image.data().is_empty() {
        return Err(TutorError::InvalidRequest {
            message: "Image data is empty".to_string(),
        });
    }

    Ok(image)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use crate::genai::prompts::Prompt;
    use crate::genai::{GenAiError, GenerativeModel, SynthesizedAudio};

    /// Canned provider: answers every prompt with `output` and every speech request with `audio`.
    pub struct FakeModel {
        pub output: Value,
        pub audio: Option<SynthesizedAudio>,
        pub text_calls: AtomicUsize,
        pub speech_calls: AtomicUsize,
        pub spoken: Mutex<Vec<(String, String)>>,
    }

    impl FakeModel {
        pub fn new(output: Value, audio: Option<SynthesizedAudio>) -> Self {
            Self {
                output,
                audio,
                text_calls: AtomicUsize::new(0),
                speech_calls: AtomicUsize::new(0),
                spoken: Mutex::new(Vec::new()),
            }
        }

        /// Explains with "Subtract 2 from both sides." and speaks 4 bytes of L16 PCM.
        pub fn explaining() -> Self {
            Self::new(
                json!({
                    "textExplanation": "Subtract 2 from both sides.",
                    "response": "The slope is 2.",
                    "problemDescription": "The equation x + 2 = 5."
                }),
                Some(SynthesizedAudio {
                    mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                    data: vec![0x00, 0x01, 0x02, 0x03],
                }),
            )
        }

        pub fn text_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst)
        }

        pub fn speech_calls(&self) -> usize {
            self.speech_calls.load(Ordering::SeqCst)
        }
    }

    impl GenerativeModel for FakeModel {
        async fn generate<P: Prompt>(&self, _input: &P::Input) -> crate::genai::Result<P::Output> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            serde_json::from_value(self.output.clone()).map_err(|source| GenAiError::OutputParsing { prompt: P::NAME, source })
        }

        async fn synthesize_speech(&self, text: &str, voice: &str) -> crate::genai::Result<SynthesizedAudio> {
            self.speech_calls.fetch_add(1, Ordering::SeqCst);
            self.spoken.lock().unwrap().push((text.to_string(), voice.to_string()));
            self.audio.clone().ok_or(GenAiError::NoAudio)
        }
    }

    pub const PHOTO: &str = "data:image/jpeg;base64,/9j/4AAQ";
}
