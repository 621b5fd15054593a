//! Prompt templates with typed inputs and schema-constrained outputs.
//!
//! Each template renders into an ordered list of content parts (text and the
//! inline problem photo) and declares the JSON shape the model must answer in.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::media::data_uri::DataUri;

/// One piece of model content: either text or inline binary data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String, // base64
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn media(uri: &DataUri) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: uri.mime_type().to_string(),
                data: uri.payload_base64(),
            }),
        }
    }
}

/// A named prompt whose answer deserializes into `Output`.
pub trait Prompt {
    const NAME: &'static str;

    type Input: Sync;
    type Output: DeserializeOwned + Send;

    fn parts(input: &Self::Input) -> Vec<Part>;

    /// Response schema in the provider's OpenAPI subset.
    fn output_schema() -> Value;
}

fn string_object_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            field: { "type": "STRING", "description": description }
        },
        "required": [field]
    })
}

// ---------------------------------------------------------------------------

pub struct ExplanationInput {
    pub problem_image: DataUri,
    pub student_question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExplanation {
    pub text_explanation: String,
}

/// Step-by-step tutoring answer used as the first half of a spoken explanation.
pub struct ConversationalTextPrompt;

impl Prompt for ConversationalTextPrompt {
    const NAME: &'static str = "conversationalTextPrompt";

    type Input = ExplanationInput;
    type Output = TextExplanation;

    fn parts(input: &ExplanationInput) -> Vec<Part> {
        vec![
            Part::text(
                "You are an AI tutor helping a student with their homework problem. \
                 Provide a clear, step-by-step explanation to answer their question based on the image provided.\n\nProblem: ",
            ),
            Part::media(&input.problem_image),
            Part::text(format!("\n\nQuestion: {}", input.student_question)),
        ]
    }

    fn output_schema() -> Value {
        string_object_schema("textExplanation", "The AI's text explanation of the problem.")
    }
}

// ---------------------------------------------------------------------------

pub struct HomeworkHelpInput {
    pub query: String,
    pub photo: DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkHelp {
    pub response: String,
}

pub struct HomeworkHelpPrompt;

impl Prompt for HomeworkHelpPrompt {
    const NAME: &'static str = "realTimeHomeworkHelpPrompt";

    type Input = HomeworkHelpInput;
    type Output = HomeworkHelp;

    fn parts(input: &HomeworkHelpInput) -> Vec<Part> {
        vec![
            Part::text(format!(
                "You are an AI tutor helping a student with their math homework. \
                 Use the image and question to give a helpful response.\n\nQuestion: {}\nImage: ",
                input.query
            )),
            Part::media(&input.photo),
        ]
    }

    fn output_schema() -> Value {
        string_object_schema("response", "The AI tutor's response to the student's question.")
    }
}

// ---------------------------------------------------------------------------

pub struct ProblemImageInput {
    pub photo: DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDescription {
    pub problem_description: String,
}

/// Recognizes math equations and physics diagrams.
pub struct VisualProblemPrompt;

impl Prompt for VisualProblemPrompt {
    const NAME: &'static str = "visualProblemSolverPrompt";

    type Input = ProblemImageInput;
    type Output = ProblemDescription;

    fn parts(input: &ProblemImageInput) -> Vec<Part> {
        vec![
            Part::text(
                "You are an expert in recognizing math equations and physics diagrams.\n\n\
                 Describe the math equation or physics diagram in the image. Be as detailed as possible.\n\nImage: ",
            ),
            Part::media(&input.photo),
        ]
    }

    fn output_schema() -> Value {
        string_object_schema("problemDescription", "A textual description of the math equation or physics diagram.")
    }
}
