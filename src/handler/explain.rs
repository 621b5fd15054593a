use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::genai::prompts::{HomeworkHelp, ProblemDescription};
use crate::genai::GenerativeModel;
use crate::handler::error::ApiError;
use crate::handler::AppState;
use crate::tutor::Explanation;

type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationRequest {
    pub problem_image: String,
    pub student_question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkHelpRequest {
    pub query: String,
    pub photo_data_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRequest {
    pub photo_data_uri: String,
}

/// Text plus spoken explanation for a question about the problem photo.
pub async fn explain<M: GenerativeModel>(State(state): State<AppState<M>>, Json(request): Json<ExplanationRequest>) -> Result<Json<Explanation>> {
    info!("Explaining problem for a {} char question", request.student_question.len());

    let explanation = state.tutor.explain(&request.problem_image, &request.student_question).await?;
    Ok(Json(explanation))
}

pub async fn homework_help<M: GenerativeModel>(State(state): State<AppState<M>>, Json(request): Json<HomeworkHelpRequest>) -> Result<Json<HomeworkHelp>> {
    info!("Answering a {} char homework query", request.query.len());

    Ok(Json(state.tutor.help(&request.query, &request.photo_data_uri).await?))
}

pub async fn describe<M: GenerativeModel>(State(state): State<AppState<M>>, Json(request): Json<DescribeRequest>) -> Result<Json<ProblemDescription>> {
    Ok(Json(state.tutor.describe(&request.photo_data_uri).await?))
}
