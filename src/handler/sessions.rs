use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::genai::GenerativeModel;
use crate::handler::error::ApiError;
use crate::handler::AppState;

type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub problem_image: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

pub async fn create_session<M: GenerativeModel>(State(state): State<AppState<M>>, Json(request): Json<CreateSessionRequest>) -> Result<(StatusCode, Json<Conversation>)> {
    let conversation = state.conversations.create(&request.problem_image)?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_session<M: GenerativeModel>(State(state): State<AppState<M>>, Path(id): Path<Uuid>) -> Result<Json<Conversation>> {
    Ok(Json(state.conversations.get(id)?))
}

pub async fn delete_session<M: GenerativeModel>(State(state): State<AppState<M>>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.conversations.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Asks a follow-up question; the reply carries the whole updated history.
pub async fn ask<M: GenerativeModel>(State(state): State<AppState<M>>, Path(id): Path<Uuid>, Json(request): Json<QuestionRequest>) -> Result<Json<Conversation>> {
    Ok(Json(state.conversations.ask(id, &request.question, &state.tutor).await?))
}
