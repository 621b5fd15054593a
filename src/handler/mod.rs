pub mod error;
pub mod explain;
pub mod health;
pub mod sessions;
pub mod speech;
pub mod wav;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::conversation::ConversationStore;
use crate::genai::GenerativeModel;
use crate::tutor::Tutor;

/// Shared handler state.
pub struct AppState<M> {
    pub tutor: Arc<Tutor<M>>,
    pub conversations: Arc<ConversationStore>,
    pub chunk_size: usize,
}

// Derived Clone would require `M: Clone`
impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            tutor: Arc::clone(&self.tutor),
            conversations: Arc::clone(&self.conversations),
            chunk_size: self.chunk_size,
        }
    }
}

impl<M: GenerativeModel> AppState<M> {
    pub fn new(tutor: Tutor<M>, conversations: ConversationStore, chunk_size: usize) -> Self {
        Self {
            tutor: Arc::new(tutor),
            conversations: Arc::new(conversations),
            chunk_size: chunk_size.max(1),
        }
    }
}

pub fn router<M: GenerativeModel + 'static>(state: AppState<M>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/v1/explanations", post(explain::explain::<M>))
        .route("/v1/homework-help", post(explain::homework_help::<M>))
        .route("/v1/problems/describe", post(explain::describe::<M>))
        .route("/v1/audio/speech", post(speech::generate_speech::<M>))
        .route("/v1/audio/wav", post(wav::encode_pcm::<M>))
        .route("/v1/sessions", post(sessions::create_session::<M>))
        .route("/v1/sessions/{id}", get(sessions::get_session::<M>).delete(sessions::delete_session::<M>))
        .route("/v1/sessions/{id}/messages", post(sessions::ask::<M>))
        .layer(DefaultBodyLimit::max(config.max_request_bytes))
        .with_state(state);

    if config.cors.enabled {
        app = app.layer(ServiceBuilder::new().layer(CorsLayer::permissive()));
    }

    app.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::genai::SynthesizedAudio;
    use crate::tutor::testing::{FakeModel, PHOTO};
    use crate::tutor::SpeechSettings;

    fn app(model: FakeModel) -> Router {
        let state = AppState::new(Tutor::new(model, SpeechSettings::default()), ConversationStore::new(10), 8);
        router(state, &ServerConfig::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, body.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };

        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send_json(&app(FakeModel::explaining()), empty("GET", "/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_explanation_has_text_and_audio() {
        let app = app(FakeModel::explaining());
        let request = post_json("/v1/explanations", json!({"problemImage": PHOTO, "studentQuestion": "How do I solve for x?"}));

        let (status, body) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["textExplanation"], "Subtract 2 from both sides.");
        assert!(body["audioExplanation"].as_str().unwrap().starts_with("data:audio/wav;base64,UklGR"));
    }

    #[tokio::test]
    async fn test_explanation_rejects_bad_image() {
        let app = app(FakeModel::explaining());
        let request = post_json("/v1/explanations", json!({"problemImage": "not a uri", "studentQuestion": "Why?"}));

        let (status, body) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_speech_failure_is_bad_gateway() {
        let model = FakeModel::new(json!({"textExplanation": "Factor it."}), None);
        let request = post_json("/v1/explanations", json!({"problemImage": PHOTO, "studentQuestion": "Why?"}));

        let (status, body) = send_json(&app(model), request).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn test_homework_help_and_describe() {
        let app = app(FakeModel::explaining());

        let (status, body) = send_json(&app, post_json("/v1/homework-help", json!({"query": "What is the slope?", "photoDataUri": PHOTO}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "The slope is 2."}));

        let (status, body) = send_json(&app, post_json("/v1/problems/describe", json!({"photoDataUri": PHOTO}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"problemDescription": "The equation x + 2 = 5."}));
    }

    #[tokio::test]
    async fn test_speech_streams_wav() {
        let app = app(FakeModel::explaining());
        let response = app.oneshot(post_json("/v1/audio/speech", json!({"input": "Hello", "voice": "Kore"}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(response.headers()["x-response-format"], "wav");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 48);
        assert_eq!(&body[0..4], b"RIFF");
        assert_eq!(&body[44..], &[0x00, 0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_speech_container_passes_through() {
        let model = FakeModel::new(
            json!({}),
            Some(SynthesizedAudio {
                mime_type: "audio/mpeg".to_string(),
                data: b"ID3".to_vec(),
            }),
        );
        let response = app(model).oneshot(post_json("/v1/audio/speech", json!({"input": "Hello"}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    }

    #[tokio::test]
    async fn test_speech_rejects_unsupported_format() {
        let request = post_json("/v1/audio/speech", json!({"input": "Hello", "response_format": "mp3"}));
        let (status, _) = send_json(&app(FakeModel::explaining()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wav_endpoint() {
        let app = app(FakeModel::explaining());

        let request = Request::builder().method("POST").uri("/v1/audio/wav?sample_rate=24000").body(Body::from(vec![0u8; 200])).unwrap();
        let (status, wav) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wav.len(), 244);
        assert_eq!(&wav[24..28], &[0x40, 0x5D, 0x00, 0x00]);
        assert_eq!(&wav[40..44], &[0xC8, 0x00, 0x00, 0x00]);

        let request = Request::builder().method("POST").uri("/v1/audio/wav?format=data_uri").body(Body::empty()).unwrap();
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["dataUri"].as_str().unwrap().starts_with("data:audio/wav;base64,"));
    }

    #[tokio::test]
    async fn test_wav_endpoint_rejects_bad_input() {
        let app = app(FakeModel::explaining());

        let request = Request::builder().method("POST").uri("/v1/audio/wav").body(Body::from(vec![0u8; 3])).unwrap();
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["type"], "audio_error");

        let request = Request::builder().method("POST").uri("/v1/audio/wav?channels=0").body(Body::from(vec![0u8; 4])).unwrap();
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let app = app(FakeModel::explaining());

        let (status, created) = send_json(&app, post_json("/v1/sessions", json!({"problemImage": PHOTO}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["messages"][0]["role"], "ai");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, asked) = send_json(&app, post_json(&format!("/v1/sessions/{id}/messages"), json!({"question": "Why subtract?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(asked["messages"].as_array().unwrap().len(), 3);
        assert_eq!(asked["messages"][1], json!({"role": "user", "text": "Why subtract?"}));
        assert_eq!(asked["messages"][2]["text"], "Subtract 2 from both sides.");
        assert_eq!(asked["pending"], false);

        let (status, fetched) = send_json(&app, empty("GET", &format!("/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, asked);

        let (status, _) = send(&app, empty("DELETE", &format!("/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send_json(&app, empty("GET", &format!("/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found_error");
    }

    #[tokio::test]
    async fn test_failed_question_leaves_history() {
        let app = app(FakeModel::new(json!({"textExplanation": "Factor it."}), None));

        let (_, created) = send_json(&app, post_json("/v1/sessions", json!({"problemImage": PHOTO}))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = send_json(&app, post_json(&format!("/v1/sessions/{id}/messages"), json!({"question": "Why?"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, fetched) = send_json(&app, empty("GET", &format!("/v1/sessions/{id}"))).await;
        assert_eq!(fetched["messages"].as_array().unwrap().len(), 1);
    }
}
