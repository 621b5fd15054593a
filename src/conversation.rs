//! Server-held chat sessions: one captured problem, many questions about it.
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::genai::GenerativeModel;
use crate::tutor::{parse_image, Tutor, TutorError};

pub const GREETING: &str = "Great! I've got the problem. What's your question?";

type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Conversation {0} not found")]
    NotFound(Uuid),

    #[error("Conversation {0} is still answering the previous question")]
    Busy(Uuid),

    #[error(transparent)]
    Tutor(#[from] TutorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl ChatMessage {
    fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            audio: None,
        }
    }

    fn ai(text: impl Into<String>, audio: Option<String>) -> Self {
        Self {
            role: Role::Ai,
            text: text.into(),
            audio,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: u64,
    pub messages: Vec<ChatMessage>,
    pub pending: bool,

    #[serde(skip)]
    problem_image: String,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, Conversation>,
    // Creation order, oldest first
    order: VecDeque<Uuid>,
}

/// In-memory conversations. The map lock is never held across an await.
pub struct ConversationStore {
    sessions: Mutex<Sessions>,
    max_sessions: usize,
}

impl ConversationStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a conversation about `problem_image`, greeting the student.
    pub fn create(&self, problem_image: &str) -> Result<Conversation> {
        parse_image(problem_image)?;

        let conversation = Conversation {
            id: Uuid::new_v4(),
            created_at: current_timestamp(),
            messages: vec![ChatMessage::ai(GREETING, None)],
            pending: false,
            problem_image: problem_image.to_string(),
        };

        let mut sessions = self.lock();
        while sessions.by_id.len() >= self.max_sessions {
            let Some(oldest) = sessions.order.pop_front() else {
                break;
            };
            sessions.by_id.remove(&oldest);
            debug!("Evicted conversation {oldest}");
        }

        sessions.order.push_back(conversation.id);
        sessions.by_id.insert(conversation.id, conversation.clone());

        info!("Created conversation {}", conversation.id);
        Ok(conversation)
    }

    pub fn get(&self, id: Uuid) -> Result<Conversation> {
        self.lock().by_id.get(&id).cloned().ok_or(ConversationError::NotFound(id))
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.lock();
        sessions.by_id.remove(&id).ok_or(ConversationError::NotFound(id))?;
        sessions.order.retain(|existing| *existing != id);

        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.lock().by_id.len()
    }

    /// Asks `question`, appending both sides of the turn. A failed or abandoned turn leaves the history untouched.
    pub async fn ask<M: GenerativeModel>(&self, id: Uuid, question: &str, tutor: &Tutor<M>) -> Result<Conversation> {
        if question.trim().is_empty() {
            return Err(TutorError::InvalidRequest {
                message: "Question cannot be empty".to_string(),
            }
            .into());
        }

        let (turn, problem_image) = self.begin_turn(id, question)?;

        let explanation = match tutor.explain(&problem_image, question).await {
            Ok(explanation) => explanation,
            Err(e) => {
                warn!("Question in conversation {id} failed: {e}");
                return Err(e.into());
            }
        };

        turn.complete(explanation.text_explanation, explanation.audio_explanation)
    }

    /// Records the question and claims the turn until the returned guard completes or drops.
    fn begin_turn(&self, id: Uuid, question: &str) -> Result<(Turn<'_>, String)> {
        let mut sessions = self.lock();
        let conversation = sessions.by_id.get_mut(&id).ok_or(ConversationError::NotFound(id))?;

        if conversation.pending {
            return Err(ConversationError::Busy(id));
        }

        conversation.pending = true;
        conversation.messages.push(ChatMessage::user(question));

        let turn = Turn {
            store: self,
            id,
            completed: false,
        };

        Ok((turn, conversation.problem_image.clone()))
    }
}

/// An in-flight question. Dropping it before `complete` removes the question again.
struct Turn<'a> {
    store: &'a ConversationStore,
    id: Uuid,
    completed: bool,
}

impl Turn<'_> {
    fn complete(mut self, text: String, audio: Option<String>) -> Result<Conversation> {
        self.completed = true;

        let mut sessions = self.store.lock();
        let conversation = sessions.by_id.get_mut(&self.id).ok_or(ConversationError::NotFound(self.id))?;

        conversation.pending = false;
        conversation.messages.push(ChatMessage::ai(text, audio));

        Ok(conversation.clone())
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let mut sessions = self.store.lock();
        if let Some(conversation) = sessions.by_id.get_mut(&self.id) {
            conversation.pending = false;
            conversation.messages.pop();
            debug!("Rolled back unanswered question in conversation {}", self.id);
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::prompts::Prompt;
    use crate::genai::SynthesizedAudio;
    use crate::tutor::testing::{FakeModel, PHOTO};
    use crate::tutor::SpeechSettings;
    use serde_json::json;
    use std::time::Duration;

    /// Never answers, like an upstream call the client gives up on.
    struct StalledModel;

    impl GenerativeModel for StalledModel {
        async fn generate<P: Prompt>(&self, _input: &P::Input) -> crate::genai::Result<P::Output> {
            std::future::pending().await
        }

        async fn synthesize_speech(&self, _text: &str, _voice: &str) -> crate::genai::Result<SynthesizedAudio> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_create_greets() {
        let store = ConversationStore::new(10);
        let conversation = store.create(PHOTO).unwrap();

        assert_eq!(conversation.messages, vec![ChatMessage::ai(GREETING, None)]);
        assert!(conversation.created_at > 0);
        assert_eq!(store.get(conversation.id).unwrap().id, conversation.id);
    }

    #[tokio::test]
    async fn test_create_rejects_non_image() {
        let store = ConversationStore::new(10);
        let result = store.create("data:text/plain;base64,aGk=");

        assert!(matches!(result, Err(ConversationError::Tutor(TutorError::InvalidRequest { .. }))));
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_appends_turn() {
        let store = ConversationStore::new(10);
        let tutor = Tutor::new(FakeModel::explaining(), SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        let conversation = store.ask(id, "How?", &tutor).await.unwrap();

        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[1], ChatMessage::user("How?"));
        assert_eq!(conversation.messages[2].role, Role::Ai);
        assert_eq!(conversation.messages[2].text, "Subtract 2 from both sides.");
        assert!(conversation.messages[2].audio.as_deref().unwrap().starts_with("data:audio/wav;base64,"));
        assert!(!conversation.pending);
    }

    #[tokio::test]
    async fn test_failed_turn_rolls_back() {
        let store = ConversationStore::new(10);
        let tutor = Tutor::new(FakeModel::new(json!({ "textExplanation": "Add 3." }), None), SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        let result = store.ask(id, "How?", &tutor).await;
        assert!(matches!(result, Err(ConversationError::Tutor(TutorError::Upstream(_)))));

        let conversation = store.get(id).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert!(!conversation.pending);
    }

    #[tokio::test]
    async fn test_unknown_and_deleted_sessions() {
        let store = ConversationStore::new(10);
        let tutor = Tutor::new(FakeModel::explaining(), SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        store.delete(id).unwrap();

        assert!(matches!(store.get(id), Err(ConversationError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(ConversationError::NotFound(_))));
        assert!(matches!(store.ask(id, "How?", &tutor).await, Err(ConversationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let store = ConversationStore::new(10);
        let tutor = Tutor::new(FakeModel::explaining(), SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        assert!(matches!(store.ask(id, " \n", &tutor).await, Err(ConversationError::Tutor(TutorError::InvalidRequest { .. }))));
        assert_eq!(tutor.speech().voice, "Algenib");
        assert_eq!(store.get(id).unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_turn_makes_session_busy() {
        let store = ConversationStore::new(10);
        let tutor = Tutor::new(FakeModel::explaining(), SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        store.lock().by_id.get_mut(&id).unwrap().pending = true;

        assert!(matches!(store.ask(id, "How?", &tutor).await, Err(ConversationError::Busy(_))));
        assert_eq!(store.get(id).unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_turn_rolls_back() {
        let store = ConversationStore::new(10);
        let stalled = Tutor::new(StalledModel, SpeechSettings::default());
        let id = store.create(PHOTO).unwrap().id;

        let abandoned = tokio::time::timeout(Duration::from_millis(50), store.ask(id, "How?", &stalled)).await;
        assert!(abandoned.is_err());

        let conversation = store.get(id).unwrap();
        assert!(!conversation.pending);
        assert_eq!(conversation.messages.len(), 1);

        let tutor = Tutor::new(FakeModel::explaining(), SpeechSettings::default());
        let conversation = store.ask(id, "How?", &tutor).await.unwrap();
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[1], ChatMessage::user("How?"));
    }

    #[tokio::test]
    async fn test_oldest_session_evicted() {
        let store = ConversationStore::new(2);
        let first = store.create(PHOTO).unwrap().id;
        let second = store.create(PHOTO).unwrap().id;
        let third = store.create(PHOTO).unwrap().id;

        assert_eq!(store.session_count(), 2);
        assert!(store.get(first).is_err());
        assert!(store.get(second).is_ok());
        assert!(store.get(third).is_ok());
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(ChatMessage::ai("Hi", None)).unwrap();
        assert_eq!(value, json!({ "role": "ai", "text": "Hi" }));
    }
}
