// Shared fixtures for unit tests: a scripted completion provider, a store
// wrapper that fails assistant writes, and an HTTP server on an ephemeral port.

use crate::completion_client::{CompletionClient, CompletionError, CompletionRequest, PromptRole};
use crate::handlers::app_router;
use crate::middleware::auth::issue_token;
use crate::models::chat::{Message, MessageRole};
use crate::services::{ChatService, ChatSettings};
use crate::store::{MemoryStore, MessageStore, StoreError};
use crate::AppState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";

#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delays: Mutex<VecDeque<Duration>>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every call waits until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: Result<String, CompletionError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Delay for the next call only, ahead of any fixed delay.
    pub fn push_delay(&self, delay: Duration) {
        self.delays.lock().unwrap().push_back(delay);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next_delay = self.delays.lock().unwrap().pop_front();
        if let Some(delay) = next_delay.or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let last_user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == PromptRole::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(format!("You said: {}", last_user))
        })
    }
}

/// Message store that accepts user messages but fails every assistant write.
pub struct FailingAssistantWrites {
    inner: MemoryStore,
}

impl FailingAssistantWrites {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageStore for FailingAssistantWrites {
    async fn append(
        &self,
        conversation_id: Uuid,
        owner_id: i32,
        content: &str,
        role: MessageRole,
    ) -> Result<Message, StoreError> {
        match role {
            MessageRole::Assistant => Err(StoreError::CorruptRecord("disk full".to_string())),
            MessageRole::User => self.inner.append(conversation_id, owner_id, content, role).await,
        }
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.inner.list_by_conversation(conversation_id).await
    }

    async fn delete_all_for_conversation(&self, conversation_id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete_all_for_conversation(conversation_id).await
    }
}

pub fn test_state_with(completion: Arc<ScriptedCompletion>, settings: ChatSettings) -> Arc<AppState> {
    let store = MemoryStore::new();
    Arc::new(AppState {
        chat: ChatService::new(Arc::new(store.clone()), Arc::new(store), completion, settings),
        jwt_secret: TEST_SECRET.to_string(),
    })
}

pub fn test_state(completion: Arc<ScriptedCompletion>) -> Arc<AppState> {
    test_state_with(completion, ChatSettings::default())
}

/// Serves the full router on 127.0.0.1 and returns its base URL.
pub async fn spawn_app(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn bearer(user_id: i32) -> String {
    issue_token(user_id, &format!("user{}", user_id), TEST_SECRET, chrono::Duration::hours(1)).unwrap()
}
