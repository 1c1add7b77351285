// src/services/chat_service.rs
//! Server side of the send pipeline.
//!
//! A send runs strictly in order: write the user message, read the history
//! back, ask the completion provider, write the assistant message. The user
//! message is never rolled back when a later step fails.

use crate::completion_client::{CompletionClient, CompletionError, CompletionRequest};
use crate::error::ChatError;
use crate::models::chat::{normalize_title, Conversation, Message, MessageRole, SendMessageResponse};
use crate::services::context::assemble_context;
use crate::store::{ConversationStore, MessageStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

pub const DEFAULT_CONTEXT_WINDOW: usize = 10;
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant.";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Number of trailing messages replayed to the model.
    pub context_window: usize,
    pub system_instruction: String,
    pub model: String,
    pub completion_timeout: Duration,
    /// Queue sends on the same conversation instead of letting them interleave.
    pub serialize_sends: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            serialize_sends: false,
        }
    }
}

#[derive(Default)]
struct SendLocks {
    locks: std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SendLocks {
    async fn acquire(&self, conversation_id: Uuid) -> SendTurn<'_> {
        let lock = match self.locks.lock() {
            Ok(mut locks) => locks.entry(conversation_id).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(conversation_id).or_default().clone(),
        };
        SendTurn {
            guard: Some(lock.lock_owned().await),
            locks: self,
            conversation_id,
        }
    }

    /// Drops the entry once no turn holds or waits for it.
    fn release(&self, conversation_id: Uuid) {
        if let Ok(mut locks) = self.locks.lock() {
            let idle = locks
                .get(&conversation_id)
                .map(|lock| Arc::strong_count(lock) == 1)
                .unwrap_or(false);
            if idle {
                locks.remove(&conversation_id);
            }
        }
    }

    fn forget(&self, conversation_id: Uuid) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&conversation_id);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

/// Exclusive right to send on one conversation while `SERIALIZE_SENDS` is on.
struct SendTurn<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a SendLocks,
    conversation_id: Uuid,
}

impl Drop for SendTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.conversation_id);
    }
}

pub struct ChatService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    completion: Arc<dyn CompletionClient>,
    settings: ChatSettings,
    send_locks: SendLocks,
}

impl ChatService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        completion: Arc<dyn CompletionClient>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            conversations,
            messages,
            completion,
            settings,
            send_locks: SendLocks::default(),
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn completion_configured(&self) -> bool {
        self.completion.is_configured()
    }

    pub async fn store_healthy(&self) -> bool {
        self.conversations.health_check().await.is_ok()
    }

    pub async fn create_conversation(
        &self,
        owner_id: i32,
        title: Option<&str>,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .conversations
            .create(owner_id, &normalize_title(title))
            .await?;
        tracing::info!(
            conversation_id = %conversation.id,
            owner_id,
            "conversation created"
        );
        Ok(conversation)
    }

    pub async fn list_conversations(&self, owner_id: i32) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.conversations.list_by_owner(owner_id).await?)
    }

    pub async fn list_messages(
        &self,
        owner_id: i32,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        self.require_owned(conversation_id, owner_id).await?;
        Ok(self.messages.list_by_conversation(conversation_id).await?)
    }

    /// Removes the messages first, then the conversation, so a concurrent
    /// reader never sees messages of a conversation that is gone.
    pub async fn delete_conversation(&self, owner_id: i32, conversation_id: Uuid) -> Result<(), ChatError> {
        self.require_owned(conversation_id, owner_id).await?;

        let removed = self.messages.delete_all_for_conversation(conversation_id).await?;
        self.conversations.delete(conversation_id).await?;
        self.send_locks.forget(conversation_id);

        tracing::info!(
            conversation_id = %conversation_id,
            removed_messages = removed,
            "conversation deleted"
        );
        Ok(())
    }

    /// Persists `content` as a user message and returns it together with the
    /// assistant's persisted reply.
    pub async fn send_message(
        &self,
        owner_id: i32,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendMessageResponse, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::ValidationFailed(
                "Message content cannot be empty".to_string(),
            ));
        }
        self.require_owned(conversation_id, owner_id).await?;
        let _guard = self.lock_if_serialized(conversation_id).await;

        let user_message = self
            .messages
            .append(conversation_id, owner_id, content, MessageRole::User)
            .await?;
        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %user_message.id,
            "user message saved"
        );

        let history = self.messages.list_by_conversation(conversation_id).await?;
        let assistant_message = self.generate_reply(conversation_id, owner_id, &history).await?;

        Ok(SendMessageResponse {
            user_message,
            assistant_message,
        })
    }

    /// Asks for the missing reply to the newest message of a conversation,
    /// without writing a new user message. Used after `CompletionFailed`.
    pub async fn resume_reply(
        &self,
        owner_id: i32,
        conversation_id: Uuid,
    ) -> Result<SendMessageResponse, ChatError> {
        self.require_owned(conversation_id, owner_id).await?;
        let _guard = self.lock_if_serialized(conversation_id).await;

        let history = self.messages.list_by_conversation(conversation_id).await?;
        let user_message = match history.last() {
            Some(last) if last.role == MessageRole::User => last.clone(),
            _ => {
                return Err(ChatError::ValidationFailed(
                    "Conversation has no unanswered message".to_string(),
                ))
            }
        };

        let assistant_message = self.generate_reply(conversation_id, owner_id, &history).await?;
        Ok(SendMessageResponse {
            user_message,
            assistant_message,
        })
    }

    async fn generate_reply(
        &self,
        conversation_id: Uuid,
        owner_id: i32,
        history: &[Message],
    ) -> Result<Message, ChatError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: assemble_context(
                history,
                self.settings.context_window,
                &self.settings.system_instruction,
            ),
        };

        let timeout = self.settings.completion_timeout;
        let reply = match tokio::time::timeout(timeout, self.completion.complete(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(CompletionError::Timeout(timeout).into()),
        };

        let assistant_message = self
            .messages
            .append(conversation_id, owner_id, &reply, MessageRole::Assistant)
            .await?;
        tracing::info!(
            conversation_id = %conversation_id,
            context_messages = request.messages.len(),
            reply_len = reply.len(),
            "assistant reply saved"
        );
        Ok(assistant_message)
    }

    async fn require_owned(&self, conversation_id: Uuid, owner_id: i32) -> Result<Conversation, ChatError> {
        self.conversations
            .find_owned(conversation_id, owner_id)
            .await?
            .ok_or(ChatError::NotFound)
    }

    async fn lock_if_serialized(&self, conversation_id: Uuid) -> Option<SendTurn<'_>> {
        if self.settings.serialize_sends {
            Some(self.send_locks.acquire(conversation_id).await)
        } else {
            None
        }
    }
}
