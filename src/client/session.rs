// src/client/session.rs
use crate::client::api::{ApiError, ChatApi};
use crate::client::state::{ClientState, TempId, UnseenSend};
use crate::models::chat::{Conversation, SendMessageResponse};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

const LOAD_CONVERSATIONS_FAILED: &str = "Failed to load conversations. Please try again.";
const LOAD_MESSAGES_FAILED: &str = "Failed to load messages. Please try again.";
const CREATE_CONVERSATION_FAILED: &str = "Failed to create a new conversation. Please try again.";
const DELETE_CONVERSATION_FAILED: &str = "Failed to delete the conversation. Please try again.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("message content is empty")]
    EmptyContent,
    #[error("a message is already being sent in this conversation")]
    SendInFlight,
    #[error("there is no failed message to retry")]
    NothingToRetry,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Owns the client state and applies every transition through a watch
/// channel, so subscribers always see a complete snapshot.
pub struct ChatSession<A: ChatApi> {
    api: A,
    state: watch::Sender<ClientState>,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: A) -> Self {
        let (state, _) = watch::channel(ClientState::default());
        Self { api, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Loads the conversation list; selects the newest when nothing is selected.
    pub async fn refresh_conversations(&self) -> Result<(), ClientError> {
        self.state.send_modify(|s| s.loading = true);

        match self.api.list_conversations().await {
            Ok(conversations) => {
                let newest = conversations.first().map(|c| c.id);
                let mut auto_select = None;
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = None;
                    let still_listed = s
                        .current
                        .map(|id| conversations.iter().any(|c| c.id == id))
                        .unwrap_or(false);
                    if !still_listed {
                        s.current = newest;
                        auto_select = newest;
                    }
                    s.conversations = conversations;
                });

                if let Some(conversation_id) = auto_select {
                    self.load_messages(conversation_id).await?;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversations");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(LOAD_CONVERSATIONS_FAILED.to_string());
                });
                Err(e.into())
            }
        }
    }

    pub async fn select_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.state.send_modify(|s| s.current = Some(conversation_id));
        self.load_messages(conversation_id).await
    }

    async fn load_messages(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.state.send_modify(|s| s.loading = true);

        match self.api.list_messages(conversation_id).await {
            Ok(messages) => {
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = None;
                    s.thread_mut(conversation_id).replace_confirmed(messages);
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, %conversation_id, "failed to load messages");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(LOAD_MESSAGES_FAILED.to_string());
                });
                Err(e.into())
            }
        }
    }

    /// Creates a conversation, puts it at the top of the list and selects it.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, ClientError> {
        match self.api.create_conversation(title).await {
            Ok(conversation) => {
                let created = conversation.clone();
                self.state.send_modify(|s| {
                    s.current = Some(conversation.id);
                    s.threads.insert(conversation.id, Default::default());
                    s.conversations.insert(0, conversation);
                });
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create conversation");
                self.state
                    .send_modify(|s| s.error = Some(CREATE_CONVERSATION_FAILED.to_string()));
                Err(e.into())
            }
        }
    }

    /// Sends `content` to the current conversation, creating one first when
    /// nothing is selected.
    pub async fn send_message(&self, content: &str) -> Result<SendMessageResponse, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyContent);
        }

        let current = self.state.borrow().current;
        let conversation_id = match current {
            Some(id) => id,
            None => self.create_conversation(None).await?.id,
        };

        let temp_id = self.begin_send(conversation_id, content)?;
        let outcome = self.api.send_message(conversation_id, content).await;
        self.finish_send(conversation_id, temp_id, outcome)
    }

    /// Retries the failed entry of the current conversation without storing
    /// the user message twice. After a 502 only the reply is requested. After
    /// any other failure the conversation is reloaded first, since the server
    /// may have stored (and even answered) the message before the failure.
    pub async fn retry_failed(&self) -> Result<SendMessageResponse, ClientError> {
        let (conversation_id, failed) = {
            let state = self.state.borrow();
            let conversation_id = state.current.ok_or(ClientError::NothingToRetry)?;
            let failed = state
                .thread(conversation_id)
                .and_then(|thread| thread.failed_entry())
                .ok_or(ClientError::NothingToRetry)?;
            (conversation_id, failed)
        };

        let temp_id = self.begin_send(conversation_id, &failed.content)?;
        let outcome = if failed.reply_pending {
            tracing::debug!(%conversation_id, "resuming reply for stored message");
            self.api.resume_reply(conversation_id).await
        } else {
            self.resend(conversation_id, &failed.content).await
        };
        self.finish_send(conversation_id, temp_id, outcome)
    }

    async fn resend(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let stored = self.api.list_messages(conversation_id).await?;
        let unseen = self
            .state
            .borrow()
            .thread(conversation_id)
            .and_then(|thread| thread.unseen_send(&stored, content));

        match unseen {
            Some(UnseenSend::Answered(response)) => {
                tracing::debug!(%conversation_id, "adopting reply stored after the failed send");
                Ok(response)
            }
            Some(UnseenSend::Unanswered) => {
                tracing::debug!(%conversation_id, "resuming reply for stored message");
                self.api.resume_reply(conversation_id).await
            }
            None => self.api.send_message(conversation_id, content).await,
        }
    }

    fn begin_send(&self, conversation_id: Uuid, content: &str) -> Result<TempId, ClientError> {
        let mut temp_id = None;
        self.state.send_if_modified(|s| {
            temp_id = s.thread_mut(conversation_id).begin_send(content);
            temp_id.is_some()
        });
        temp_id.ok_or(ClientError::SendInFlight)
    }

    fn finish_send(
        &self,
        conversation_id: Uuid,
        temp_id: TempId,
        outcome: Result<SendMessageResponse, ApiError>,
    ) -> Result<SendMessageResponse, ClientError> {
        match outcome {
            Ok(response) => {
                self.state.send_modify(|s| {
                    s.thread_mut(conversation_id).confirm(temp_id, response.clone());
                });
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, %conversation_id, "send failed");
                let cause = e.user_message();
                self.state.send_modify(|s| {
                    s.thread_mut(conversation_id).fail(temp_id, cause, e.reply_pending());
                    s.error = Some(cause.to_string());
                });
                Err(e.into())
            }
        }
    }

    /// Deletes a conversation; when it was current the next remaining one
    /// is selected.
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        if let Err(e) = self.api.delete_conversation(conversation_id).await {
            tracing::warn!(error = %e, %conversation_id, "failed to delete conversation");
            self.state
                .send_modify(|s| s.error = Some(DELETE_CONVERSATION_FAILED.to_string()));
            return Err(e.into());
        }

        let mut next = None;
        self.state.send_modify(|s| {
            s.conversations.retain(|c| c.id != conversation_id);
            s.threads.remove(&conversation_id);
            if s.current == Some(conversation_id) {
                s.current = s.conversations.first().map(|c| c.id);
                next = s.current;
            }
        });

        if let Some(next_id) = next {
            self.load_messages(next_id).await?;
        }
        Ok(())
    }

    /// Clears the error slot and the current conversation's failed entry,
    /// returning that entry's content.
    pub fn clear_error(&self) -> Option<String> {
        let mut content = None;
        self.state.send_modify(|s| {
            s.error = None;
            if let Some(current) = s.current {
                content = s.thread_mut(current).clear_failure();
            }
        });
        content
    }
}
