// src/client/state.rs
//! Client-side view of conversations and the optimistic send lifecycle.
//! Everything here is plain data plus pure transitions; `ChatSession`
//! decides when to apply them and publishes the result.

use crate::models::chat::{Conversation, Message, MessageRole, SendMessageResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Local identifier of a message the server has not confirmed yet.
/// Never interchangeable with a durable message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempId(Uuid);

impl TempId {
    pub fn new() -> Self {
        TempId(Uuid::new_v4())
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

/// One entry of a conversation as the user sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MessageView {
    /// Stored by the server
    Confirmed(Message),
    /// Sent, waiting for the server
    Pending {
        temp_id: TempId,
        content: String,
        created_at: DateTime<Utc>,
    },
    /// The send failed; content is kept for a retry
    Failed {
        temp_id: TempId,
        content: String,
        created_at: DateTime<Utc>,
        cause: String,
        /// The server already stored the user message and only the reply is missing.
        reply_pending: bool,
    },
}

impl MessageView {
    pub fn content(&self) -> &str {
        match self {
            MessageView::Confirmed(message) => &message.content,
            MessageView::Pending { content, .. } | MessageView::Failed { content, .. } => content,
        }
    }

    /// Local entries are always authored by the user.
    pub fn role(&self) -> MessageRole {
        match self {
            MessageView::Confirmed(message) => message.role,
            _ => MessageRole::User,
        }
    }

    pub fn confirmed_id(&self) -> Option<Uuid> {
        match self {
            MessageView::Confirmed(message) => Some(message.id),
            _ => None,
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, MessageView::Confirmed(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendPhase {
    #[default]
    Idle,
    Sending,
    Error,
}

/// The failed entry of a thread, as needed to retry it.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    pub temp_id: TempId,
    pub content: String,
    pub reply_pending: bool,
}

/// What the server already did with a send whose response never arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum UnseenSend {
    /// The user message is stored and answered.
    Answered(SendMessageResponse),
    /// The user message is stored and is still the newest message.
    Unanswered,
}

/// Message list and send phase of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub messages: Vec<MessageView>,
    pub phase: SendPhase,
    pub error: Option<String>,
}

impl ThreadState {
    pub fn from_confirmed(messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into_iter().map(MessageView::Confirmed).collect(),
            ..Self::default()
        }
    }

    /// Appends a pending entry and moves to `Sending`. Returns `None` while
    /// another send is in flight. A previous failed entry is dropped; its
    /// content is what is being resent.
    pub fn begin_send(&mut self, content: &str) -> Option<TempId> {
        if self.phase == SendPhase::Sending {
            return None;
        }
        self.messages.retain(|view| !matches!(view, MessageView::Failed { .. }));

        let temp_id = TempId::new();
        self.messages.push(MessageView::Pending {
            temp_id,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        self.phase = SendPhase::Sending;
        self.error = None;
        Some(temp_id)
    }

    /// Swaps the pending entry for the two stored messages.
    pub fn confirm(&mut self, temp_id: TempId, response: SendMessageResponse) {
        self.messages.retain(|view| !is_local_entry(view, temp_id));

        for message in [response.user_message, response.assistant_message] {
            // A resumed reply returns a user message the thread already holds.
            let known = self
                .messages
                .iter()
                .any(|view| view.confirmed_id() == Some(message.id));
            if !known {
                self.messages.push(MessageView::Confirmed(message));
            }
        }
        self.phase = SendPhase::Idle;
        self.error = None;
    }

    /// Replaces the pending entry, in place, with a failed one.
    pub fn fail(&mut self, temp_id: TempId, cause: &str, reply_pending: bool) {
        for view in self.messages.iter_mut() {
            if let MessageView::Pending {
                temp_id: id,
                content,
                created_at,
            } = view
            {
                if *id == temp_id {
                    *view = MessageView::Failed {
                        temp_id,
                        content: std::mem::take(content),
                        created_at: *created_at,
                        cause: cause.to_string(),
                        reply_pending,
                    };
                    break;
                }
            }
        }
        self.phase = SendPhase::Error;
        self.error = Some(cause.to_string());
    }

    pub fn failed_entry(&self) -> Option<FailedEntry> {
        self.messages.iter().find_map(|view| match view {
            MessageView::Failed {
                temp_id,
                content,
                reply_pending,
                ..
            } => Some(FailedEntry {
                temp_id: *temp_id,
                content: content.clone(),
                reply_pending: *reply_pending,
            }),
            _ => None,
        })
    }

    /// Drops the failed entry and returns its content.
    pub fn clear_failure(&mut self) -> Option<String> {
        let failed = self.failed_entry();
        self.messages.retain(|view| !matches!(view, MessageView::Failed { .. }));
        if self.phase == SendPhase::Error {
            self.phase = SendPhase::Idle;
        }
        self.error = None;
        failed.map(|entry| entry.content)
    }

    /// Looks through freshly listed `stored` messages for a user message with
    /// `content` that this thread never confirmed.
    pub fn unseen_send(&self, stored: &[Message], content: &str) -> Option<UnseenSend> {
        let known: HashSet<Uuid> = self
            .messages
            .iter()
            .filter_map(MessageView::confirmed_id)
            .collect();
        let unseen: Vec<&Message> = stored.iter().filter(|m| !known.contains(&m.id)).collect();

        let pos = unseen
            .iter()
            .rposition(|m| m.role == MessageRole::User && m.content == content)?;
        let user = unseen[pos];
        match unseen.get(pos + 1) {
            Some(next) if next.role == MessageRole::Assistant => {
                Some(UnseenSend::Answered(SendMessageResponse {
                    user_message: user.clone(),
                    assistant_message: (*next).clone(),
                }))
            }
            None if stored.last().map(|m| m.id) == Some(user.id) => Some(UnseenSend::Unanswered),
            _ => None,
        }
    }

    /// Reloads the stored messages, keeping local entries at the end.
    pub fn replace_confirmed(&mut self, messages: Vec<Message>) {
        let local: Vec<MessageView> = self
            .messages
            .drain(..)
            .filter(MessageView::is_local)
            .collect();
        self.messages = messages.into_iter().map(MessageView::Confirmed).collect();
        self.messages.extend(local);
    }
}

fn is_local_entry(view: &MessageView, temp_id: TempId) -> bool {
    match view {
        MessageView::Pending { temp_id: id, .. } | MessageView::Failed { temp_id: id, .. } => {
            *id == temp_id
        }
        MessageView::Confirmed(_) => false,
    }
}

/// Snapshot published to every subscriber of a `ChatSession`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    /// Newest first, as the server lists them.
    pub conversations: Vec<Conversation>,
    pub current: Option<Uuid>,
    pub threads: HashMap<Uuid, ThreadState>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ClientState {
    pub fn thread(&self, conversation_id: Uuid) -> Option<&ThreadState> {
        self.threads.get(&conversation_id)
    }

    pub fn current_thread(&self) -> Option<&ThreadState> {
        self.current.and_then(|id| self.threads.get(&id))
    }

    pub fn thread_mut(&mut self, conversation_id: Uuid) -> &mut ThreadState {
        self.threads.entry(conversation_id).or_default()
    }

    pub fn is_sending(&self, conversation_id: Uuid) -> bool {
        self.thread(conversation_id)
            .map(|thread| thread.phase == SendPhase::Sending)
            .unwrap_or(false)
    }
}
