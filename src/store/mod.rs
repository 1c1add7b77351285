// src/store/mod.rs
//! Persistence seams for conversations and messages.
//!
//! The orchestrator only talks to these traits. Two backends exist: Postgres
//! (via sqlx) for deployments and an in-process store for local runs and tests.

use crate::models::chat::{Conversation, Message, MessageRole};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, owner_id: i32, title: &str) -> Result<Conversation, StoreError>;

    /// Conversations of one owner, newest first.
    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<Conversation>, StoreError>;

    /// `None` when the conversation is missing or belongs to someone else.
    async fn find_owned(&self, id: Uuid, owner_id: i32) -> Result<Option<Conversation>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message and bumps the conversation's `updated_at`.
    async fn append(
        &self,
        conversation_id: Uuid,
        owner_id: i32,
        content: &str,
        role: MessageRole,
    ) -> Result<Message, StoreError>;

    /// Messages of one conversation, oldest first.
    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Returns how many messages were removed.
    async fn delete_all_for_conversation(&self, conversation_id: Uuid) -> Result<u64, StoreError>;
}
