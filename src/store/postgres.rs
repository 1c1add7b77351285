// src/store/postgres.rs
use super::{ConversationStore, MessageStore, StoreError};
use crate::models::chat::{Conversation, Message, MessageRole};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

type MessageRow = (Uuid, Uuid, i32, String, String, chrono::DateTime<chrono::Utc>);

fn message_from_row(
    (id, conversation_id, owner_id, content, role, created_at): MessageRow,
) -> Result<Message, StoreError> {
    let role = role.parse::<MessageRole>().map_err(StoreError::CorruptRecord)?;
    Ok(Message {
        id,
        conversation_id,
        owner_id,
        content,
        role,
        created_at,
    })
}

/// Conversations and messages stored in Postgres, schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn create(&self, owner_id: i32, title: &str) -> Result<Conversation, StoreError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (id, owner_id, title)
             VALUES ($1, $2, $3)
             RETURNING id, owner_id, title, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(title)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(conversation)
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<Conversation>, StoreError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "SELECT id, owner_id, title, created_at, updated_at
             FROM conversations
             WHERE owner_id = $1
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(conversations)
    }

    async fn find_owned(&self, id: Uuid, owner_id: i32) -> Result<Option<Conversation>, StoreError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT id, owner_id, title, created_at, updated_at
             FROM conversations
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(conversation)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        // Messages first, then the conversation, in one transaction.
        let mut tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.db_pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        owner_id: i32,
        content: &str,
        role: MessageRole,
    ) -> Result<Message, StoreError> {
        tracing::debug!(
            conversation_id = %conversation_id,
            role = %role,
            content_len = content.len(),
            "saving message"
        );

        let mut tx = self.db_pool.begin().await?;
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (id, conversation_id, owner_id, content, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, conversation_id, owner_id, content, role, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(owner_id)
        .bind(content)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(row.5)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        message_from_row(row)
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, owner_id, content, role, created_at
             FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn delete_all_for_conversation(&self, conversation_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected())
    }
}
