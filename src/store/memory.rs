// src/store/memory.rs
use super::{ConversationStore, MessageStore, StoreError};
use crate::models::chat::{Conversation, Message, MessageRole};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    // Both vectors are kept in insertion order, which is creation order.
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

/// In-process store used when no `DATABASE_URL` is configured and by tests.
/// A single lock covers both tables so every write is atomic to readers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(&self, owner_id: i32, title: &str) -> Result<Conversation, StoreError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<Conversation>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .iter()
            .rev()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_owned(&self, id: Uuid, owner_id: i32) -> Result<Option<Conversation>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .iter()
            .find(|c| c.id == id && c.owner_id == owner_id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.messages.retain(|m| m.conversation_id != id);
        tables.conversations.retain(|c| c.id != id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        owner_id: i32,
        content: &str,
        role: MessageRole,
    ) -> Result<Message, StoreError> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            owner_id,
            content: content.to_string(),
            role,
            created_at: now,
        };

        let mut tables = self.tables.write().await;
        if let Some(conversation) = tables.conversations.iter_mut().find(|c| c.id == conversation_id) {
            conversation.updated_at = now;
        }
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn delete_all_for_conversation(&self, conversation_id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.messages.len();
        tables.messages.retain(|m| m.conversation_id != conversation_id);
        Ok((before - tables.messages.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversations_listed_newest_first_per_owner() {
        let store = MemoryStore::new();
        let first = store.create(1, "first").await.unwrap();
        let _other = store.create(2, "someone else").await.unwrap();
        let second = store.create(1, "second").await.unwrap();

        let listed = store.list_by_owner(1).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_find_owned_hides_foreign_conversations() {
        let store = MemoryStore::new();
        let conversation = store.create(1, "mine").await.unwrap();

        assert!(store.find_owned(conversation.id, 1).await.unwrap().is_some());
        assert!(store.find_owned(conversation.id, 2).await.unwrap().is_none());
        assert!(store.find_owned(Uuid::new_v4(), 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_keep_insertion_order_and_reads_are_stable() {
        let store = MemoryStore::new();
        let conversation = store.create(1, "t").await.unwrap();
        for (i, role) in [MessageRole::User, MessageRole::Assistant, MessageRole::User]
            .into_iter()
            .enumerate()
        {
            store
                .append(conversation.id, 1, &format!("m{}", i), role)
                .await
                .unwrap();
        }

        let first_read = store.list_by_conversation(conversation.id).await.unwrap();
        let second_read = store.list_by_conversation(conversation.id).await.unwrap();
        assert_eq!(first_read, second_read);
        let contents: Vec<&str> = first_read.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn test_append_bumps_updated_at() {
        let store = MemoryStore::new();
        let conversation = store.create(1, "t").await.unwrap();
        let message = store
            .append(conversation.id, 1, "hi", MessageRole::User)
            .await
            .unwrap();

        let reloaded = store.find_owned(conversation.id, 1).await.unwrap().unwrap();
        assert_eq!(reloaded.updated_at, message.created_at);
    }

    #[tokio::test]
    async fn test_delete_removes_conversation_and_its_messages() {
        let store = MemoryStore::new();
        let doomed = store.create(1, "doomed").await.unwrap();
        let kept = store.create(1, "kept").await.unwrap();
        store.append(doomed.id, 1, "a", MessageRole::User).await.unwrap();
        store.append(kept.id, 1, "b", MessageRole::User).await.unwrap();

        store.delete(doomed.id).await.unwrap();

        assert!(store.list_by_conversation(doomed.id).await.unwrap().is_empty());
        assert!(store.find_owned(doomed.id, 1).await.unwrap().is_none());
        assert_eq!(store.list_by_conversation(kept.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_for_conversation_reports_count() {
        let store = MemoryStore::new();
        let conversation = store.create(1, "t").await.unwrap();
        store.append(conversation.id, 1, "a", MessageRole::User).await.unwrap();
        store.append(conversation.id, 1, "b", MessageRole::Assistant).await.unwrap();

        let removed = store.delete_all_for_conversation(conversation.id).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.list_by_conversation(conversation.id).await.unwrap().is_empty());
    }
}
