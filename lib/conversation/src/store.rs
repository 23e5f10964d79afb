//! Message persistence.

use crate::error::StoreError;
use crate::message::{Message, MessageRole};
use async_trait::async_trait;
use scm_assistant_core::{ConversationId, Result, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Trait for message storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message to a conversation owned by `owner`.
    async fn append_message(
        &self,
        owner: UserId,
        conversation: ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Lists the most recent `limit` messages, oldest first.
    async fn list_messages(
        &self,
        owner: UserId,
        conversation: ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;
}

struct Thread {
    owner: UserId,
    messages: Vec<Message>,
}

/// Message store held in process memory.
#[derive(Default)]
pub struct InMemoryMessageStore {
    threads: Mutex<HashMap<ConversationId, Thread>>,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append_message(
        &self,
        owner: UserId,
        conversation: ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let thread = threads.entry(conversation).or_insert_with(|| Thread {
            owner,
            messages: Vec::new(),
        });
        if thread.owner != owner {
            return Err(StoreError::NotOwner { conversation }.into());
        }
        let message = Message::new(conversation, role, content);
        thread.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        owner: UserId,
        conversation: ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(thread) = threads.get(&conversation) else {
            return Ok(Vec::new());
        };
        if thread.owner != owner {
            return Err(StoreError::NotOwner { conversation }.into());
        }
        let skip = thread.messages.len().saturating_sub(limit);
        Ok(thread.messages[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_most_recent_in_order() {
        let store = InMemoryMessageStore::new();
        let owner = UserId::new();
        let conversation = ConversationId::new();
        for content in ["one", "two", "three"] {
            store
                .append_message(owner, conversation, MessageRole::User, content)
                .await
                .unwrap();
        }

        let messages = store.list_messages(owner, conversation, 2).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["two", "three"]);
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let store = InMemoryMessageStore::new();
        let messages = store
            .list_messages(UserId::new(), ConversationId::new(), 50)
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn other_owner_is_rejected() {
        let store = InMemoryMessageStore::new();
        let conversation = ConversationId::new();
        store
            .append_message(UserId::new(), conversation, MessageRole::User, "hi")
            .await
            .unwrap();

        assert!(
            store
                .list_messages(UserId::new(), conversation, 10)
                .await
                .is_err()
        );
        assert!(
            store
                .append_message(UserId::new(), conversation, MessageRole::User, "hi")
                .await
                .is_err()
        );
    }
}
