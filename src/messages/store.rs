//! Message persistence boundary.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;

use crate::messages::model::{Message, NewMessage};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for contact messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, input: NewMessage) -> Result<Message, StoreError>;

    async fn get(&self, id: u64) -> Result<Option<Message>, StoreError>;

    /// All messages, newest first.
    async fn list(&self) -> Result<Vec<Message>, StoreError>;
}

/// Process-local store.
#[derive(Debug)]
pub struct InMemoryMessageStore {
    messages: DashMap<u64, Message>,
    next_id: AtomicU64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, input: NewMessage) -> Result<Message, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let message = Message {
            id,
            sender_name: input.sender_name.trim().to_string(),
            sender_email: input.sender_email.trim().to_string(),
            subject: input.subject.trim().to_string(),
            message: input.message.trim().to_string(),
            is_read: false,
            created_at: now,
            updated_at: now,
        };
        self.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: u64) -> Result<Option<Message>, StoreError> {
        Ok(self.messages.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages)
    }
}
