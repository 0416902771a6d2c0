//! Conversation history store
//!
//! The history itself lives behind the finance backend. This module defines
//! the seam the tracker reads through, plus an in-memory store for local runs
//! and tests.

use crate::error::AssistantError;
use crate::models::{Conversation, Turn};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for conversation history access
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// `page` is 1-based.
    async fn list_conversations(&self, page: u32, limit: u32) -> Result<Vec<Conversation>>;
    async fn conversation_messages(&self, conversation_id: &str, page: u32, limit: u32) -> Result<Vec<Turn>>;
    /// `Ok(false)` when the store refused; `Err(NotFound)` for unknown ids.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct StoredConversation {
    conversation: Conversation,
    turns: Vec<Turn>,
}

/// In-memory conversation store for development
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<String, StoredConversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace a conversation with the given turns.
    pub async fn seed(&self, conversation_id: &str, title: &str, turns: Vec<Turn>) {
        let now = Utc::now();
        let created_at = turns.first().map(|t| t.timestamp).unwrap_or(now);
        let updated_at = turns.last().map(|t| t.timestamp).unwrap_or(now);

        let conversation = Conversation {
            id: conversation_id.to_string(),
            title: title.to_string(),
            last_message_preview: turns.last().map(|t| t.text.clone()).unwrap_or_default(),
            turn_count: turns.len() as u32,
            created_at,
            updated_at,
        };

        let mut conversations = self.conversations.write().await;
        conversations.insert(
            conversation_id.to_string(),
            StoredConversation { conversation, turns },
        );
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page_bounds(page: u32, limit: u32) -> (usize, usize) {
    let skip = page.saturating_sub(1) as usize * limit as usize;
    (skip, limit as usize)
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {

    async fn list_conversations(&self, page: u32, limit: u32) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.read().await;

        let mut items: Vec<Conversation> = conversations
            .values()
            .map(|stored| stored.conversation.clone())
            .collect();

        // Most recently updated first
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let (skip, take) = page_bounds(page, limit);
        Ok(items.into_iter().skip(skip).take(take).collect())
    }

    async fn conversation_messages(&self, conversation_id: &str, page: u32, limit: u32) -> Result<Vec<Turn>> {
        let conversations = self.conversations.read().await;

        let stored = conversations.get(conversation_id).ok_or_else(|| {
            AssistantError::NotFound(format!("conversation {}", conversation_id))
        })?;

        let (skip, take) = page_bounds(page, limit);
        Ok(stored.turns.iter().skip(skip).take(take).cloned().collect())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let mut conversations = self.conversations.write().await;

        conversations
            .remove(conversation_id)
            .map(|_| true)
            .ok_or_else(|| AssistantError::NotFound(format!("conversation {}", conversation_id)))
    }
}
