//! Conversation Tracker
//!
//! Holds the session's active conversation id (a lookup key into the external
//! store, never an owned object) and the transcript shown for it.
//!
//! Every explicit switch (open, new, delete of the active thread) bumps an
//! epoch. A turn captures the epoch when it starts; if the epoch moved by the
//! time its reply lands, the reply is stale and is not appended.

use crate::models::{Conversation, Turn};
use crate::store::ConversationStore;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Snapshot of tracker state taken when a turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    pub epoch: u64,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Default)]
struct TrackerState {
    active: Option<String>,
    epoch: u64,
    transcript: Vec<Turn>,
}

impl TrackerState {
    fn switch_to(&mut self, conversation_id: Option<String>, transcript: Vec<Turn>) {
        self.active = conversation_id;
        self.epoch += 1;
        self.transcript = transcript;
    }
}

pub struct ConversationTracker {
    store: Arc<dyn ConversationStore>,
    state: RwLock<TrackerState>,
    conversation_page_size: u32,
    message_page_size: u32,
}

impl ConversationTracker {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        conversation_page_size: u32,
        message_page_size: u32,
    ) -> Self {
        Self {
            store,
            state: RwLock::new(TrackerState::default()),
            conversation_page_size,
            message_page_size,
        }
    }

    // =============================
    // Active pointer
    // =============================

    /// Point the session at `conversation_id`, or at nothing so the next turn
    /// starts a fresh thread. Clears the local transcript.
    pub async fn set_active(&self, conversation_id: Option<String>) {
        let mut state = self.state.write().await;
        state.switch_to(conversation_id, Vec::new());
    }

    pub async fn active(&self) -> Option<String> {
        self.state.read().await.active.clone()
    }

    pub async fn begin_turn(&self) -> TurnTicket {
        let state = self.state.read().await;
        TurnTicket {
            epoch: state.epoch,
            conversation_id: state.active.clone(),
        }
    }

    /// Take the conversation id the backend replied with, unless the user
    /// switched conversations while the turn was in flight.
    pub async fn adopt(&self, ticket: &TurnTicket, conversation_id: &str) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != ticket.epoch {
            debug!(conversation_id, "Ignoring conversation id from stale reply");
            return false;
        }
        if state.active.as_deref() != Some(conversation_id) {
            state.active = Some(conversation_id.to_string());
        }
        true
    }

    /// Append one exchange to the transcript. Returns false for stale replies.
    pub async fn record_exchange(&self, ticket: &TurnTicket, user: Turn, assistant: Turn) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != ticket.epoch {
            info!(
                conversation_id = ?ticket.conversation_id,
                "Discarding reply for a conversation that is no longer active"
            );
            return false;
        }
        state.transcript.push(user);
        state.transcript.push(assistant);
        true
    }

    pub async fn transcript(&self) -> Vec<Turn> {
        self.state.read().await.transcript.clone()
    }

    // =============================
    // History (read-through)
    // =============================

    /// Conversations for the session owner. Empty when the store fails.
    pub async fn list(&self) -> Vec<Conversation> {
        self.try_list().await.unwrap_or_else(|e| {
            warn!("Error getting conversations: {}", e);
            Vec::new()
        })
    }

    pub async fn try_list(&self) -> Result<Vec<Conversation>> {
        self.store
            .list_conversations(1, self.conversation_page_size)
            .await
    }

    /// Messages of one conversation. Empty when the store fails or the id is unknown.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Turn> {
        self.try_messages(conversation_id).await.unwrap_or_else(|e| {
            warn!(conversation_id, "Error getting conversation messages: {}", e);
            Vec::new()
        })
    }

    pub async fn try_messages(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        self.store
            .conversation_messages(conversation_id, 1, self.message_page_size)
            .await
    }

    /// Load a conversation's messages and make it the active one. Reopening
    /// the active conversation refreshes the transcript without invalidating
    /// turns in flight.
    pub async fn open(&self, conversation_id: &str) -> Vec<Turn> {
        let turns = self.messages(conversation_id).await;
        let mut state = self.state.write().await;
        if state.active.as_deref() == Some(conversation_id) {
            state.transcript = turns.clone();
        } else {
            state.switch_to(Some(conversation_id.to_string()), turns.clone());
        }
        turns
    }

    /// Delete a conversation. Clears the active pointer when it named the
    /// deleted thread; leaves it untouched when deletion fails.
    pub async fn delete(&self, conversation_id: &str) -> bool {
        match self.store.delete_conversation(conversation_id).await {
            Ok(true) => {
                let mut state = self.state.write().await;
                if state.active.as_deref() == Some(conversation_id) {
                    state.switch_to(None, Vec::new());
                }
                true
            }
            Ok(false) => {
                warn!(conversation_id, "Store declined to delete conversation");
                false
            }
            Err(e) => {
                warn!(conversation_id, "Error deleting conversation: {}", e);
                false
            }
        }
    }
}
