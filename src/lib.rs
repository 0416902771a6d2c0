//! Finance Assistant
//!
//! Conversational assistant core for a personal-finance dashboard:
//! - Per-identity sliding-window rate limiting
//! - Ordered keyword intent resolution with canned guidance
//! - Remote AI chat with local fallback
//! - Conversation continuity with a stale-reply guard
//! - Report enrichment from finance analytics
//!
//! PER TURN:
//! INPUT → ADMIT → (REMOTE | LOCAL) → ENRICH → RECORD

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod intent;
pub mod models;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AssistantError, Result};

// Re-export common types
pub use models::*;
pub use intent::{Intent, IntentResolver};
pub use session::{AssistantSession, SessionBackends};
