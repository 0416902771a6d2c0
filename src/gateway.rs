//! Remote Assistant Gateway
//!
//! Forwards a turn to the remote AI chat endpoint and normalises the reply into
//! an `AssistantResponse`. Throttling and transport failures never escape as
//! errors: both come back as canned responses with guidance actions.

use crate::models::{
    ActionKind, AssistantResponse, IconRef, QuickAction, ResponseSource,
};
use crate::rate_limit::RateGovernor;
use crate::tracker::{ConversationTracker, TurnTicket};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const THROTTLED_MESSAGE: &str = "I'm receiving too many requests right now. Please wait a moment before sending another message.";
const UNAVAILABLE_MESSAGE: &str = "I apologize, but I'm having trouble connecting to the AI service right now. Let me help you with some basic guidance instead.";

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub include_transaction_context: bool,
    pub report_format: String,
}

/// Reply of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub suggested_actions: Option<Vec<String>>,
}

/// Transport to the remote assistant.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply>;
}

pub struct RemoteAssistantGateway {
    backend: Arc<dyn ChatBackend>,
    governor: Arc<RateGovernor>,
    tracker: Arc<ConversationTracker>,
    tokens_used: AtomicU64,
}

impl RemoteAssistantGateway {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        governor: Arc<RateGovernor>,
        tracker: Arc<ConversationTracker>,
    ) -> Self {
        Self {
            backend,
            governor,
            tracker,
            tokens_used: AtomicU64::new(0),
        }
    }

    /// Tokens reported by every successful reply so far.
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    /// Send one turn on the conversation captured in `ticket`. The reply's
    /// conversation id is adopted only while that ticket is still current.
    pub async fn send(
        &self,
        text: &str,
        include_context: bool,
        identity: &str,
        ticket: &TurnTicket,
    ) -> AssistantResponse {
        if !self.governor.admit(identity).await {
            info!(identity = %identity, "Remote turn throttled");
            return throttled_response();
        }

        let request = ChatRequest {
            message: text.to_string(),
            conversation_id: ticket.conversation_id.clone(),
            include_transaction_context: include_context,
            report_format: "json".to_string(),
        };

        let reply = match self.backend.send_chat(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    identity = %identity,
                    conversation_id = ?ticket.conversation_id,
                    "Remote assistant call failed: {}",
                    e
                );
                return unavailable_response();
            }
        };

        if let Some(conversation_id) = reply.conversation_id.as_deref() {
            self.tracker.adopt(ticket, conversation_id).await;
        }

        if let Some(tokens) = reply.tokens_used {
            self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        }

        let suggested_actions = reply.suggested_actions.unwrap_or_default();
        let quick_actions = suggested_actions
            .iter()
            .enumerate()
            .map(|(index, suggestion)| suggested_action(index, suggestion))
            .collect();

        AssistantResponse {
            message: reply.message,
            quick_actions,
            report: None,
            conversation_id: reply.conversation_id,
            tokens_used: reply.tokens_used,
            suggested_actions,
            source: ResponseSource::Remote,
        }
    }
}

fn suggested_action(index: usize, suggestion: &str) -> QuickAction {
    QuickAction::new(
        format!("ai_action_{}", index),
        suggestion,
        ActionKind::AiSuggested,
        IconRef::CheckCircle,
    )
    .with_description(format!("AI suggested: {}", suggestion))
}

/// Canned reply for a turn the rate governor refused.
pub fn throttled_response() -> AssistantResponse {
    AssistantResponse::local(THROTTLED_MESSAGE, vec![QuickAction::retry()])
        .with_source(ResponseSource::Throttled)
}

/// Canned reply for a remote call that failed in transport or parsing.
pub fn unavailable_response() -> AssistantResponse {
    AssistantResponse::local(
        UNAVAILABLE_MESSAGE,
        vec![
            QuickAction::retry(),
            QuickAction::new("fallback", "Get Basic Help", ActionKind::HelpGuide, IconRef::Info)
                .with_description("Get basic app guidance"),
        ],
    )
    .with_source(ResponseSource::RemoteFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::store::InMemoryConversationStore;
    use crate::testing::{reply, MockChatBackend};
    use std::time::Duration;

    fn gateway_with(backend: Arc<MockChatBackend>, max_requests: usize) -> RemoteAssistantGateway {
        let governor = Arc::new(RateGovernor::new(RateLimitConfig {
            window: Duration::from_millis(60_000),
            max_requests,
        }));
        let tracker = Arc::new(ConversationTracker::new(
            Arc::new(InMemoryConversationStore::new()),
            20,
            50,
        ));
        RemoteAssistantGateway::new(backend, governor, tracker)
    }

    async fn send(gateway: &RemoteAssistantGateway, text: &str, include_context: bool) -> AssistantResponse {
        let ticket = gateway.tracker.begin_turn().await;
        gateway.send(text, include_context, "alice", &ticket).await
    }

    #[tokio::test]
    async fn test_successful_reply_maps_suggestions() {
        let backend = Arc::new(MockChatBackend::with_replies(vec![Ok(ChatReply {
            message: "You spent less this month.".to_string(),
            conversation_id: Some("conv-1".to_string()),
            tokens_used: Some(120),
            suggested_actions: Some(vec!["Review bills".to_string(), "Open savings".to_string()]),
        })]));
        let gateway = gateway_with(Arc::clone(&backend), 10);

        let response = send(&gateway, "how am I doing?", true).await;

        assert_eq!(response.source, ResponseSource::Remote);
        assert_eq!(response.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(response.quick_actions.len(), 2);
        assert_eq!(response.quick_actions[1].id, "ai_action_1");
        assert_eq!(response.quick_actions[1].action_kind, ActionKind::AiSuggested);
        assert_eq!(response.quick_actions[1].icon_ref, IconRef::CheckCircle);
        assert_eq!(
            response.quick_actions[0].description.as_deref(),
            Some("AI suggested: Review bills")
        );
        assert_eq!(gateway.tokens_used(), 120);
        assert_eq!(gateway.tracker.active().await.as_deref(), Some("conv-1"));

        let calls = backend.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].include_transaction_context);
        assert_eq!(calls[0].report_format, "json");
        assert!(calls[0].conversation_id.is_none());
    }

    #[tokio::test]
    async fn test_follow_up_reuses_conversation_id() {
        let backend = Arc::new(MockChatBackend::with_replies(vec![
            Ok(reply("first", Some("conv-7"), Some(10))),
            Ok(reply("second", Some("conv-7"), Some(15))),
        ]));
        let gateway = gateway_with(Arc::clone(&backend), 10);

        send(&gateway, "one", false).await;
        send(&gateway, "two", false).await;

        let calls = backend.calls().await;
        assert_eq!(calls[1].conversation_id.as_deref(), Some("conv-7"));
        assert_eq!(gateway.tokens_used(), 25);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_retry() {
        let backend = Arc::new(MockChatBackend::failing());
        let gateway = gateway_with(backend, 10);

        let response = send(&gateway, "anything", true).await;

        assert_eq!(response.source, ResponseSource::RemoteFailure);
        assert!(response.has_action("retry"));
        assert!(response.has_action("fallback"));
        assert_eq!(gateway.tokens_used(), 0);
        assert!(gateway.tracker.active().await.is_none());
    }

    #[tokio::test]
    async fn test_throttled_turn_makes_no_network_call() {
        let backend = Arc::new(MockChatBackend::new());
        let gateway = gateway_with(Arc::clone(&backend), 10);

        for _ in 0..10 {
            send(&gateway, "hi", true).await;
        }
        let before = backend.calls().await.len();

        let response = send(&gateway, "hi", true).await;

        assert_eq!(response.source, ResponseSource::Throttled);
        assert_eq!(response.quick_actions.len(), 1);
        assert_eq!(response.quick_actions[0].id, "retry");
        assert_eq!(backend.calls().await.len(), before);
    }

    #[tokio::test]
    async fn test_throttled_first_call_never_touches_transport() {
        let backend = Arc::new(MockChatBackend::new());
        let gateway = gateway_with(Arc::clone(&backend), 0);

        let response = send(&gateway, "hi", true).await;

        assert_eq!(response.source, ResponseSource::Throttled);
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_ticket_targets_old_thread_and_skips_adoption() {
        let backend = Arc::new(MockChatBackend::with_replies(vec![Ok(reply(
            "late answer",
            Some("conv-new"),
            Some(4),
        ))]));
        let gateway = gateway_with(Arc::clone(&backend), 10);
        gateway.tracker.set_active(Some("conv-old".to_string())).await;

        let ticket = gateway.tracker.begin_turn().await;
        gateway.tracker.set_active(Some("conv-other".to_string())).await;
        let response = gateway.send("hello", false, "alice", &ticket).await;

        assert_eq!(response.source, ResponseSource::Remote);
        let calls = backend.calls().await;
        assert_eq!(calls[0].conversation_id.as_deref(), Some("conv-old"));
        assert_eq!(gateway.tracker.active().await.as_deref(), Some("conv-other"));
        assert_eq!(gateway.tokens_used(), 4);
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            message: "What did I spend?".to_string(),
            conversation_id: None,
            include_transaction_context: true,
            report_format: "json".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["includeTransactionContext"], true);
        assert_eq!(json["reportFormat"], "json");
        assert!(json.get("conversationId").is_none());
    }
}
