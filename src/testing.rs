//! Scripted collaborators for unit tests.

use crate::analytics::{AnalyticsSource, Bill, BillAnalyticsSummary, DisposableAmount, PaidAmount};
use crate::error::AssistantError;
use crate::gateway::{ChatBackend, ChatReply, ChatRequest};
use crate::models::{Conversation, FinancialContext, FinancialTotals, Turn};
use crate::store::ConversationStore;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

pub fn reply(message: &str, conversation_id: Option<&str>, tokens_used: Option<u64>) -> ChatReply {
    ChatReply {
        message: message.to_string(),
        conversation_id: conversation_id.map(str::to_string),
        tokens_used,
        suggested_actions: None,
    }
}

// ---------------------------------------------------------------------------
// Chat backend
// ---------------------------------------------------------------------------

/// Chat backend with a FIFO queue of scripted replies and a call log.
pub struct MockChatBackend {
    replies: Mutex<VecDeque<Result<ChatReply>>>,
    calls: Mutex<Vec<ChatRequest>>,
    always_fail: bool,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MockChatBackend {
    /// Always answers "Mock response" on conversation `mock-conversation`.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            always_fail: false,
            gate: None,
        }
    }

    pub fn with_replies(replies: Vec<Result<ChatReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::new()
        }
    }

    /// Every call fails like a dropped connection.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new()
        }
    }

    /// Each call signals `entered`, then waits for `release` before replying.
    pub fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((entered, release)),
            ..Self::new()
        }
    }

    pub async fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.calls.lock().await.push(request.clone());

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        if self.always_fail {
            return Err(AssistantError::RemoteUnavailable("connection reset".to_string()));
        }

        match self.replies.lock().await.pop_front() {
            Some(scripted) => scripted,
            None => Ok(reply("Mock response", Some("mock-conversation"), Some(5))),
        }
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

pub struct MockAnalyticsSource {
    fail: bool,
    fetches: AtomicUsize,
}

impl MockAnalyticsSource {
    pub fn healthy() -> Self {
        Self {
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self, what: &str) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AssistantError::DataUnavailable(format!("{} endpoint down", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AnalyticsSource for MockAnalyticsSource {
    async fn bill_analytics_summary(&self) -> Result<BillAnalyticsSummary> {
        self.check("bill analytics")?;
        Ok(BillAnalyticsSummary {
            total_pending_amount: 150.0,
            total_paid_amount: PaidAmount::ByPeriod { current_month: 80.0 },
            total_overdue_amount: 20.0,
        })
    }

    async fn user_bills(&self) -> Result<Vec<Bill>> {
        self.check("bills")?;
        Ok(vec![
            Bill {
                id: "b-1".to_string(),
                bill_name: Some("Electricity".to_string()),
                amount: 90.0,
                bill_type: Some("utility".to_string()),
                status: Some("PENDING".to_string()),
            },
            Bill {
                id: "b-2".to_string(),
                bill_name: Some("Internet".to_string()),
                amount: 60.0,
                bill_type: Some("utility".to_string()),
                status: Some("PAID".to_string()),
            },
        ])
    }

    async fn disposable_amount(&self, _year: i32, _month: u32) -> Result<DisposableAmount> {
        self.check("disposable amount")?;
        Ok(DisposableAmount {
            disposable_amount: 900.0,
            total_income: 3000.0,
            total_fixed_expenses: 2100.0,
            disposable_percentage: 30.0,
        })
    }

    async fn financial_context(&self) -> Result<FinancialContext> {
        self.check("financial context")?;
        Ok(FinancialContext {
            financial_summary: FinancialTotals {
                total_income: 3000.0,
                total_expenses: 2100.0,
                disposable_amount: 900.0,
                savings_rate: 30.0,
            },
            ..Default::default()
        })
    }

    async fn bill_reminders(&self) -> Result<Vec<Value>> {
        self.check("bill reminders")?;
        Ok(vec![json!({ "billId": "b-1", "daysUntilDue": 3 })])
    }

    async fn budget_suggestions(&self) -> Result<Value> {
        self.check("budget suggestions")?;
        Ok(json!({ "suggestions": ["Cut dining out by 10%"] }))
    }

    async fn generate_report(&self, report_type: &str, format: &str) -> Result<String> {
        self.check("report generation")?;
        Ok(format!("https://reports.local/{}.{}", report_type, format))
    }
}

// ---------------------------------------------------------------------------
// Conversation store
// ---------------------------------------------------------------------------

/// Store whose every call fails.
pub struct FailingConversationStore;

#[async_trait]
impl ConversationStore for FailingConversationStore {
    async fn list_conversations(&self, _page: u32, _limit: u32) -> Result<Vec<Conversation>> {
        Err(AssistantError::DataUnavailable("history service down".to_string()))
    }

    async fn conversation_messages(&self, _id: &str, _page: u32, _limit: u32) -> Result<Vec<Turn>> {
        Err(AssistantError::DataUnavailable("history service down".to_string()))
    }

    async fn delete_conversation(&self, _id: &str) -> Result<bool> {
        Err(AssistantError::DataUnavailable("history service down".to_string()))
    }
}
