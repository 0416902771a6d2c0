//! Core data models for the finance assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// How a turn should be answered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Ai,
    #[default]
    Local,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    User,
    Assistant,
}

/// Closed set of actions the presentation layer knows how to perform.
/// The core only emits these tags and never executes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Retry,
    AiSuggested,
    HelpGuide,
    SetupGuide,
    BillsGuide,
    LoansGuide,
    BankGuide,
    SavingsGuide,
    GettingStartedGuide,
    FeaturesGuide,
    TipsGuide,
    ShowReports,
    ShowMonthlyReport,
    ShowBillReports,
    ShowAddBillForm,
    ShowBillsList,
    ShowAddLoanForm,
    ShowLoansList,
    ShowAddBankAccountForm,
    ShowBankAccountsList,
    ShowAddSavingsForm,
    ShowSavingsList,
}

/// Icon tag owned by the presentation layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IconRef {
    Help,
    Info,
    CheckCircle,
    Settings,
    Person,
    Receipt,
    Assessment,
    TrendingUp,
    AccountBalance,
    Savings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Summary,
    Analytics,
}

/// Which path produced a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Local,
    Remote,
    Throttled,
    RemoteFailure,
    Unauthenticated,
}

//
// ================= Quick Actions =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    pub action_kind: ActionKind,
    pub icon_ref: IconRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuickAction {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        action_kind: ActionKind,
        icon_ref: IconRef,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            action_kind,
            icon_ref,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The "Try Again" action offered after throttling or a remote failure.
    pub fn retry() -> Self {
        Self::new("retry", "Try Again", ActionKind::Retry, IconRef::Help)
            .with_description("Retry your request")
    }
}

//
// ================= Reports =================
//

/// Structured data attached to a response.
/// `data` is `None` when the fetch behind it failed; callers render a "no data" state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportPayload {
    pub kind: ReportKind,
    pub title: String,
    pub data: Option<Map<String, Value>>,
}

impl ReportPayload {
    pub fn new(kind: ReportKind, title: impl Into<String>, data: Option<Map<String, Value>>) -> Self {
        Self {
            kind,
            title: title.into(),
            data,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

//
// ================= Response =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantResponse {
    pub message: String,
    #[serde(default)]
    pub quick_actions: Vec<QuickAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    pub source: ResponseSource,
}

impl AssistantResponse {
    pub fn local(message: impl Into<String>, quick_actions: Vec<QuickAction>) -> Self {
        Self {
            message: message.into(),
            quick_actions,
            report: None,
            conversation_id: None,
            tokens_used: None,
            suggested_actions: Vec::new(),
            source: ResponseSource::Local,
        }
    }

    pub fn with_report(mut self, report: ReportPayload) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn has_action(&self, id: &str) -> bool {
        self.quick_actions.iter().any(|a| a.id == id)
    }
}

//
// ================= Conversations =================
//

/// One message within a conversation.
///
/// Field names on the wire follow the history endpoint (`type`, `content`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    #[serde(rename = "content")]
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_report: Option<ReportPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_actions: Vec<QuickAction>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            direction: Direction::User,
            text: text.into(),
            timestamp: Utc::now(),
            attached_report: None,
            quick_actions: Vec::new(),
        }
    }

    pub fn assistant(response: &AssistantResponse) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            direction: Direction::Assistant,
            text: response.message.clone(),
            timestamp: Utc::now(),
            attached_report: response.report.clone(),
            quick_actions: response.quick_actions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(rename = "lastMessage", default)]
    pub last_message_preview: String,
    #[serde(rename = "messageCount", default)]
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//
// ================= Financial Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBill {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub due_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLoan {
    pub id: String,
    pub purpose: String,
    pub monthly_payment: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavingsAccount {
    pub id: String,
    pub name: String,
    pub current_amount: f64,
    pub target_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTotals {
    pub total_income: f64,
    pub total_expenses: f64,
    pub disposable_amount: f64,
    pub savings_rate: f64,
}

/// Read-only snapshot supplied by the data layer. Never mutated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialContext {
    #[serde(default)]
    pub recent_transactions: Vec<RecentTransaction>,
    #[serde(default)]
    pub upcoming_bills: Vec<UpcomingBill>,
    #[serde(default)]
    pub active_loans: Vec<ActiveLoan>,
    #[serde(default)]
    pub savings_accounts: Vec<SavingsAccount>,
    #[serde(default)]
    pub financial_summary: FinancialTotals,
}

/// Dashboard figures shown by the reports topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_bills: u64,
    pub total_amount: f64,
    pub paid_this_month: f64,
    pub upcoming_payments: u64,
    pub savings_rate: f64,
}

impl FinancialSummary {
    pub fn to_report_data(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Caller-supplied facts the intent resolver may consult.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolverContext {
    pub has_profile: bool,
    #[serde(default)]
    pub financial_summary: Option<FinancialSummary>,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatMode::Ai => "ai",
            ChatMode::Local => "local",
        };
        write!(f, "{}", s)
    }
}
