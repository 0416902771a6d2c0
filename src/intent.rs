//! Intent Resolver
//!
//! Maps free text to a topic intent and answers it with a canned response.
//! Rules are tested top to bottom and the first match wins, so the order of
//! `INTENT_RULES` is behaviour: "bank account report" is a bank question
//! because the bank rule sits above the reports rule.
//!
//! Pure: no I/O. Reports that need fresh data are attached later by the
//! enrichment pipeline.

use crate::models::{
    ActionKind, AssistantResponse, IconRef, QuickAction, ReportKind, ReportPayload,
    ResolverContext,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Setup,
    Bills,
    Loans,
    BankAccounts,
    Savings,
    Reports,
    Navigation,
    Help,
    /// Nothing matched.
    Menu,
}

type Handler = fn(&ResolverContext) -> AssistantResponse;

/// One `(predicate, handler)` pair. The predicate is substring containment of
/// any keyword in the lower-cased input.
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    handler: Handler,
}

impl IntentRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|kw| lowered.contains(kw))
    }
}

/// Evaluation order. Do not reorder without updating `test_rule_order_is_fixed`.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Setup,
        keywords: &["setup", "profile"],
        handler: setup_response,
    },
    IntentRule {
        intent: Intent::Bills,
        keywords: &["bill", "payment", "expense"],
        handler: bills_response,
    },
    IntentRule {
        intent: Intent::Loans,
        keywords: &["loan"],
        handler: loans_response,
    },
    IntentRule {
        intent: Intent::BankAccounts,
        keywords: &["bank", "account"],
        handler: bank_response,
    },
    IntentRule {
        intent: Intent::Savings,
        keywords: &["saving"],
        handler: savings_response,
    },
    IntentRule {
        intent: Intent::Reports,
        keywords: &["report", "analytics", "chart", "graph"],
        handler: reports_response,
    },
    IntentRule {
        intent: Intent::Navigation,
        keywords: &["navigate", "go to", "open"],
        handler: navigation_response,
    },
    IntentRule {
        intent: Intent::Help,
        keywords: &["help", "how", "guide"],
        handler: help_response,
    },
];

/// Intent resolver
pub struct IntentResolver;

impl IntentResolver {
    /// Classify input without building a response.
    pub fn classify(text: &str) -> Intent {
        let lowered = text.to_lowercase();
        Self::find_rule(&lowered)
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Menu)
    }

    /// Resolve input to a canned response.
    pub fn resolve(text: &str, context: &ResolverContext) -> AssistantResponse {
        let lowered = text.to_lowercase();
        match Self::find_rule(&lowered) {
            Some(rule) => (rule.handler)(context),
            None => menu_response(),
        }
    }

    fn find_rule(lowered: &str) -> Option<&'static IntentRule> {
        INTENT_RULES.iter().find(|rule| rule.matches(lowered))
    }
}

fn action(
    id: &str,
    label: &str,
    kind: ActionKind,
    icon: IconRef,
    description: &str,
) -> QuickAction {
    QuickAction::new(id, label, kind, icon).with_description(description)
}

fn setup_response(context: &ResolverContext) -> AssistantResponse {
    if context.has_profile {
        AssistantResponse::local(
            "Great! Let me help you set up your account. Your profile looks good!",
            vec![action(
                "view_profile",
                "View Profile",
                ActionKind::Navigate,
                IconRef::Person,
                "View your current profile",
            )],
        )
    } else {
        AssistantResponse::local(
            "Great! Let me help you set up your account. I can see you haven't completed your profile setup yet.",
            vec![action(
                "profile_setup",
                "Complete Profile",
                ActionKind::Navigate,
                IconRef::Settings,
                "Set up your profile information",
            )],
        )
    }
}

fn bills_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I can help you manage your bills! What would you like to do?",
        vec![
            action("add_bill", "Add New Bill", ActionKind::ShowAddBillForm, IconRef::Receipt, "Add a new bill to track"),
            action("view_bills", "View My Bills", ActionKind::ShowBillsList, IconRef::Assessment, "See all your bills"),
            action("bill_analytics", "Bill Analytics", ActionKind::ShowBillReports, IconRef::TrendingUp, "View bill spending insights"),
        ],
    )
}

fn loans_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I can help you manage your loans! What would you like to do?",
        vec![
            action("add_loan", "Apply for Loan", ActionKind::ShowAddLoanForm, IconRef::AccountBalance, "Submit a new loan application"),
            action("view_loans", "View My Loans", ActionKind::ShowLoansList, IconRef::Assessment, "See all your loans"),
        ],
    )
}

fn bank_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I can help you manage your bank accounts! What would you like to do?",
        vec![
            action("add_bank_account", "Add Bank Account", ActionKind::ShowAddBankAccountForm, IconRef::AccountBalance, "Add a new bank account"),
            action("view_bank_accounts", "View Accounts", ActionKind::ShowBankAccountsList, IconRef::Assessment, "See all your bank accounts"),
        ],
    )
}

fn savings_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I can help you manage your savings! What would you like to do?",
        vec![
            action("add_savings", "Create Savings Goal", ActionKind::ShowAddSavingsForm, IconRef::Savings, "Create a new savings goal"),
            action("view_savings", "View Savings", ActionKind::ShowSavingsList, IconRef::Assessment, "See all your savings goals"),
        ],
    )
}

fn reports_response(context: &ResolverContext) -> AssistantResponse {
    let summary = context.financial_summary.clone().unwrap_or_default();

    AssistantResponse::local(
        "Here are your financial reports and insights:",
        vec![
            action("detailed_analytics", "Detailed Analytics", ActionKind::Navigate, IconRef::Assessment, "View comprehensive analytics"),
            action("monthly_report", "Monthly Report", ActionKind::ShowMonthlyReport, IconRef::TrendingUp, "Generate monthly report"),
        ],
    )
    .with_report(ReportPayload::new(
        ReportKind::Summary,
        "Financial Summary",
        Some(summary.to_report_data()),
    ))
}

fn navigation_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I can help you navigate to different sections of the app:",
        vec![
            action("dashboard", "Dashboard", ActionKind::Navigate, IconRef::TrendingUp, "Go to your main dashboard"),
            action("bills", "Bills", ActionKind::Navigate, IconRef::Receipt, "Manage your bills and payments"),
            action("bank-accounts", "Bank Accounts", ActionKind::Navigate, IconRef::AccountBalance, "View your bank accounts"),
            action("savings", "Savings", ActionKind::Navigate, IconRef::Savings, "Track your savings goals"),
        ],
    )
}

fn help_response(_: &ResolverContext) -> AssistantResponse {
    AssistantResponse::local(
        "I'm here to help! Here's what I can assist you with:",
        vec![
            action("getting_started", "Getting Started", ActionKind::GettingStartedGuide, IconRef::Help, "Learn the basics"),
            action("features", "App Features", ActionKind::FeaturesGuide, IconRef::Info, "Explore all features"),
            action("tips", "Tips & Tricks", ActionKind::TipsGuide, IconRef::CheckCircle, "Get the most out of the app"),
        ],
    )
}

fn menu_response() -> AssistantResponse {
    AssistantResponse::local(
        "I understand you're looking for help. Here are some things I can assist you with:",
        vec![
            action("setup_help", "Account Setup", ActionKind::SetupGuide, IconRef::Settings, "Complete your profile"),
            action("bills_help", "Manage Bills", ActionKind::BillsGuide, IconRef::Receipt, "Add and track bills"),
            action("reports_help", "View Reports", ActionKind::ShowReports, IconRef::Assessment, "See your insights"),
        ],
    )
}

/// Greeting shown when a conversation view opens.
pub fn welcome_response(user_name: Option<&str>, ai_enabled: bool) -> AssistantResponse {
    let greeting = match user_name {
        Some(name) if !name.trim().is_empty() => format!("Hello {}!", name.trim()),
        _ => "Hello!".to_string(),
    };
    let capability = if ai_enabled {
        "I have AI capabilities to help you better!"
    } else {
        "I can help you manage your finances!"
    };

    AssistantResponse::local(
        format!(
            "{} I'm your finance assistant. {}\n\nWhat would you like to do today?",
            greeting, capability
        ),
        vec![
            action("manage_bills", "Manage Bills", ActionKind::BillsGuide, IconRef::Receipt, "Add and view your bills"),
            action("manage_loans", "Manage Loans", ActionKind::LoansGuide, IconRef::AccountBalance, "Apply for and view loans"),
            action("manage_bank", "Bank Accounts", ActionKind::BankGuide, IconRef::AccountBalance, "Add and view bank accounts"),
            action("manage_savings", "Savings Goals", ActionKind::SavingsGuide, IconRef::Savings, "Create and track savings"),
            action("reports", "View Reports", ActionKind::ShowReports, IconRef::Assessment, "See your financial insights"),
        ],
    )
}
