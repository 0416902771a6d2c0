//! Finance analytics source
//!
//! Read-only fetches behind report enrichment and the dashboard summary,
//! plus the pure functions that turn backend payloads into report data.

pub mod enrichment;

pub use enrichment::{EnrichmentTrigger, ResponseEnricher};

use crate::models::{FinancialContext, FinancialSummary};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Bill type used when the backend leaves it blank.
const UNCATEGORISED: &str = "Other";

/// Paid total as the backend reports it: either a plain figure or split by period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PaidAmount {
    Flat(f64),
    ByPeriod {
        #[serde(rename = "currentMonth", default)]
        current_month: f64,
    },
}

impl PaidAmount {
    pub fn current_month(&self) -> f64 {
        match self {
            PaidAmount::Flat(amount) => *amount,
            PaidAmount::ByPeriod { current_month } => *current_month,
        }
    }
}

impl Default for PaidAmount {
    fn default() -> Self {
        PaidAmount::Flat(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillAnalyticsSummary {
    #[serde(default)]
    pub total_pending_amount: f64,
    #[serde(default)]
    pub total_paid_amount: PaidAmount,
    #[serde(default)]
    pub total_overdue_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    #[serde(default)]
    pub bill_name: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub bill_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Disposable-income figures for one month.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisposableAmount {
    #[serde(default)]
    pub disposable_amount: f64,
    #[serde(default)]
    pub total_income: f64,
    #[serde(default)]
    pub total_fixed_expenses: f64,
    #[serde(default)]
    pub disposable_percentage: f64,
}

/// Trait for finance data fetches (read-only)
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn bill_analytics_summary(&self) -> Result<BillAnalyticsSummary>;
    async fn user_bills(&self) -> Result<Vec<Bill>>;
    async fn disposable_amount(&self, year: i32, month: u32) -> Result<DisposableAmount>;
    async fn financial_context(&self) -> Result<FinancialContext>;
    async fn bill_reminders(&self) -> Result<Vec<Value>>;
    async fn budget_suggestions(&self) -> Result<Value>;
    /// Returns the URL of the generated document.
    async fn generate_report(&self, report_type: &str, format: &str) -> Result<String>;
}

/// Bill analytics report data: totals plus per-type counts and amounts.
pub fn compose_bill_analytics(summary: &BillAnalyticsSummary, bills: &[Bill]) -> Map<String, Value> {
    let mut categories: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
    for bill in bills {
        let category = bill
            .bill_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNCATEGORISED);
        let entry = categories.entry(category).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += bill.amount;
    }

    let categories: Map<String, Value> = categories
        .into_iter()
        .map(|(name, (count, total))| (name.to_string(), json!({ "count": count, "total": total })))
        .collect();

    let mut data = Map::new();
    data.insert("totalBills".into(), json!(bills.len()));
    data.insert("totalPending".into(), json!(summary.total_pending_amount));
    data.insert("totalPaid".into(), json!(summary.total_paid_amount.current_month()));
    data.insert("overdue".into(), json!(summary.total_overdue_amount));
    data.insert("categories".into(), Value::Object(categories));
    data
}

/// Monthly report data for the month named by `month_label` ("May 2024").
pub fn compose_monthly_report(
    month_label: &str,
    disposable: &DisposableAmount,
    summary: &BillAnalyticsSummary,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("month".into(), json!(month_label));
    data.insert("disposableAmount".into(), json!(disposable.disposable_amount));
    data.insert("totalIncome".into(), json!(disposable.total_income));
    data.insert("totalExpenses".into(), json!(disposable.total_fixed_expenses));
    data.insert("savingsRate".into(), json!(disposable.disposable_percentage));
    data.insert(
        "bills".into(),
        json!({
            "total": summary.total_pending_amount,
            "paid": summary.total_paid_amount.current_month(),
        }),
    );
    data
}

/// Dashboard summary for the reports topic.
pub fn compose_financial_summary(
    summary: &BillAnalyticsSummary,
    bills: &[Bill],
    disposable: &DisposableAmount,
) -> FinancialSummary {
    let upcoming_payments = bills
        .iter()
        .filter(|bill| {
            bill.status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("pending"))
        })
        .count() as u64;

    FinancialSummary {
        total_bills: bills.len() as u64,
        total_amount: summary.total_pending_amount,
        paid_this_month: summary.total_paid_amount.current_month(),
        upcoming_payments,
        savings_rate: disposable.disposable_percentage,
    }
}
