//! Response Enrichment Pipeline
//!
//! Runs after a base response exists. Certain phrases ask for data the
//! resolver cannot produce on its own; for those, one secondary fetch runs and
//! its result is attached as a report. A failed fetch attaches a report with no
//! data and leaves the base message alone.

use super::{compose_bill_analytics, compose_monthly_report, AnalyticsSource};
use crate::models::{AssistantResponse, ReportKind, ReportPayload};
use crate::Result;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentTrigger {
    BillAnalytics,
    MonthlyReport,
}

impl EnrichmentTrigger {
    /// At most one trigger fires; bill analytics is checked first.
    pub fn detect(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        if lowered.contains("bill analytics") || lowered.contains("bill reports") {
            Some(EnrichmentTrigger::BillAnalytics)
        } else if lowered.contains("monthly report") {
            Some(EnrichmentTrigger::MonthlyReport)
        } else {
            None
        }
    }
}

pub struct ResponseEnricher {
    source: Arc<dyn AnalyticsSource>,
}

impl ResponseEnricher {
    pub fn new(source: Arc<dyn AnalyticsSource>) -> Self {
        Self { source }
    }

    pub async fn enrich(&self, raw_text: &str, base: AssistantResponse) -> AssistantResponse {
        let Some(trigger) = EnrichmentTrigger::detect(raw_text) else {
            return base;
        };

        debug!(?trigger, "Enriching response");

        let report = match trigger {
            EnrichmentTrigger::BillAnalytics => {
                let data = self
                    .bill_analytics()
                    .await
                    .map_err(|e| {
                        warn!("Error fetching bill analytics: {}", e);
                    })
                    .ok();
                ReportPayload::new(ReportKind::Analytics, "Bill Analytics", data)
            }
            EnrichmentTrigger::MonthlyReport => {
                let data = self
                    .monthly_report(Utc::now().date_naive())
                    .await
                    .map_err(|e| {
                        warn!("Error fetching monthly report: {}", e);
                    })
                    .ok();
                ReportPayload::new(ReportKind::Summary, "Monthly Report", data)
            }
        };

        base.with_report(report)
    }

    pub async fn bill_analytics(&self) -> Result<Map<String, Value>> {
        let (summary, bills) = tokio::try_join!(
            self.source.bill_analytics_summary(),
            self.source.user_bills(),
        )?;

        Ok(compose_bill_analytics(&summary, &bills))
    }

    /// Report for the calendar month containing `day`.
    pub async fn monthly_report(&self, day: NaiveDate) -> Result<Map<String, Value>> {
        let (disposable, summary) = tokio::try_join!(
            self.source.disposable_amount(day.year(), day.month()),
            self.source.bill_analytics_summary(),
        )?;

        let month_label = day.format("%B %Y").to_string();
        Ok(compose_monthly_report(&month_label, &disposable, &summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentResolver;
    use crate::models::ResolverContext;
    use crate::testing::MockAnalyticsSource;

    #[test]
    fn test_trigger_detection() {
        let cases = vec![
            ("Show me bill analytics and reports", Some(EnrichmentTrigger::BillAnalytics)),
            ("any BILL REPORTS?", Some(EnrichmentTrigger::BillAnalytics)),
            ("monthly report please", Some(EnrichmentTrigger::MonthlyReport)),
            ("bill analytics in my monthly report", Some(EnrichmentTrigger::BillAnalytics)),
            ("my bills", None),
            ("report", None),
        ];

        for (text, expected) in cases {
            assert_eq!(EnrichmentTrigger::detect(text), expected, "input: {}", text);
        }
    }

    #[tokio::test]
    async fn test_bill_analytics_attached() {
        let enricher = ResponseEnricher::new(Arc::new(MockAnalyticsSource::healthy()));
        let text = "show me bill analytics and reports";
        let base = IntentResolver::resolve(text, &ResolverContext::default());

        let response = enricher.enrich(text, base.clone()).await;

        let report = response.report.expect("analytics attached");
        assert_eq!(report.kind, ReportKind::Analytics);
        assert_eq!(report.title, "Bill Analytics");
        assert_eq!(report.data.unwrap()["totalBills"], 2);
        assert_eq!(response.message, base.message);
        assert_eq!(response.quick_actions, base.quick_actions);
    }

    #[tokio::test]
    async fn test_failed_fetch_yields_null_data() {
        let enricher = ResponseEnricher::new(Arc::new(MockAnalyticsSource::failing()));
        let text = "show me bill analytics and reports";
        let base = IntentResolver::resolve(text, &ResolverContext::default());

        let response = enricher.enrich(text, base.clone()).await;

        let report = response.report.expect("report still attached");
        assert_eq!(report.kind, ReportKind::Analytics);
        assert!(report.data.is_none());
        assert_eq!(response.message, base.message);
    }

    #[tokio::test]
    async fn test_monthly_report_replaces_summary() {
        let enricher = ResponseEnricher::new(Arc::new(MockAnalyticsSource::healthy()));
        let text = "generate my monthly report";
        let base = IntentResolver::resolve(text, &ResolverContext::default());
        assert_eq!(base.report.as_ref().map(|r| r.title.as_str()), Some("Financial Summary"));

        let response = enricher.enrich(text, base).await;

        let report = response.report.unwrap();
        assert_eq!(report.kind, ReportKind::Summary);
        assert_eq!(report.title, "Monthly Report");
        assert!(report.data.unwrap().contains_key("disposableAmount"));
    }

    #[tokio::test]
    async fn test_monthly_report_labels_month() {
        let enricher = ResponseEnricher::new(Arc::new(MockAnalyticsSource::healthy()));
        let day = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();

        let data = enricher.monthly_report(day).await.unwrap();

        assert_eq!(data["month"], "May 2024");
    }

    #[tokio::test]
    async fn test_other_text_passes_through() {
        let source = Arc::new(MockAnalyticsSource::healthy());
        let enricher = ResponseEnricher::new(Arc::clone(&source) as Arc<dyn AnalyticsSource>);
        let base = IntentResolver::resolve("loans", &ResolverContext::default());

        let response = enricher.enrich("loans", base.clone()).await;

        assert_eq!(response, base);
        assert_eq!(source.fetch_count(), 0);
    }
}
