//! HTTP client for the finance REST backend
//!
//! One connection-pooled `reqwest::Client` serves the chat endpoint, the
//! conversation history endpoints and the analytics endpoints.

use crate::analytics::{AnalyticsSource, Bill, BillAnalyticsSummary, DisposableAmount};
use crate::error::AssistantError;
use crate::gateway::{ChatBackend, ChatReply, ChatRequest};
use crate::models::{Conversation, FinancialContext, Turn};
use crate::store::ConversationStore;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Clone)]
pub struct HttpFinanceApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFinanceApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AssistantError::Config(format!(
                "finance API base URL must be http(s): {}",
                base_url
            )));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode a JSON body. 404 maps to `NotFound`, other non-2xx
    /// statuses to `DataUnavailable`.
    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Value> {
        let response = builder.send().await.map_err(|e| {
            error!("Finance API request failed for {}: {}", path, e);
            AssistantError::HttpError(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AssistantError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Finance API returned {} for {}: {}", status, path, body);
            return Err(AssistantError::DataUnavailable(format!(
                "{} returned {}",
                path, status
            )));
        }

        debug!(path, %status, "Finance API response");
        Ok(response.json::<Value>().await?)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(self.request(Method::GET, path).query(query), path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.request(Method::POST, path).json(body), path).await
    }
}

/// Strip the `{ success, data, message }` envelope when present.
fn payload(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Pull a list out of a payload that is either the list itself or an
/// object holding it under `key` (or a nested `data`).
fn list_field<T: DeserializeOwned>(payload: Value, key: &str) -> Result<Vec<T>> {
    let list = match payload {
        Value::Array(_) => payload,
        Value::Object(mut map) => map
            .remove(key)
            .or_else(|| map.remove("data"))
            .unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(AssistantError::DataUnavailable(format!(
                "expected a list under '{}', got {}",
                key, other
            )))
        }
    };

    Ok(serde_json::from_value(list)?)
}

fn page_query(page: u32, limit: u32) -> [(&'static str, String); 2] {
    [("page", page.to_string()), ("limit", limit.to_string())]
}

#[async_trait]
impl ChatBackend for HttpFinanceApi {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let body = serde_json::to_value(request)?;
        let reply = self
            .post("/chat", &body)
            .await
            .map_err(|e| AssistantError::RemoteUnavailable(e.to_string()))?;

        serde_json::from_value(payload(reply))
            .map_err(|e| AssistantError::RemoteUnavailable(format!("Chat reply parse error: {}", e)))
    }
}

#[async_trait]
impl ConversationStore for HttpFinanceApi {
    async fn list_conversations(&self, page: u32, limit: u32) -> Result<Vec<Conversation>> {
        let body = self.get("/conversations", &page_query(page, limit)).await?;
        list_field(payload(body), "conversations")
    }

    async fn conversation_messages(&self, conversation_id: &str, page: u32, limit: u32) -> Result<Vec<Turn>> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let body = self.get(&path, &page_query(page, limit)).await?;
        list_field(payload(body), "messages")
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let path = format!("/conversations/{}", conversation_id);
        let body = self.send(self.request(Method::DELETE, &path), &path).await?;
        Ok(body.get("success").and_then(Value::as_bool).unwrap_or(false))
    }
}

#[async_trait]
impl AnalyticsSource for HttpFinanceApi {
    async fn bill_analytics_summary(&self) -> Result<BillAnalyticsSummary> {
        let body = self.get("/bills/analytics/summary", &[]).await?;
        Ok(serde_json::from_value(payload(body))?)
    }

    async fn user_bills(&self) -> Result<Vec<Bill>> {
        let body = self.get("/bills", &[]).await?;
        list_field(payload(body), "bills")
    }

    async fn disposable_amount(&self, year: i32, month: u32) -> Result<DisposableAmount> {
        let query = [("year", year.to_string()), ("month", month.to_string())];
        let body = self.get("/disposable-amount", &query).await?;
        Ok(serde_json::from_value(payload(body))?)
    }

    async fn financial_context(&self) -> Result<FinancialContext> {
        let body = self.get("/chat/financial-context", &[]).await?;
        Ok(serde_json::from_value(payload(body))?)
    }

    async fn bill_reminders(&self) -> Result<Vec<Value>> {
        let body = self.get("/chat/bill-reminders", &[]).await?;
        list_field(payload(body), "reminders")
    }

    async fn budget_suggestions(&self) -> Result<Value> {
        let body = self.get("/chat/budget-suggestions", &[]).await?;
        Ok(payload(body))
    }

    async fn generate_report(&self, report_type: &str, format: &str) -> Result<String> {
        let body = self
            .post(
                "/chat/generate-report",
                &json!({ "reportType": report_type, "format": format }),
            )
            .await?;

        payload(body)
            .get("reportUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AssistantError::DataUnavailable("report URL missing".to_string()))
    }
}

/// Collaborator used when no backend URL is configured: every remote call
/// fails, so AI turns fall back to local guidance and reports carry no data.
pub struct OfflineBackend;

#[async_trait]
impl ChatBackend for OfflineBackend {
    async fn send_chat(&self, _request: &ChatRequest) -> Result<ChatReply> {
        Err(AssistantError::RemoteUnavailable(
            "FINANCE_API_BASE_URL not configured".to_string(),
        ))
    }
}

fn offline<T>() -> Result<T> {
    Err(AssistantError::DataUnavailable(
        "FINANCE_API_BASE_URL not configured".to_string(),
    ))
}

#[async_trait]
impl AnalyticsSource for OfflineBackend {
    async fn bill_analytics_summary(&self) -> Result<BillAnalyticsSummary> {
        offline()
    }

    async fn user_bills(&self) -> Result<Vec<Bill>> {
        offline()
    }

    async fn disposable_amount(&self, _year: i32, _month: u32) -> Result<DisposableAmount> {
        offline()
    }

    async fn financial_context(&self) -> Result<FinancialContext> {
        offline()
    }

    async fn bill_reminders(&self) -> Result<Vec<Value>> {
        offline()
    }

    async fn budget_suggestions(&self) -> Result<Value> {
        offline()
    }

    async fn generate_report(&self, _report_type: &str, _format: &str) -> Result<String> {
        offline()
    }
}
