//! Assistant session
//!
//! One `AssistantSession` per chat view. It owns the conversation tracker,
//! the gateway and the enrichment pipeline, and runs the per-turn control
//! flow:
//!
//! ```text
//! text + mode → identity → governor → (gateway | resolver) → enrichment → tracker
//! ```
//!
//! The rate governor is passed in so several sessions can share one budget.

use crate::analytics::{compose_financial_summary, AnalyticsSource, ResponseEnricher};
use crate::config::{AnonymousPolicy, AssistantConfig, ANONYMOUS_IDENTITY};
use crate::gateway::{throttled_response, unavailable_response, ChatBackend, RemoteAssistantGateway};
use crate::http_client::{HttpFinanceApi, OfflineBackend};
use crate::intent::{welcome_response, IntentResolver};
use crate::models::{
    ActionKind, AssistantResponse, ChatMode, Conversation, FinancialContext, FinancialSummary,
    IconRef, QuickAction, ResolverContext, ResponseSource, Turn,
};
use crate::rate_limit::RateGovernor;
use crate::store::{ConversationStore, InMemoryConversationStore};
use crate::tracker::ConversationTracker;
use crate::Result;
use chrono::{Datelike, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const SIGN_IN_MESSAGE: &str = "Please sign in to use the assistant.";

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionBackends {
    pub chat: Arc<dyn ChatBackend>,
    pub store: Arc<dyn ConversationStore>,
    pub analytics: Arc<dyn AnalyticsSource>,
}

impl SessionBackends {
    /// No remote backend: AI turns fall back to local guidance, history is
    /// kept in memory and reports carry no data.
    pub fn offline() -> Self {
        let offline = Arc::new(OfflineBackend);
        Self {
            chat: offline.clone(),
            store: Arc::new(InMemoryConversationStore::new()),
            analytics: offline,
        }
    }

    /// REST collaborators when a base URL is configured, offline ones otherwise.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let Some(base_url) = config.api_base_url.as_deref() else {
            info!("FINANCE_API_BASE_URL not set, running offline");
            return Ok(Self::offline());
        };

        let api = Arc::new(HttpFinanceApi::new(
            base_url,
            config.api_token.clone(),
            config.http_timeout,
        )?);
        info!(base_url, "Using finance REST backend");

        Ok(Self {
            chat: api.clone(),
            store: api.clone(),
            analytics: api,
        })
    }
}

pub struct AssistantSession {
    session_id: String,
    identity: Option<String>,
    config: AssistantConfig,
    governor: Arc<RateGovernor>,
    tracker: Arc<ConversationTracker>,
    gateway: RemoteAssistantGateway,
    enricher: ResponseEnricher,
    analytics: Arc<dyn AnalyticsSource>,
    resolver_context: RwLock<ResolverContext>,
    turn_lock: Mutex<()>,
}

impl AssistantSession {
    pub fn new(
        session_id: impl Into<String>,
        identity: Option<String>,
        config: AssistantConfig,
        backends: SessionBackends,
        governor: Arc<RateGovernor>,
    ) -> Self {
        let tracker = Arc::new(ConversationTracker::new(
            backends.store,
            config.conversation_page_size,
            config.message_page_size,
        ));
        let gateway = RemoteAssistantGateway::new(
            backends.chat,
            Arc::clone(&governor),
            Arc::clone(&tracker),
        );

        Self {
            session_id: session_id.into(),
            identity: identity.filter(|id| !id.trim().is_empty()),
            config,
            governor,
            tracker,
            gateway,
            enricher: ResponseEnricher::new(Arc::clone(&backends.analytics)),
            analytics: backends.analytics,
            resolver_context: RwLock::new(ResolverContext::default()),
            turn_lock: Mutex::new(()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Key the governor charges this session's turns to, or `None` when
    /// anonymous turns are refused.
    pub fn rate_identity(&self) -> Option<&str> {
        match (&self.identity, self.config.anonymous_policy) {
            (Some(identity), _) => Some(identity.as_str()),
            (None, AnonymousPolicy::Pool) => Some(ANONYMOUS_IDENTITY),
            (None, AnonymousPolicy::Reject) => None,
        }
    }

    // =============================
    // Turns
    // =============================

    /// Answer one user message. Never fails: throttling, remote outages and
    /// data errors all come back as responses.
    pub async fn send_turn(&self, text: &str, mode: ChatMode) -> AssistantResponse {
        let text = text.trim();
        let _turn = self.turn_lock.lock().await;
        let context = self.resolver_context.read().await.clone();

        if text.is_empty() {
            return IntentResolver::resolve(text, &context);
        }

        let Some(identity) = self.rate_identity() else {
            info!(session_id = %self.session_id, "Refusing anonymous turn");
            return unauthenticated_response();
        };

        // One ticket per turn: the request target, id adoption and the
        // transcript append all check against the same snapshot.
        let ticket = self.tracker.begin_turn().await;
        debug!(session_id = %self.session_id, %mode, "Handling turn");

        let response = match mode {
            ChatMode::Ai => {
                let remote = self
                    .gateway
                    .send(text, self.config.include_financial_context, identity, &ticket)
                    .await;
                if remote.source == ResponseSource::RemoteFailure {
                    with_local_fallback(remote, IntentResolver::resolve(text, &context))
                } else {
                    remote
                }
            }
            ChatMode::Local => {
                if self.config.throttle_local_turns && !self.governor.admit(identity).await {
                    info!(identity = %identity, "Local turn throttled");
                    throttled_response()
                } else {
                    IntentResolver::resolve(text, &context)
                }
            }
        };

        let mut response = if response.source == ResponseSource::Throttled {
            response
        } else {
            self.enricher.enrich(text, response).await
        };

        if response.conversation_id.is_none() {
            response.conversation_id = self.tracker.active().await;
        }

        self.tracker
            .record_exchange(&ticket, Turn::user(text), Turn::assistant(&response))
            .await;

        response
    }

    /// Greeting for a freshly opened chat view.
    pub fn welcome(&self, user_name: Option<&str>) -> AssistantResponse {
        welcome_response(user_name, self.config.api_base_url.is_some())
    }

    // =============================
    // Conversations
    // =============================

    pub async fn list_conversations(&self) -> Vec<Conversation> {
        self.tracker.list().await
    }

    /// Make `conversation_id` active and return its messages.
    pub async fn open_conversation(&self, conversation_id: &str) -> Vec<Turn> {
        self.tracker.open(conversation_id).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> bool {
        self.tracker.delete(conversation_id).await
    }

    pub async fn current_conversation_id(&self) -> Option<String> {
        self.tracker.active().await
    }

    /// The next turn starts a fresh thread.
    pub async fn start_new_conversation(&self) {
        self.tracker.set_active(None).await;
    }

    pub async fn transcript(&self) -> Vec<Turn> {
        self.tracker.transcript().await
    }

    // =============================
    // Usage
    // =============================

    pub fn tokens_used(&self) -> u64 {
        self.gateway.tokens_used()
    }

    /// Turns still allowed in the current rate window.
    pub async fn remaining_requests(&self) -> usize {
        match self.rate_identity() {
            Some(identity) => self.governor.remaining(identity).await,
            None => 0,
        }
    }

    // =============================
    // Financial data
    // =============================

    pub async fn set_has_profile(&self, has_profile: bool) {
        self.resolver_context.write().await.has_profile = has_profile;
    }

    /// Re-fetch the dashboard summary shown by the reports topic. On failure
    /// the previous summary is kept.
    pub async fn refresh_financial_summary(&self) -> Option<FinancialSummary> {
        let today = Utc::now().date_naive();
        let fetched = tokio::try_join!(
            self.analytics.bill_analytics_summary(),
            self.analytics.user_bills(),
            self.analytics.disposable_amount(today.year(), today.month()),
        );

        match fetched {
            Ok((summary, bills, disposable)) => {
                let financial_summary = compose_financial_summary(&summary, &bills, &disposable);
                self.resolver_context.write().await.financial_summary = Some(financial_summary.clone());
                Some(financial_summary)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "Error loading financial summary: {}", e);
                None
            }
        }
    }

    pub async fn financial_context(&self) -> Option<FinancialContext> {
        self.analytics
            .financial_context()
            .await
            .map_err(|e| warn!("Error getting financial context: {}", e))
            .ok()
    }

    pub async fn bill_reminders(&self) -> Vec<Value> {
        self.analytics.bill_reminders().await.unwrap_or_else(|e| {
            warn!("Error getting bill reminders: {}", e);
            Vec::new()
        })
    }

    pub async fn budget_suggestions(&self) -> Option<Value> {
        self.analytics
            .budget_suggestions()
            .await
            .map_err(|e| warn!("Error getting budget suggestions: {}", e))
            .ok()
    }

    /// URL of a generated report document.
    pub async fn generate_report(&self, report_type: &str, format: &str) -> Option<String> {
        self.analytics
            .generate_report(report_type, format)
            .await
            .map_err(|e| warn!(report_type, format, "Error generating report: {}", e))
            .ok()
    }
}

/// Remote apology first, then whatever the local resolver can offer.
fn with_local_fallback(remote: AssistantResponse, local: AssistantResponse) -> AssistantResponse {
    let mut quick_actions = remote.quick_actions;
    quick_actions.extend(local.quick_actions);

    AssistantResponse {
        message: format!("{}\n\n{}", remote.message, local.message),
        quick_actions,
        report: local.report,
        ..unavailable_response()
    }
}

fn unauthenticated_response() -> AssistantResponse {
    AssistantResponse::local(
        SIGN_IN_MESSAGE,
        vec![QuickAction::new("sign_in", "Sign In", ActionKind::Navigate, IconRef::Person)
            .with_description("Sign in to your account")],
    )
    .with_source(ResponseSource::Unauthenticated)
}
