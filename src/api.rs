//! REST API server for the finance assistant
//!
//! Exposes the per-session assistant operations over HTTP for the dashboard UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AssistantConfig;
use crate::models::ChatMode;
use crate::rate_limit::RateGovernor;
use crate::session::{AssistantSession, SessionBackends};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatTurnRequest {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub mode: ChatMode,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn unknown_session(session_id: &str) -> ApiResult {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(format!("Unknown session: {}", session_id))),
    )
}

/// =============================
/// Session Registry
/// =============================

/// Live sessions keyed by session id. All sessions share one rate governor,
/// so opening a new session does not reset a user's budget. Sessions idle for
/// longer than the configured TTL are dropped by `sweep_idle`.
pub struct SessionRegistry {
    config: AssistantConfig,
    backends: SessionBackends,
    governor: Arc<RateGovernor>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

struct SessionEntry {
    session: Arc<AssistantSession>,
    last_used: Instant,
}

impl SessionRegistry {
    pub fn new(config: AssistantConfig, backends: SessionBackends) -> Self {
        let governor = Arc::new(RateGovernor::new(config.rate_limit.clone()));
        Self {
            config,
            backends,
            governor,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, session_id: &str) -> Option<Arc<AssistantSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(session_id).map(|entry| {
            entry.last_used = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    /// Existing session, or a new one bound to `user_id`.
    pub async fn get_or_create(&self, session_id: &str, user_id: Option<&str>) -> Arc<AssistantSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            info!(session_id, user_id = ?user_id, "Opening assistant session");
            SessionEntry {
                session: Arc::new(AssistantSession::new(
                    session_id,
                    user_id.map(str::to_string),
                    self.config.clone(),
                    self.backends.clone(),
                    Arc::clone(&self.governor),
                )),
                last_used: Instant::now(),
            }
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.session)
    }

    /// Drop idle sessions and empty rate records. Returns how many sessions
    /// were removed.
    pub async fn sweep_idle(&self) -> usize {
        let ttl = self.config.session_idle_ttl;
        let now = Instant::now();

        let removed = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, entry| now.saturating_duration_since(entry.last_used) < ttl);
            before - sessions.len()
        };
        let forgotten = self.governor.sweep().await;

        if removed > 0 || forgotten > 0 {
            info!(removed, forgotten, "Swept idle sessions and rate records");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Run `sweep_idle` periodically for the lifetime of the server.
pub fn spawn_sweeper(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    let period = registry
        .config
        .session_idle_ttl
        .clamp(Duration::from_secs(1), Duration::from_secs(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            registry.sweep_idle().await;
        }
    })
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Client-chosen session id, or one derived from the user id so the same
/// user lands in the same session.
fn resolve_session_id(session_id: Option<&str>, user_id: Option<&str>) -> String {
    match (session_id, user_id) {
        (Some(id), _) if !id.trim().is_empty() => id.trim().to_string(),
        (_, Some(user)) if !user.trim().is_empty() => {
            stable_uuid_from_string(&format!("session:{}", user.trim())).to_string()
        }
        _ => stable_uuid_from_string("session:anonymous-user").to_string(),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatTurnRequest>,
) -> ApiResult {
    let session_id = resolve_session_id(req.session_id.as_deref(), req.user_id.as_deref());
    let session = state
        .registry
        .get_or_create(&session_id, req.user_id.as_deref())
        .await;

    info!(session_id = %session_id, mode = %req.mode, "chat turn received");
    let response = session.send_turn(&req.text, req.mode).await;

    ok(serde_json::json!({
        "session_id": session_id,
        "response": response,
    }))
}

/// =============================
/// Conversation Endpoints
/// =============================

async fn list_conversations(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    ok(session.list_conversations().await)
}

async fn current_conversation(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    ok(serde_json::json!({
        "conversation_id": session.current_conversation_id().await,
    }))
}

async fn open_conversation(
    State(state): State<ApiState>,
    Path((session_id, conversation_id)): Path<(String, String)>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    let messages = session.open_conversation(&conversation_id).await;
    ok(serde_json::json!({
        "conversation_id": conversation_id,
        "messages": messages,
    }))
}

async fn delete_conversation(
    State(state): State<ApiState>,
    Path((session_id, conversation_id)): Path<(String, String)>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    let deleted = session.delete_conversation(&conversation_id).await;
    ok(serde_json::json!({ "deleted": deleted }))
}

async fn new_conversation(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    session.start_new_conversation().await;
    ok(serde_json::json!({ "conversation_id": null }))
}

async fn usage(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let Some(session) = state.registry.get(&session_id).await else {
        return unknown_session(&session_id);
    };
    ok(serde_json::json!({
        "tokens_used": session.tokens_used(),
        "remaining_requests": session.remaining_requests().await,
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(registry: Arc<SessionRegistry>) -> Router {
    let state = ApiState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/:session_id/conversations", get(list_conversations))
        .route(
            "/api/sessions/:session_id/conversations/current",
            get(current_conversation),
        )
        .route(
            "/api/sessions/:session_id/conversations/new",
            post(new_conversation),
        )
        .route(
            "/api/sessions/:session_id/conversations/:conversation_id/open",
            post(open_conversation),
        )
        .route(
            "/api/sessions/:session_id/conversations/:conversation_id",
            delete(delete_conversation),
        )
        .route("/api/sessions/:session_id/usage", get(usage))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    registry: Arc<SessionRegistry>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    spawn_sweeper(Arc::clone(&registry));
    let router = create_router(registry);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Turn;
    use crate::store::InMemoryConversationStore;
    use crate::testing::{MockAnalyticsSource, MockChatBackend};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn registry_with_history() -> Arc<SessionRegistry> {
        let store = Arc::new(InMemoryConversationStore::new());
        store.seed("c-1", "Bills", vec![Turn::user("show my bills")]).await;
        let backends = SessionBackends {
            chat: Arc::new(MockChatBackend::new()),
            store,
            analytics: Arc::new(MockAnalyticsSource::healthy()),
        };
        Arc::new(SessionRegistry::new(AssistantConfig::default(), backends))
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_session_id_resolution() {
        assert_eq!(resolve_session_id(Some("abc"), Some("alice")), "abc");
        assert_eq!(
            resolve_session_id(None, Some("alice")),
            resolve_session_id(Some("  "), Some("alice"))
        );
        assert_ne!(
            resolve_session_id(None, Some("alice")),
            resolve_session_id(None, Some("bob"))
        );
        assert!(uuid::Uuid::parse_str(&resolve_session_id(None, None)).is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(registry_with_history().await);

        let (status, body) = call(&router, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_turn_creates_session() {
        let registry = registry_with_history().await;
        let router = create_router(Arc::clone(&registry));

        let (status, body) = call(
            &router,
            "POST",
            "/api/chat",
            Some(json!({ "session_id": "s-1", "user_id": "alice", "text": "I need help with my bills" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["session_id"], "s-1");
        assert_eq!(body["data"]["response"]["source"], "local");
        let actions = body["data"]["response"]["quickActions"].as_array().unwrap();
        assert!(actions.iter().any(|a| a["id"] == "add_bill"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_ai_turn_reports_usage() {
        let router = create_router(registry_with_history().await);

        call(
            &router,
            "POST",
            "/api/chat",
            Some(json!({ "session_id": "s-2", "text": "how am I doing?", "mode": "ai" })),
        )
        .await;
        let (_, usage) = call(&router, "GET", "/api/sessions/s-2/usage", None).await;
        let (_, current) = call(&router, "GET", "/api/sessions/s-2/conversations/current", None).await;

        assert_eq!(usage["data"]["tokens_used"], 5);
        assert_eq!(usage["data"]["remaining_requests"], 9);
        assert_eq!(current["data"]["conversation_id"], "mock-conversation");
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let router = create_router(registry_with_history().await);
        call(
            &router,
            "POST",
            "/api/chat",
            Some(json!({ "session_id": "s-3", "text": "hello" })),
        )
        .await;

        let (_, listed) = call(&router, "GET", "/api/sessions/s-3/conversations", None).await;
        assert_eq!(listed["data"][0]["id"], "c-1");

        let (_, opened) = call(&router, "POST", "/api/sessions/s-3/conversations/c-1/open", None).await;
        assert_eq!(opened["data"]["messages"][0]["content"], "show my bills");

        let (_, deleted) = call(&router, "DELETE", "/api/sessions/s-3/conversations/c-1", None).await;
        assert_eq!(deleted["data"]["deleted"], true);

        let (_, current) = call(&router, "GET", "/api/sessions/s-3/conversations/current", None).await;
        assert!(current["data"]["conversation_id"].is_null());

        let (_, missing) = call(&router, "DELETE", "/api/sessions/s-3/conversations/c-1", None).await;
        assert_eq!(missing["data"]["deleted"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_swept() {
        let registry = registry_with_history().await;
        registry.get_or_create("idle", None).await;
        registry.get_or_create("busy", Some("alice")).await;
        registry.get("busy").await.unwrap().send_turn("loans", ChatMode::Local).await;

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        assert!(registry.get("busy").await.is_some());
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(registry.sweep_idle().await, 1);
        assert!(registry.get("idle").await.is_none());
        assert!(registry.get("busy").await.is_some());
        assert_eq!(registry.governor.tracked().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let router = create_router(registry_with_history().await);

        let (status, body) = call(&router, "POST", "/api/sessions/nope/conversations/new", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
