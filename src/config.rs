//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from `.env`
//! by the binaries). Anything missing or unparseable falls back to a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_RATE_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_RATE_MAX_REQUESTS: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONVERSATION_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1_800;

/// Rate key shared by every turn that arrives without an authenticated identity.
pub const ANONYMOUS_IDENTITY: &str = "current-user";

/// What to do with turns that carry no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnonymousPolicy {
    /// Charge all anonymous turns to one shared rate record.
    #[default]
    Pool,
    /// Refuse anonymous turns before any work is done.
    Reject,
}

impl FromStr for AnonymousPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pool" | "pooled" => Ok(AnonymousPolicy::Pool),
            "reject" | "deny" => Ok(AnonymousPolicy::Reject),
            other => Err(format!("unknown anonymous policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_RATE_WINDOW_MS),
            max_requests: DEFAULT_RATE_MAX_REQUESTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the finance REST backend. `None` runs on in-memory collaborators.
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub anonymous_policy: AnonymousPolicy,
    /// Whether local (non-AI) turns count against the rate budget.
    pub throttle_local_turns: bool,
    /// Ask the remote assistant to read the user's transactions, bills and loans.
    pub include_financial_context: bool,
    pub http_timeout: Duration,
    pub conversation_page_size: u32,
    pub message_page_size: u32,
    /// Sessions unused for this long are dropped by the API server.
    pub session_idle_ttl: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            rate_limit: RateLimitConfig::default(),
            anonymous_policy: AnonymousPolicy::default(),
            throttle_local_turns: true,
            include_financial_context: true,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            conversation_page_size: DEFAULT_CONVERSATION_PAGE_SIZE,
            message_page_size: DEFAULT_MESSAGE_PAGE_SIZE,
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_base_url = env::var("FINANCE_API_BASE_URL")
            .or_else(|_| env::var("API_BASE_URL"))
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let api_token = env::var("FINANCE_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let window_ms = parse_env("ASSISTANT_RATE_WINDOW_MS", DEFAULT_RATE_WINDOW_MS);
        let max_requests = parse_env("ASSISTANT_RATE_MAX_REQUESTS", DEFAULT_RATE_MAX_REQUESTS);

        Self {
            api_base_url,
            api_token,
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(window_ms),
                max_requests,
            },
            anonymous_policy: parse_env("ASSISTANT_ANONYMOUS_POLICY", defaults.anonymous_policy),
            throttle_local_turns: parse_env("ASSISTANT_THROTTLE_LOCAL", defaults.throttle_local_turns),
            include_financial_context: parse_env(
                "ASSISTANT_INCLUDE_CONTEXT",
                defaults.include_financial_context,
            ),
            http_timeout: Duration::from_secs(parse_env(
                "ASSISTANT_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            conversation_page_size: parse_env(
                "ASSISTANT_CONVERSATION_PAGE_SIZE",
                DEFAULT_CONVERSATION_PAGE_SIZE,
            ),
            message_page_size: parse_env("ASSISTANT_MESSAGE_PAGE_SIZE", DEFAULT_MESSAGE_PAGE_SIZE),
            session_idle_ttl: Duration::from_secs(parse_env(
                "ASSISTANT_SESSION_IDLE_SECS",
                DEFAULT_SESSION_IDLE_SECS,
            )),
        }
    }
}

/// Port for the HTTP server binary.
pub fn server_port() -> u16 {
    let raw = env::var("PORT").or_else(|_| env::var("API_PORT")).ok();
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid PORT value '{}', using {}", value, DEFAULT_PORT);
            DEFAULT_PORT
        }),
        None => DEFAULT_PORT,
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}='{}', using {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
