//! Per-identity sliding-window rate governor
//!
//! Each identity keeps the timestamps of its admitted turns. A turn is admitted
//! when fewer than `max_requests` of those timestamps fall inside the window.
//! The check and the insert happen under one lock, so concurrent turns from the
//! same identity cannot both squeeze into the last free slot.

use crate::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct RateGovernor {
    window: Duration,
    max_requests: usize,
    records: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateGovernor {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: config.window,
            max_requests: config.max_requests,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admit or reject a turn for `identity`.
    ///
    /// A rejected turn leaves the record untouched.
    pub async fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, Instant::now()).await
    }

    async fn admit_at(&self, identity: &str, now: Instant) -> bool {
        let mut records = self.records.lock().await;
        let window = self.window;
        let in_window = |t: &Instant| now.saturating_duration_since(*t) < window;

        let live = records
            .get(identity)
            .map(|record| record.iter().filter(|t| in_window(t)).count())
            .unwrap_or(0);

        if live >= self.max_requests {
            debug!(identity = %identity, live, max = self.max_requests, "Rate window full");
            return false;
        }

        let record = records.entry(identity.to_string()).or_default();
        while record.front().is_some_and(|t| !in_window(t)) {
            record.pop_front();
        }
        record.push_back(now);

        true
    }

    /// Slots still free for `identity` in the current window.
    pub async fn remaining(&self, identity: &str) -> usize {
        let now = Instant::now();
        let records = self.records.lock().await;
        let live = records
            .get(identity)
            .map(|record| {
                record
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0);

        self.max_requests.saturating_sub(live)
    }

    /// Drop identities with no timestamps left in the window. Returns how
    /// many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let before = records.len();

        records.retain(|_, record| {
            while record.front().is_some_and(|t| now.saturating_duration_since(*t) >= self.window) {
                record.pop_front();
            }
            !record.is_empty()
        });

        before - records.len()
    }

    /// Identities currently holding a rate record.
    pub async fn tracked(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Hold the record lock so a test can park turns inside `admit`.
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.records.lock().await
    }

    /// Recorded timestamps for `identity`, pruned or not.
    #[cfg(test)]
    async fn recorded(&self, identity: &str) -> usize {
        self.records
            .lock()
            .await
            .get(identity)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
