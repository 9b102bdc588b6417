//! Keyed sliding-window rate limiter.
//!
//! Tracks admitted-call timestamps per logical key (e.g. `"jira"`, `"llm"`)
//! and admits a new call only while fewer than `limit` calls fall inside the
//! trailing `window`. The window slides with the clock, so there is no burst
//! at a bucket boundary.
//!
//! State is in-memory and process-scoped. `allow` never sleeps: backoff and
//! retry are the caller's business.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::trace;

/// In-memory sliding-window rate limiter.
///
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly). One lock
/// covers the whole map so prune, compare and append happen atomically.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Allow at most `limit` calls per key in any trailing `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a call for `key` may proceed now. Returns `true` if
    /// admitted, in which case the call is counted.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Clear all keys' state.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Maximum calls per window.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Length of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.lock();
        let timestamps = requests.entry(key.to_string()).or_default();

        // Keep only calls strictly newer than `now - window`.
        timestamps.retain(|t| now.saturating_duration_since(*t) < self.window);

        if timestamps.len() >= self.limit {
            trace!(key, count = timestamps.len(), "rate limit reached");
            return false;
        }

        timestamps.push(now);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        // The map is valid after any panic mid-update, so a poisoned lock is
        // still usable.
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn tracked(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }
}
