//! In-process attempt limiting
//!
//! Sliding-window counters keyed by a string (normalized email). Used to slow
//! down password guessing and to throttle password reset mail:
//! - failed logins: 5 per 15 minutes per email
//! - reset requests: 3 per 15 minutes per email
//!
//! State lives in this process only and resets on restart.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sliding-window attempt counter
pub struct AttemptLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl AttemptLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seconds until the next attempt is allowed, or `None` if `key` is not limited
    pub async fn retry_after(&self, key: &str) -> Option<i64> {
        let mut attempts = self.attempts.write().await;
        let now = Utc::now();
        let cutoff = now - self.window;

        let key_attempts = attempts.entry(key.to_lowercase()).or_default();
        key_attempts.retain(|time| *time > cutoff);

        if key_attempts.len() < self.max_attempts {
            return None;
        }
        let oldest = key_attempts.iter().min().copied().unwrap_or(now);
        Some((oldest + self.window - now).num_seconds().max(1))
    }

    /// Record an attempt for `key`
    pub async fn record(&self, key: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(key.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget all attempts for `key`
    pub async fn clear(&self, key: &str) {
        self.attempts.write().await.remove(&key.to_lowercase());
    }

    /// Drop entries that fell out of the window (called periodically)
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.attempts.read().await.len()
    }
}

/// The limiters shared by the identity services
pub struct RateLimiters {
    pub login: AttemptLimiter,
    pub reset_request: AttemptLimiter,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            login: AttemptLimiter::new(5, Duration::minutes(15)),
            reset_request: AttemptLimiter::new(3, Duration::minutes(15)),
        }
    }

    pub async fn cleanup(&self) {
        self.login.cleanup().await;
        self.reset_request.cleanup().await;
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}
