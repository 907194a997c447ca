//! Fixed-window admission control per client identity.
//!
//! Each identity gets a counter and a window end. The first request in a
//! window opens it; up to `max_requests` are admitted until the window ends.
//! Bursts straddling a window boundary can therefore see up to twice the
//! capacity admitted in a short span. That is the accepted behavior of a
//! fixed window; switching to sliding windows would change who gets admitted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url2md_logging::{conv_debug, conv_warn};

use crate::sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per identity per window.
    pub max_requests: u32,
    pub window: Duration,
    /// How often expired entries are swept.
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl RateLimitConfig {
    fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time
    }
}

/// What a client sees after an admitted request (used for response headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit of {limit} requests exceeded, resets at {reset_time}")]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits or rejects one request from `identity`.
    pub fn check(&self, identity: &str) -> Result<RateLimitInfo, RateLimitExceeded> {
        self.check_at(identity, Utc::now())
    }

    pub fn check_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitInfo, RateLimitExceeded> {
        let limit = self.config.max_requests;
        let mut entries = sync::lock(&self.entries);

        match entries.get_mut(identity) {
            Some(entry) if !entry.is_expired(now) => {
                if entry.count >= limit {
                    conv_warn!(
                        "Rate limit exceeded for {} ({} requests, resets at {})",
                        identity,
                        entry.count,
                        entry.reset_time
                    );
                    return Err(RateLimitExceeded {
                        limit,
                        reset_time: entry.reset_time,
                    });
                }
                entry.count += 1;
                Ok(self.info(entry))
            }
            _ => {
                let entry = RateLimitEntry {
                    count: 1,
                    reset_time: self.config.window_end(now),
                };
                entries.insert(identity.to_string(), entry);
                Ok(self.info(&entry))
            }
        }
    }

    /// Current standing of `identity` without consuming a request.
    pub fn status_at(&self, identity: &str, now: DateTime<Utc>) -> RateLimitInfo {
        let entries = sync::lock(&self.entries);
        match entries.get(identity) {
            Some(entry) if !entry.is_expired(now) => self.info(entry),
            _ => RateLimitInfo {
                limit: self.config.max_requests,
                remaining: self.config.max_requests,
                reset_time: self.config.window_end(now),
            },
        }
    }

    /// Drops every entry whose window has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = sync::lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            conv_debug!("Swept {} expired rate limit entries", removed);
        }
        removed
    }

    pub fn tracked_identities(&self) -> usize {
        sync::lock(&self.entries).len()
    }

    fn info(&self, entry: &RateLimitEntry) -> RateLimitInfo {
        RateLimitInfo {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
        }
    }
}
