//! Per-client rate limiting
//!
//! Two backends implement [`RateLimitBackend`], selected once at startup:
//!
//! - [`MemoryRateLimiter`] — fixed-window counter with an escalating block
//!   penalty, per process. The default.
//! - [`UpstashRateLimiter`] — sliding window over a shared Upstash Redis
//!   store, for multi-instance deployments.
//!
//! Admission never fails the request path: the memory backend is infallible
//! and the shared backend degrades to fail-open admission on any error.

mod upstash;

pub use upstash::UpstashRateLimiter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::RateLimitConfig;
use crate::types::RateDecision;

/// Admission control for one client identifier per call.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Decide whether a request from `client_id` may proceed.
    async fn admit(&self, client_id: &str) -> RateDecision;

    /// Drop stale bookkeeping. The shared store expires its own keys, so
    /// only the in-memory backend does real work here.
    fn sweep(&self) {}
}

/// Build the configured backend: shared store when Upstash credentials are
/// present, in-memory fixed window otherwise.
pub fn from_config(config: &RateLimitConfig) -> Arc<dyn RateLimitBackend> {
    if config.has_shared_store() {
        match UpstashRateLimiter::new(config) {
            Ok(limiter) => {
                tracing::info!("Upstash rate limiter configured");
                return Arc::new(limiter);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstash limiter unavailable, using in-memory fallback");
            }
        }
    } else {
        tracing::info!("Upstash not configured, using in-memory rate limiting");
    }
    Arc::new(MemoryRateLimiter::new(
        config.max_requests,
        Duration::from_secs(config.window_secs),
        Duration::from_secs(config.block_secs),
    ))
}

/// Per-client counter state.
#[derive(Debug, Clone)]
struct Entry {
    window_start: Instant,
    count: u32,
    block_until: Option<Instant>,
}

/// In-memory fixed-window limiter with a penalty block.
///
/// A client that exceeds the window threshold is blocked for a longer
/// penalty duration; while blocked, requests are denied unconditionally,
/// even across window resets.
pub struct MemoryRateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
    max_requests: u32,
    window: Duration,
    block: Duration,
}

impl MemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration, block: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_requests,
            window,
            block,
        }
    }

    fn admit_at(&self, client_id: &str, now: Instant) -> RateDecision {
        let mut entries = self.entries.lock();

        let entry = entries
            .entry(client_id.to_string())
            .and_modify(|e| {
                // A fresh window, unless the client is serving a block
                if e.block_until.is_none()
                    && now.saturating_duration_since(e.window_start) > self.window
                {
                    e.window_start = now;
                    e.count = 0;
                }
            })
            .or_insert(Entry {
                window_start: now,
                count: 0,
                block_until: None,
            });

        if let Some(until) = entry.block_until {
            if now < until {
                return RateDecision {
                    allowed: false,
                    limit: self.max_requests,
                    remaining: 0,
                    retry_after_secs: remaining_secs(now, until),
                };
            }
            // Block expired: start over
            entry.block_until = None;
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count += 1;

        if entry.count > self.max_requests {
            let until = now + self.block;
            entry.block_until = Some(until);
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                retry_after_secs: remaining_secs(now, until),
            };
        }

        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            retry_after_secs: remaining_secs(now, entry.window_start + self.window),
        }
    }

    fn sweep_at(&self, now: Instant) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| {
            // Never drop an active block early
            if e.block_until.is_some_and(|until| now < until) {
                return true;
            }
            now.saturating_duration_since(e.window_start) <= self.window * 2
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Swept stale rate-limit entries");
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl RateLimitBackend for MemoryRateLimiter {
    async fn admit(&self, client_id: &str) -> RateDecision {
        self.admit_at(client_id, Instant::now())
    }

    fn sweep(&self) {
        self.sweep_at(Instant::now());
    }
}

/// Whole seconds until `until`, rounded up, at least 1.
fn remaining_secs(now: Instant, until: Instant) -> u64 {
    let remaining = until.saturating_duration_since(now);
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);
    const BLOCK: Duration = Duration::from_secs(120);

    fn limiter(max: u32) -> MemoryRateLimiter {
        MemoryRateLimiter::new(max, WINDOW, BLOCK)
    }

    #[test]
    fn test_admits_up_to_threshold() {
        let rl = limiter(3);
        let now = Instant::now();

        for i in 0..3 {
            let d = rl.admit_at("1.2.3.4", now);
            assert!(d.allowed, "request {} should be admitted", i + 1);
            assert_eq!(d.remaining, 3 - (i + 1));
            assert!(d.retry_after_secs > 0);
        }

        let denied = rl.admit_at("1.2.3.4", now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_secs > 0);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let rl = limiter(1);
        let now = Instant::now();

        assert!(rl.admit_at("a", now).allowed);
        assert!(rl.admit_at("b", now).allowed);
        assert!(!rl.admit_at("a", now).allowed);
    }

    #[test]
    fn test_window_reset_clears_count() {
        let rl = limiter(2);
        let now = Instant::now();

        assert!(rl.admit_at("ip", now).allowed);
        assert!(rl.admit_at("ip", now).allowed);

        let later = now + WINDOW + Duration::from_secs(1);
        let d = rl.admit_at("ip", later);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn test_block_outlasts_window_reset() {
        let rl = limiter(2);
        let now = Instant::now();

        rl.admit_at("ip", now);
        rl.admit_at("ip", now);
        let breached = rl.admit_at("ip", now);
        assert!(!breached.allowed);

        // Well past a window reset, but still inside the block
        let mid_block = now + WINDOW + Duration::from_secs(30);
        let d = rl.admit_at("ip", mid_block);
        assert!(!d.allowed);
        assert!(d.retry_after_secs > 0);

        // After the block expires the client starts fresh
        let after_block = now + BLOCK + Duration::from_secs(1);
        assert!(rl.admit_at("ip", after_block).allowed);
    }

    #[test]
    fn test_block_duration_reported() {
        let rl = limiter(1);
        let now = Instant::now();

        rl.admit_at("ip", now);
        let d = rl.admit_at("ip", now);
        assert!(!d.allowed);
        assert_eq!(d.retry_after_secs, BLOCK.as_secs());
    }

    #[test]
    fn test_sweep_drops_stale_entries() {
        let rl = limiter(5);
        let now = Instant::now();

        rl.admit_at("old", now);
        rl.admit_at("fresh", now + WINDOW * 2);
        assert_eq!(rl.len(), 2);

        rl.sweep_at(now + WINDOW * 2 + Duration::from_secs(1));
        assert_eq!(rl.len(), 1);
    }

    #[test]
    fn test_sweep_keeps_blocked_entries() {
        // Block longer than the 2-window staleness horizon
        let rl = MemoryRateLimiter::new(1, WINDOW, Duration::from_secs(300));
        let now = Instant::now();

        rl.admit_at("ip", now);
        rl.admit_at("ip", now); // breached: blocked for 300s
        assert_eq!(rl.len(), 1);

        // Stale by window arithmetic (200s > 2 windows), block still active
        let mid_block = now + Duration::from_secs(200);
        rl.sweep_at(mid_block);
        assert_eq!(rl.len(), 1);
        assert!(!rl.admit_at("ip", mid_block).allowed);
    }

    #[tokio::test]
    async fn test_backend_trait_admission() {
        let rl = limiter(10);
        let d = rl.admit("trait-caller").await;
        assert!(d.allowed);
        assert_eq!(d.limit, 10);
        assert_eq!(d.remaining, 9);
    }
}
