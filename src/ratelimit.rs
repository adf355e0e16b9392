use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::forms::FormKind;

const MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window_secs: i64,
}

/// Fixed-window budget per form kind. Emergency reports are deliberately
/// throttled less aggressively than contact/quote submissions.
pub fn policy_for(kind: FormKind) -> RateLimitPolicy {
    match kind {
        FormKind::Contact => RateLimitPolicy {
            max_requests: 10,
            window_secs: 60,
        },
        FormKind::Quote => RateLimitPolicy {
            max_requests: 20,
            window_secs: 60,
        },
        FormKind::Emergency => RateLimitPolicy {
            max_requests: 40,
            window_secs: 60,
        },
    }
}

#[derive(Debug, Clone)]
struct WindowCounter {
    window_start: i64,
    count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the current window elapses, suitable for Retry-After.
    pub reset_in: i64,
    /// Unix timestamp of the window end.
    pub reset_at: i64,
}

/// In-process fixed-window rate limiter keyed by (client, form kind).
/// State is process-local, so limiting is best-effort under horizontal
/// scaling; a process restart resets all counters.
#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<(String, FormKind), WindowCounter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check(&self, client: &str, kind: FormKind) -> RateLimitDecision {
        self.check_at(client, kind, Utc::now().timestamp()).await
    }

    /// Same as [`check`](Self::check) but with an explicit clock, so tests
    /// control time.
    pub async fn check_at(&self, client: &str, kind: FormKind, now: i64) -> RateLimitDecision {
        let policy = policy_for(kind);
        let mut entries = self.entries.lock().await;
        if entries.len() > MAX_ENTRIES {
            entries.retain(|(_, k), v| now < v.window_start + policy_for(*k).window_secs);
        }
        let entry = entries
            .entry((client.to_string(), kind))
            .or_insert(WindowCounter {
                window_start: now,
                count: 0,
            });
        if now >= entry.window_start + policy.window_secs {
            entry.window_start = now;
            entry.count = 0;
        }
        let reset_at = entry.window_start + policy.window_secs;
        let reset_in = (reset_at - now).max(1);
        if entry.count >= policy.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in,
                reset_at,
            };
        }
        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests - entry.count,
            reset_in,
            reset_at,
        }
    }
}
