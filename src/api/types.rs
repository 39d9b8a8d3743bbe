//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core_state::CoreState;

/// Failed logins allowed per email before it is locked out.
const MAX_LOGIN_FAILURES: u32 = 5;
/// How long a locked-out email stays locked.
const LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);
/// Idle callers are swept once either map grows past this size.
const SWEEP_THRESHOLD: usize = 1000;
const HOUR: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware.
/// Wraps `CoreState` plus HTTP-specific limiters.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub login_lockout: Arc<Mutex<LoginLockout>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            login_lockout: Arc::new(Mutex::new(LoginLockout::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-caller sliding window
// ═══════════════════════════════════════════════════════════

/// Per-caller rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a caller is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() >= SWEEP_THRESHOLD && !self.windows.contains_key(key) {
            self.sweep(now);
        }
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Drop callers with nothing left in their hourly window.
    fn sweep(&mut self, now: Instant) {
        let before = self.windows.len();
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < HOUR);
            !entries.is_empty()
        });
        tracing::debug!(swept = before - self.windows.len(), "Rate limiter windows swept");
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Login lockout: repeated bad passwords per email
// ═══════════════════════════════════════════════════════════

struct FailureRecord {
    count: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    /// Nothing worth remembering: the lock ran out, or the last miss is
    /// older than a lockout period.
    fn is_stale(&self, now: Instant, duration: Duration) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(self.last_failure) >= duration,
        }
    }
}

pub struct LoginLockout {
    failures: HashMap<String, FailureRecord>,
    max_failures: u32,
    duration: Duration,
}

impl LoginLockout {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            max_failures: MAX_LOGIN_FAILURES,
            duration: LOCKOUT_DURATION,
        }
    }

    /// Seconds until `key` may try again, if it is locked.
    pub fn locked_for(&self, key: &str) -> Option<u64> {
        let until = self.failures.get(key)?.locked_until?;
        let now = Instant::now();
        (now < until).then(|| until.duration_since(now).as_secs().max(1))
    }

    pub fn record_failure(&mut self, key: &str) {
        let now = Instant::now();
        if self.failures.len() >= SWEEP_THRESHOLD && !self.failures.contains_key(key) {
            self.sweep(now);
        }
        let record = self.failures.entry(key.to_string()).or_insert(FailureRecord {
            count: 0,
            last_failure: now,
            locked_until: None,
        });
        if record.locked_until.is_some_and(|until| now >= until) {
            record.count = 0;
            record.locked_until = None;
        }
        record.count += 1;
        record.last_failure = now;
        if record.count >= self.max_failures {
            record.locked_until = Some(now + self.duration);
            tracing::warn!(key, "Login locked after repeated failures");
        }
    }

    pub fn clear(&mut self, key: &str) {
        self.failures.remove(key);
    }

    fn sweep(&mut self, now: Instant) {
        let duration = self.duration;
        let before = self.failures.len();
        self.failures.retain(|_, record| !record.is_stale(now, duration));
        tracing::debug!(swept = before - self.failures.len(), "Login failure records swept");
    }
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new()
    }
}
