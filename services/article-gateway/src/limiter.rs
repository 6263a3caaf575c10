// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Two-tier rate limiting for the article API.
//!
//! 1. A global token bucket shared by every caller. An empty bucket is a
//!    hard rejection.
//! 2. A per-source cool-down. The first request from a source marks it;
//!    requests arriving while it is marked are held until the mark's
//!    window closes, then let through. The cool-down never rejects.
//!
//! Each mark carries an epoch. Its removal task only deletes the mark it
//! was spawned for, never a newer occupancy of the same source.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Result of the global throughput check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Whole tokens left in the bucket
        remaining: u32,
    },
    /// Request is rate limited
    Limited {
        /// Time until a token is available
        retry_after: Duration,
    },
}

/// Outcome of passing through the cool-down gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownOutcome {
    /// Source was not marked; it is now
    Immediate,
    /// Source was marked; the caller waits this long
    Held(Duration),
}

/// Token bucket for rate limiting.
#[derive(Debug)]
struct TokenBucket {
    /// Available tokens
    tokens: f64,
    /// Maximum tokens (bucket capacity)
    max_tokens: f64,
    /// Token refill rate per second
    refill_rate: f64,
    /// Last time tokens were refilled
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    fn new(rate_per_sec: f64, burst: u32) -> Self {
        let max_tokens = f64::from(burst.max(1));
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: rate_per_sec.max(0.0),
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Try to consume a token. Returns true if successful.
    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> u32 {
        self.tokens.floor() as u32
    }

    /// Get time until a token is available.
    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate <= 0.0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// One occupancy of a source's cool-down.
#[derive(Debug, Clone, Copy)]
struct Mark {
    epoch: u64,
    until: Instant,
}

type Marks = Arc<Mutex<HashMap<IpAddr, Mark>>>;

/// Thread-safe two-tier rate limiter.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    marks: Marks,
    next_epoch: AtomicU64,
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.rate_per_sec, config.burst)),
            marks: Arc::new(Mutex::new(HashMap::new())),
            next_epoch: AtomicU64::new(0),
            window: config.cooldown_window(),
        }
    }

    /// Take one token from the global bucket.
    pub async fn check_global(&self) -> RateLimitResult {
        let mut bucket = self.bucket.lock().await;
        if bucket.try_consume() {
            RateLimitResult::Allowed {
                remaining: bucket.remaining(),
            }
        } else {
            let retry_after = bucket.time_until_available();
            debug!(?retry_after, "Global rate limit exceeded");
            RateLimitResult::Limited { retry_after }
        }
    }

    /// Pass `source` through the cool-down gate, waiting if it is marked.
    ///
    /// The wait happens outside every lock, so a held caller never stalls
    /// bookkeeping for other sources. Dropping the future mid-wait leaves
    /// the mark and its removal task untouched.
    pub async fn enter(&self, source: IpAddr) -> CooldownOutcome {
        let outcome = self.cooldown(source).await;
        if let CooldownOutcome::Held(wait) = outcome {
            debug!(%source, ?wait, "Source in cool-down, holding request");
            tokio::time::sleep(wait).await;
        }
        outcome
    }

    /// Mark `source` or report how long it must wait. Does not sleep.
    pub async fn cooldown(&self, source: IpAddr) -> CooldownOutcome {
        if self.window.is_zero() {
            return CooldownOutcome::Immediate;
        }

        let now = Instant::now();
        let mut marks = self.marks.lock().await;
        if let Some(mark) = marks.get(&source) {
            if mark.until > now {
                return CooldownOutcome::Held(mark.until - now);
            }
        }

        let mark = Mark {
            epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
            until: now + self.window,
        };
        marks.insert(source, mark);
        drop(marks);

        let marks = Arc::clone(&self.marks);
        tokio::spawn(async move {
            tokio::time::sleep_until(mark.until).await;
            remove_if_current(&marks, source, mark.epoch).await;
        });

        CooldownOutcome::Immediate
    }

    /// Whether `source` currently holds a mark.
    pub async fn is_marked(&self, source: IpAddr) -> bool {
        let now = Instant::now();
        self.marks
            .lock()
            .await
            .get(&source)
            .is_some_and(|mark| mark.until > now)
    }

    /// Drop expired marks whose removal task has not run yet.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.marks.lock().await.retain(|_, mark| mark.until > now);
    }
}

/// Remove the mark for `source` only if it is still occupancy `epoch`.
async fn remove_if_current(marks: &Mutex<HashMap<IpAddr, Mark>>, source: IpAddr, epoch: u64) {
    let mut marks = marks.lock().await;
    if marks.get(&source).is_some_and(|mark| mark.epoch == epoch) {
        marks.remove(&source);
        debug!(%source, epoch, "Cool-down mark released");
    }
}
