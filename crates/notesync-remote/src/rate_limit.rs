//! Request-rate ceiling for the remote API
//!
//! A single [`TokenBucket`] guards every request the client sends. The bucket
//! adapts to the server: each throttle response (HTTP 429) halves the refill
//! rate, and runs of successful requests restore it step by step.
//!
//! ```rust,no_run
//! use notesync_remote::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//! limiter.acquire().await;
//! // ... send the request ...
//! limiter.on_success();
//! # }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use notesync_core::config::RemoteConfig;

/// Successes needed before the refill rate is raised again
const RECOVERY_STEP: u64 = 50;

/// Throttling never drops the rate below this fraction of the configured one
const MIN_RATE_FRACTION: f64 = 1.0 / 16.0;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Current refill rate, lowered by throttling
    effective_rate: f64,
    /// Consecutive successes since the last throttle
    successes: u64,
}

/// Classic token bucket with adaptive refill rate
///
/// The bucket starts full. Tokens are consumed one per request and refilled
/// continuously at the effective rate, up to `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// # Arguments
    /// * `capacity` - Maximum burst size
    /// * `rate` - Tokens added per second
    pub fn new(capacity: u32, rate: f64) -> Self {
        Self {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
                effective_rate: rate,
                successes: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(state: &mut BucketState, capacity: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * state.effective_rate).min(f64::from(capacity));
            state.last_refill = now;
        }
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        Self::refill(&mut state, self.capacity);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available
    pub fn time_until_available(&self) -> Duration {
        let mut state = self.lock();
        Self::refill(&mut state, self.capacity);
        if state.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let deficit = 1.0 - state.tokens;
        if state.effective_rate > 0.0 {
            Duration::from_secs_f64(deficit / state.effective_rate)
        } else {
            Duration::MAX
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = self.lock();
        Self::refill(&mut state, self.capacity);
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Refill rate after throttling adjustments
    pub fn effective_rate(&self) -> f64 {
        self.lock().effective_rate
    }

    /// Record a successful request
    ///
    /// Every [`RECOVERY_STEP`] consecutive successes raise the effective rate
    /// by a quarter of the configured rate, up to the configured rate.
    pub fn on_success(&self) {
        let mut state = self.lock();
        state.successes += 1;
        if state.successes % RECOVERY_STEP == 0 && state.effective_rate < self.rate {
            let old = state.effective_rate;
            state.effective_rate = (old + self.rate * 0.25).min(self.rate);
            debug!(
                old_rate = old,
                new_rate = state.effective_rate,
                successes = state.successes,
                "Rate limiter recovering"
            );
        }
    }

    /// Record a throttle response: halve the rate and drain the bucket
    pub fn on_throttle(&self) {
        let mut state = self.lock();
        Self::refill(&mut state, self.capacity);
        let old = state.effective_rate;
        state.effective_rate = (old / 2.0).max(self.rate * MIN_RATE_FRACTION);
        state.tokens = 0.0;
        state.successes = 0;
        warn!(
            old_rate = old,
            new_rate = state.effective_rate,
            "Throttled by remote store, halving request rate"
        );
    }
}

/// Settings for [`RateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: f64,
    /// Requests allowed back to back after an idle period
    pub burst: u32,
}

impl Default for RateLimitConfig {
    /// The public Notion API averages three requests per second.
    fn default() -> Self {
        Self {
            requests_per_second: 3.0,
            burst: 3,
        }
    }
}

impl From<&RemoteConfig> for RateLimitConfig {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            requests_per_second: config.requests_per_second,
            burst: config.burst,
        }
    }
}

/// Async front end of a [`TokenBucket`], shared via `Arc`
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config.burst.max(1), config.requests_per_second),
        }
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) {
        loop {
            if self.bucket.try_acquire() {
                return;
            }
            let wait = self
                .bucket
                .time_until_available()
                .max(Duration::from_millis(10));
            debug!(wait_ms = wait.as_millis(), "No request tokens, waiting for refill");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self) {
        self.bucket.on_success();
    }

    pub fn on_throttle(&self) {
        self.bucket.on_throttle();
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }
}

/// Parse a `Retry-After` header value
///
/// Accepts delta-seconds (`"30"`) or an HTTP date. Dates in the past or more
/// than an hour away fall back to `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds);
    }
    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Duration::from_secs_f64(seconds);
        }
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = diff.to_std() {
            if wait <= Duration::from_secs(3600) {
                return wait;
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
