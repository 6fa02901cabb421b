//! Rate Governor - per-provider token buckets
//!
//! One bucket per provider identity, shared by every concurrent caller:
//! - Capacity equals the configured requests per minute
//! - Tokens refill continuously at `rate / 60` per second
//! - `acquire` polls until a token is available (no queue, no fairness)

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Delay between token checks while waiting
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Rate limiter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernorError {
    #[error("Rate limiter '{0}' not registered")]
    NotRegistered(String),
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Continuously refilled token bucket
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Full bucket holding `rate_per_minute` tokens
    pub fn new(rate_per_minute: u32) -> Self {
        let capacity = f64::from(rate_per_minute);
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// Refill for elapsed time, then take one token if available.
    ///
    /// Refill and consume happen under one lock so concurrent callers never
    /// apply the same elapsed interval twice.
    pub fn try_consume(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();

        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, including pending refill
    pub fn available(&self) -> f64 {
        let state = self.state.lock();
        let elapsed = Instant::now()
            .saturating_duration_since(state.last_refill)
            .as_secs_f64();
        (state.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }

    /// Wait until a token is available, then consume it
    pub async fn wait_for_token(&self) {
        while !self.try_consume() {
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Process-wide registry of provider rate limiters
#[derive(Debug, Default)]
pub struct RateGovernor {
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl RateGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the bucket for a provider
    pub fn register(&self, name: &str, rate_per_minute: u32) {
        let rate = if rate_per_minute == 0 {
            warn!("Rate limit for {} must be positive, using 1/min", name);
            1
        } else {
            rate_per_minute
        };

        debug!("Registered rate limiter {} at {}/min", name, rate);
        self.buckets
            .insert(name.to_string(), Arc::new(TokenBucket::new(rate)));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn bucket(&self, name: &str) -> Result<Arc<TokenBucket>, GovernorError> {
        self.buckets
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GovernorError::NotRegistered(name.to_string()))
    }

    /// Block until the provider's bucket yields a token
    pub async fn acquire(&self, name: &str) -> Result<(), GovernorError> {
        // Clone the handle so no map guard is held across the wait
        let bucket = self.bucket(name)?;

        if bucket.try_consume() {
            return Ok(());
        }

        let started = Instant::now();
        debug!("Rate limit reached for {}, waiting for token", name);
        bucket.wait_for_token().await;
        debug!("Token for {} after {:?}", name, started.elapsed());
        Ok(())
    }

    /// Single non-blocking attempt
    pub fn try_acquire(&self, name: &str) -> Result<bool, GovernorError> {
        Ok(self.bucket(name)?.try_consume())
    }

    pub fn available(&self, name: &str) -> Result<f64, GovernorError> {
        Ok(self.bucket(name)?.available())
    }
}
