//! Per-client token bucket rate limiting.
//!
//! Each client gets a bucket holding `rate_per_minute` tokens, refilled one
//! token every `60s / rate_per_minute`. Buckets are created on first use and
//! live as long as the registry.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::config::{DEFAULT_RATE_PER_MINUTE, positive_rate};

const REFILL_WINDOW: Duration = Duration::from_secs(60);

/// A single client's bucket.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket for `rate_per_minute` requests per minute.
    pub fn new(rate_per_minute: u32) -> Self {
        let capacity = rate_per_minute.max(1);
        Self {
            capacity,
            tokens: capacity,
            refill_interval: REFILL_WINDOW / capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill from elapsed time, then take a token if one is available.
    pub fn try_acquire(&mut self) -> bool {
        let elapsed = Instant::now().saturating_duration_since(self.last_refill);
        let steps = elapsed.as_nanos() / self.refill_interval.as_nanos();

        if steps > 0 {
            let added = u32::try_from(steps).unwrap_or(u32::MAX);
            self.tokens = self.tokens.saturating_add(added).min(self.capacity);
            // Advance by whole steps only so the remainder carries over
            self.last_refill += self.refill_interval * added;
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }
}

/// Registry of token buckets keyed by client id.
///
/// The map lock is held only to find or create a bucket; the token
/// arithmetic runs under the bucket's own lock.
pub struct RateLimiterRegistry {
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    default_rate: u32,
}

impl RateLimiterRegistry {
    pub fn new(default_rate: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            default_rate: if default_rate > 0 {
                default_rate
            } else {
                DEFAULT_RATE_PER_MINUTE
            },
        }
    }

    /// Admit or deny one request for `client_id`.
    ///
    /// `rate_per_minute` sizes the bucket when it is first created; values
    /// of zero or below fall back to the registry default. Later calls reuse
    /// the existing bucket whatever rate they pass.
    pub fn allow(&self, client_id: &str, rate_per_minute: i64) -> bool {
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            match buckets.get(client_id) {
                Some(bucket) => Arc::clone(bucket),
                None => {
                    let rate = positive_rate(rate_per_minute).unwrap_or(self.default_rate);
                    tracing::debug!(client_id, rate, "Creating rate limit bucket");
                    let bucket = Arc::new(Mutex::new(TokenBucket::new(rate)));
                    buckets.insert(client_id.to_string(), Arc::clone(&bucket));
                    bucket
                }
            }
        };

        bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire()
    }

    /// Number of clients with a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
