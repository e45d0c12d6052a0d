//! Request rate limiting for copy and verification calls.
//!
//! Token bucket over storage requests rather than bytes: server-side copies
//! never move object bytes through this process.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Shared request limiter. Cloning shares the same bucket.
#[derive(Clone, Default)]
pub struct RequestLimiter {
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    per_second: u32,
}

impl RequestLimiter {
    /// `per_second == 0` disables limiting.
    pub fn new(per_second: u32) -> Self {
        let limiter = NonZeroU32::new(per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self { limiter, per_second }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Wait for one request slot. No-op when unlimited.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Take a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    pub fn display(&self) -> String {
        if self.is_limited() {
            format!("{} req/s", self.per_second)
        } else {
            "unlimited".to_string()
        }
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("per_second", &self.per_second)
            .finish()
    }
}
