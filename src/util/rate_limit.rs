//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Spectator message rate limit
pub const SPECTATOR_RATE_LIMIT: u32 = 10; // Max 10 client messages per second

/// Per-spectator rate limiter state
#[derive(Clone)]
pub struct SpectatorRateLimiter {
    message_limiter: Arc<Limiter>,
}

impl SpectatorRateLimiter {
    pub fn new() -> Self {
        Self {
            message_limiter: create_limiter(SPECTATOR_RATE_LIMIT),
        }
    }

    /// Check if a client message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }
}

impl Default for SpectatorRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
