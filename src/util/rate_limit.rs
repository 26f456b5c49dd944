//! Per-connection inbound throttling

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Inputs arrive at 20 Hz plus a ping every 2 s; the rest is burst headroom
pub const MESSAGE_RATE_LIMIT: u32 = 40;
/// Joins create rooms, so they get a much tighter budget
pub const JOIN_RATE_LIMIT: u32 = 2;

fn per_second(n: u32) -> Limiter {
    RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN),
    ))
}

/// Owned by one connection's reader loop
pub struct ConnectionRateLimiter {
    messages: Limiter,
    joins: Limiter,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MESSAGE_RATE_LIMIT, JOIN_RATE_LIMIT)
    }

    pub fn with_limits(messages_per_second: u32, joins_per_second: u32) -> Self {
        Self {
            messages: per_second(messages_per_second),
            joins: per_second(joins_per_second),
        }
    }

    /// Any inbound text frame
    pub fn check_message(&self) -> bool {
        self.messages.check().is_ok()
    }

    /// A join request, on top of `check_message`
    pub fn check_join(&self) -> bool {
        self.joins.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_capped() {
        let limiter = ConnectionRateLimiter::new();
        let allowed = (0..MESSAGE_RATE_LIMIT * 2)
            .filter(|_| limiter.check_message())
            .count();
        assert!(allowed >= 1);
        assert!(allowed <= MESSAGE_RATE_LIMIT as usize);
    }

    #[test]
    fn joins_have_their_own_budget() {
        let limiter = ConnectionRateLimiter::with_limits(100, 1);
        assert!(limiter.check_join());
        assert!(!limiter.check_join());
        assert!(limiter.check_message());
    }

    #[test]
    fn zero_means_one() {
        let limiter = ConnectionRateLimiter::with_limits(0, 0);
        assert!(limiter.check_message());
        assert!(!limiter.check_message());
    }
}
