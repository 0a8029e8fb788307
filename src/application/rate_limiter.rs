//! Minimum-spacing limiter for outbound model calls.
//!
//! Each provider has a fixed minimum interval between calls. A caller reserves
//! the next free slot inside one critical section and then sleeps outside it,
//! so concurrent callers for the same provider serialize in the order they
//! reach the lock while other providers never contend. There is no upper bound
//! on the wait.

use crate::domain::ports::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    intervals: HashMap<String, Duration>,
    last_call: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            intervals: HashMap::new(),
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Set the minimum spacing for `provider`. Providers without an interval
    /// are never delayed.
    pub fn with_interval(mut self, provider: impl Into<String>, interval: Duration) -> Self {
        self.intervals.insert(provider.into(), interval);
        self
    }

    pub fn interval(&self, provider: &str) -> Duration {
        self.intervals.get(provider).copied().unwrap_or(Duration::ZERO)
    }

    /// Block until `provider` may be called again and return how long we waited.
    pub async fn await_turn(&self, provider: &str) -> Duration {
        let wait = self.reserve(provider);
        if !wait.is_zero() {
            tracing::info!(
                provider,
                wait_secs = wait.as_secs_f64(),
                "waiting for model rate-limit slot"
            );
            self.clock.sleep(wait).await;
        }
        wait
    }

    /// Timestamp of the most recently granted slot.
    pub fn last_call(&self, provider: &str) -> Option<DateTime<Utc>> {
        self.lock().get(provider).copied()
    }

    fn reserve(&self, provider: &str) -> Duration {
        let interval = chrono::Duration::from_std(self.interval(provider))
            .unwrap_or_else(|_| chrono::Duration::zero());
        let mut last = self.lock();
        let now = self.clock.now();
        let slot = match last.get(provider) {
            Some(prev) => (*prev + interval).max(now),
            None => now,
        };
        last.insert(provider.to_string(), slot);
        (slot - now).to_std().unwrap_or(Duration::ZERO)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // The map holds plain timestamps; a panic elsewhere cannot leave it torn.
        self.last_call.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use chrono::TimeZone;

    const GAP: Duration = Duration::from_secs(20);

    fn setup() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(clock.clone()).with_interval("gemini", GAP);
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let (_, limiter) = setup();
        assert_eq!(limiter.await_turn("gemini").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_back_to_back_calls_are_spaced() {
        let (clock, limiter) = setup();
        let start = clock.now();
        limiter.await_turn("gemini").await;
        let waited = limiter.await_turn("gemini").await;
        assert_eq!(waited, GAP);
        assert_eq!(clock.now() - start, chrono::Duration::seconds(20));
        assert_eq!(limiter.last_call("gemini"), Some(start + chrono::Duration::seconds(20)));
    }

    #[tokio::test]
    async fn test_partial_wait_after_some_time_passed() {
        let (clock, limiter) = setup();
        limiter.await_turn("gemini").await;
        clock.advance(Duration::from_secs(15));
        assert_eq!(limiter.await_turn("gemini").await, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_elapsed() {
        let (clock, limiter) = setup();
        limiter.await_turn("gemini").await;
        clock.advance(Duration::from_secs(21));
        assert_eq!(limiter.await_turn("gemini").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_providers_are_independent() {
        let (clock, limiter) = setup();
        let limiter = limiter.with_interval("claude", GAP);
        limiter.await_turn("gemini").await;
        assert_eq!(limiter.await_turn("claude").await, Duration::ZERO);
        assert_eq!(limiter.await_turn("unlisted").await, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_callers_serialize() {
        let (clock, limiter) = setup();
        let start = clock.now();
        let (a, b) = tokio::join!(limiter.await_turn("gemini"), limiter.await_turn("gemini"));
        let mut waits = vec![a, b];
        waits.sort();
        assert_eq!(waits, vec![Duration::ZERO, GAP]);
        assert_eq!(limiter.last_call("gemini"), Some(start + chrono::Duration::seconds(20)));
    }

    #[tokio::test]
    async fn test_sequential_calls_never_closer_than_interval() {
        let (clock, limiter) = setup();
        let mut granted = Vec::new();
        for _ in 0..4 {
            limiter.await_turn("gemini").await;
            granted.push(clock.now());
        }
        for pair in granted.windows(2) {
            assert!(pair[1] - pair[0] >= chrono::Duration::seconds(20));
        }
    }
}
