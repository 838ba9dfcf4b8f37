//! Circuit breaker (spec §4.7) wrapping executor API calls: opens after a
//! run of consecutive failures, half-opens after a recovery timeout,
//! closes on one success.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(5, Duration::from_secs(30))
    }

    /// Whether an API call may proceed right now. A `HalfOpen` breaker
    /// transitions from `Open` the first time this is called after the
    /// recovery timeout elapses, letting exactly one call through.
    pub fn allow(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => true,
            State::HalfOpen => true,
            State::Open => {
                let opened_at = inner.opened_at.expect("open state always has opened_at");
                if now.saturating_duration_since(opened_at) >= self.recovery_timeout {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(now);
                inner.consecutive_failures = self.failure_threshold;
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(now);
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        let now = Instant::now();
        for _ in 0..2 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.state(), State::Closed);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), State::Open);
        assert!(!breaker.allow(now));
    }

    #[test]
    fn half_opens_after_recovery_timeout_and_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let now = Instant::now();
        breaker.record_failure(now);
        assert_eq!(breaker.state(), State::Open);

        assert!(!breaker.allow(now + Duration::from_secs(10)));
        assert!(breaker.allow(now + Duration::from_secs(31)));
        assert_eq!(breaker.state(), State::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn failure_while_half_open_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let now = Instant::now();
        breaker.record_failure(now);
        assert!(breaker.allow(now + Duration::from_secs(31)));
        breaker.record_failure(now + Duration::from_secs(31));
        assert_eq!(breaker.state(), State::Open);
    }
}
