//! Rate Limiter (spec §4.6, second half): cooldown, per-workload window,
//! per-namespace concurrency, and a global reconcile ceiling, checked in
//! that order. A rate-limited resize is deferred, never dropped.

use crate::error::{OperatorError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct RateLimiterConfig {
    pub cooldown: Duration,
    pub per_workload_window: Duration,
    pub per_workload_max: usize,
    pub per_namespace_max_concurrent: usize,
    pub max_concurrent_reconciles: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5 * 60),
            per_workload_window: Duration::from_secs(60 * 60),
            per_workload_max: 3,
            per_namespace_max_concurrent: usize::MAX,
            max_concurrent_reconciles: 3,
        }
    }
}

#[derive(Default)]
struct WorkloadState {
    last_resize: Option<Instant>,
    recent_resizes: Vec<Instant>,
}

/// Per-container cooldown, per-workload hourly cap, per-namespace
/// concurrency, and a global concurrent-reconcile ceiling.
pub struct RateLimiter {
    config: RateLimiterConfig,
    containers: Mutex<HashMap<String, Instant>>,
    workloads: Mutex<HashMap<String, WorkloadState>>,
    namespace_in_flight: Mutex<HashMap<String, usize>>,
    global_in_flight: Mutex<usize>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            containers: Mutex::new(HashMap::new()),
            workloads: Mutex::new(HashMap::new()),
            namespace_in_flight: Mutex::new(HashMap::new()),
            global_in_flight: Mutex::new(0),
        }
    }

    /// Check all four ceilings in order, without admitting. Callers that
    /// get `Ok(())` must call `admit`/`release` around the actual work to
    /// keep concurrency counters accurate.
    pub fn check(
        &self,
        container_key: &str,
        workload_key: &str,
        namespace: &str,
        now: Instant,
    ) -> Result<()> {
        if let Some(last) = self.containers.lock().get(container_key).copied() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.cooldown {
                return Err(OperatorError::RateLimited {
                    scope: format!("container cooldown {container_key}"),
                    retry_after: self.config.cooldown - elapsed,
                });
            }
        }

        {
            let mut workloads = self.workloads.lock();
            let state = workloads.entry(workload_key.to_string()).or_default();
            state
                .recent_resizes
                .retain(|t| now.saturating_duration_since(*t) < self.config.per_workload_window);
            if state.recent_resizes.len() >= self.config.per_workload_max {
                let oldest = *state.recent_resizes.iter().min().unwrap();
                let retry_after = self.config.per_workload_window
                    - now.saturating_duration_since(oldest);
                return Err(OperatorError::RateLimited {
                    scope: format!("workload window {workload_key}"),
                    retry_after,
                });
            }
        }

        {
            let in_flight = self
                .namespace_in_flight
                .lock()
                .get(namespace)
                .copied()
                .unwrap_or(0);
            if in_flight >= self.config.per_namespace_max_concurrent {
                return Err(OperatorError::RateLimited {
                    scope: format!("namespace concurrency {namespace}"),
                    retry_after: Duration::from_secs(30),
                });
            }
        }

        {
            let global = *self.global_in_flight.lock();
            if global >= self.config.max_concurrent_reconciles {
                return Err(OperatorError::RateLimited {
                    scope: "global maxConcurrentReconciles".to_string(),
                    retry_after: Duration::from_secs(5),
                });
            }
        }

        Ok(())
    }

    /// Reserve a concurrency slot for `namespace`; call `release` when the
    /// resize reaches a terminal state.
    pub fn admit(&self, namespace: &str) {
        *self.namespace_in_flight.lock().entry(namespace.to_string()).or_insert(0) += 1;
        *self.global_in_flight.lock() += 1;
    }

    pub fn release(&self, namespace: &str) {
        if let Some(count) = self.namespace_in_flight.lock().get_mut(namespace) {
            *count = count.saturating_sub(1);
        }
        let mut global = self.global_in_flight.lock();
        *global = global.saturating_sub(1);
    }

    /// Record a completed resize so future cooldown/window checks see it.
    pub fn record_resize(&self, container_key: &str, workload_key: &str, now: Instant) {
        self.containers.lock().insert(container_key.to_string(), now);
        self.workloads
            .lock()
            .entry(workload_key.to_string())
            .or_default()
            .recent_resizes
            .push(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_blocks_back_to_back_resizes() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            cooldown: Duration::from_secs(300),
            ..RateLimiterConfig::default()
        });
        let now = Instant::now();
        limiter.record_resize("ns/pod/c", "ns/pod", now);
        let result = limiter.check("ns/pod/c", "ns/pod", "ns", now + Duration::from_secs(10));
        assert!(result.is_err());
    }

    #[test]
    fn per_workload_window_caps_at_configured_max() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            cooldown: Duration::from_secs(0),
            per_workload_max: 3,
            per_workload_window: Duration::from_secs(3600),
            ..RateLimiterConfig::default()
        });
        let base = Instant::now();
        for i in 0..3 {
            let t = base + Duration::from_secs(i * 10);
            limiter.record_resize(&format!("ns/pod/c{i}"), "ns/pod", t);
        }
        let result = limiter.check("ns/pod/c4", "ns/pod", "ns", base + Duration::from_secs(40));
        assert!(result.is_err());
    }

    #[test]
    fn global_ceiling_blocks_when_saturated() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            cooldown: Duration::from_secs(0),
            per_workload_max: 100,
            max_concurrent_reconciles: 1,
            ..RateLimiterConfig::default()
        });
        limiter.admit("ns");
        let result = limiter.check("ns/pod/c", "ns/pod", "ns", Instant::now());
        assert!(result.is_err());
        limiter.release("ns");
        let result = limiter.check("ns/pod/c", "ns/pod", "ns", Instant::now());
        assert!(result.is_ok());
    }
}
