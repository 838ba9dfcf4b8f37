//! Prometheus metric registry. Scraping it over HTTP is a collaborator's
//! job (out of core scope); this module only owns the registry and an
//! encode-to-text call.

use prometheus::{CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};

/// All counters/gauges the sizing pipeline publishes.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    /// Decisions computed, labeled by `dimension` (cpu/memory) and
    /// `decision` (none/up/down).
    pub decisions_total: CounterVec,
    /// Container resizes suppressed by the memory-only-downscale rule.
    pub suppressed_total: prometheus::Counter,
    /// Validation failures, labeled by `category`
    /// (infeasible/invalid/out_of_policy).
    pub validation_failures_total: CounterVec,
    /// Deferrals from the rate limiter, labeled by `scope`
    /// (cooldown/workload/namespace/global).
    pub rate_limited_total: CounterVec,
    /// Resize attempts, labeled by `outcome`
    /// (applied/deferred/failed/dry_run).
    pub resize_outcomes_total: CounterVec,
    /// Circuit breaker state: 0 = closed, 1 = half-open, 2 = open.
    pub circuit_breaker_state: Gauge,
    /// Reconcile wall-clock duration, labeled by `controller`.
    pub reconcile_duration_seconds: HistogramVec,
    /// In-flight reconciles, labeled by `controller`.
    pub active_reconciles: GaugeVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let decisions_total = CounterVec::new(
            Opts::new("rightsizer_decisions_total", "Scaling decisions computed"),
            &["dimension", "decision"],
        )
        .expect("valid metric opts");
        let suppressed_total = prometheus::Counter::new(
            "rightsizer_suppressed_total",
            "Resizes suppressed by the memory-only-downscale rule",
        )
        .expect("valid metric opts");
        let validation_failures_total = CounterVec::new(
            Opts::new(
                "rightsizer_validation_failures_total",
                "Validation failures by category",
            ),
            &["category"],
        )
        .expect("valid metric opts");
        let rate_limited_total = CounterVec::new(
            Opts::new("rightsizer_rate_limited_total", "Deferrals from the rate limiter"),
            &["scope"],
        )
        .expect("valid metric opts");
        let resize_outcomes_total = CounterVec::new(
            Opts::new("rightsizer_resize_outcomes_total", "Resize attempt outcomes"),
            &["outcome"],
        )
        .expect("valid metric opts");
        let circuit_breaker_state = Gauge::new(
            "rightsizer_circuit_breaker_state",
            "0=closed 1=half-open 2=open",
        )
        .expect("valid metric opts");
        let reconcile_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "rightsizer_reconcile_duration_seconds",
                "Reconcile wall-clock duration",
            ),
            &["controller"],
        )
        .expect("valid metric opts");
        let active_reconciles = GaugeVec::new(
            Opts::new("rightsizer_active_reconciles", "In-flight reconciles"),
            &["controller"],
        )
        .expect("valid metric opts");

        registry.register(Box::new(decisions_total.clone())).ok();
        registry.register(Box::new(suppressed_total.clone())).ok();
        registry
            .register(Box::new(validation_failures_total.clone()))
            .ok();
        registry.register(Box::new(rate_limited_total.clone())).ok();
        registry
            .register(Box::new(resize_outcomes_total.clone()))
            .ok();
        registry
            .register(Box::new(circuit_breaker_state.clone()))
            .ok();
        registry
            .register(Box::new(reconcile_duration_seconds.clone()))
            .ok();
        registry.register(Box::new(active_reconciles.clone())).ok();

        Self {
            registry,
            decisions_total,
            suppressed_total,
            validation_failures_total,
            rate_limited_total,
            resize_outcomes_total,
            circuit_breaker_state,
            reconcile_duration_seconds,
            active_reconciles,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = MetricsRegistry::new();
        metrics
            .decisions_total
            .with_label_values(&["cpu", "up"])
            .inc();
        let text = metrics.encode();
        assert!(text.contains("rightsizer_decisions_total"));
    }
}
