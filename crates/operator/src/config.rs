//! Config Store (spec §4.1): the single process-wide source of operator
//! policy. Readers take an atomic snapshot; writes are serialized and bump
//! a generation counter. Reconcile loops capture one snapshot per
//! iteration and use it for the whole pass.

use crate::error::{OperatorError, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Scaling aggressiveness preset. Selecting a mode seeds the four
/// threshold/multiplier groups; any field can still be overridden
/// explicitly in the same config object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Conservative,
    Balanced,
    Aggressive,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Balanced
    }
}

/// The full Config Store schema (spec §4.1 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSpec {
    pub mode: Mode,
    #[serde(with = "duration_secs")]
    pub resize_interval: Duration,

    pub cpu_scale_up_threshold: f64,
    pub cpu_scale_down_threshold: f64,
    pub memory_scale_up_threshold: f64,
    pub memory_scale_down_threshold: f64,

    pub cpu_request_multiplier: f64,
    pub memory_request_multiplier: f64,
    pub cpu_limit_multiplier: f64,
    pub memory_limit_multiplier: f64,

    pub min_cpu_request_millis: f64,
    pub min_memory_request_bytes: f64,
    pub max_cpu_limit_millis: f64,
    pub max_memory_limit_bytes: f64,

    pub min_change_pct: f64,
    pub scale_up_multiplier: f64,
    pub scale_down_multiplier: f64,

    pub dry_run: bool,
    pub update_resize_policy: bool,
    pub metrics_provider: MetricsProviderKind,

    pub namespace_include: HashSet<String>,
    pub namespace_exclude: HashSet<String>,

    pub confidence_threshold: f64,

    pub qps: f32,
    pub burst: u32,
    pub max_concurrent_reconciles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsProviderKind {
    ClusterMetricsApi,
    PrometheusBackend,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl ConfigSpec {
    /// Build defaults for a given mode. Conservative favors stability
    /// (wide band, slow damping); aggressive favors reclaiming waste
    /// quickly.
    pub fn for_mode(mode: Mode) -> Self {
        let (up, down, req_mult, lim_mult, scale_up, scale_down) = match mode {
            Mode::Conservative => (0.9, 0.2, 1.3, 2.0, 1.0, 0.5),
            Mode::Balanced => (0.8, 0.3, 1.2, 2.0, 1.0, 1.0),
            Mode::Aggressive => (0.7, 0.4, 1.1, 1.5, 1.5, 1.0),
        };

        Self {
            mode,
            resize_interval: Duration::from_secs(30),
            cpu_scale_up_threshold: up,
            cpu_scale_down_threshold: down,
            memory_scale_up_threshold: up,
            memory_scale_down_threshold: down,
            cpu_request_multiplier: req_mult,
            memory_request_multiplier: req_mult,
            cpu_limit_multiplier: lim_mult,
            memory_limit_multiplier: lim_mult,
            min_cpu_request_millis: 10.0,
            min_memory_request_bytes: 16.0 * 1024.0 * 1024.0,
            max_cpu_limit_millis: 64_000.0,
            max_memory_limit_bytes: 64.0 * 1024.0 * 1024.0 * 1024.0,
            min_change_pct: 0.10,
            scale_up_multiplier: scale_up,
            scale_down_multiplier: scale_down,
            dry_run: false,
            update_resize_policy: false,
            metrics_provider: MetricsProviderKind::ClusterMetricsApi,
            namespace_include: HashSet::new(),
            namespace_exclude: HashSet::new(),
            confidence_threshold: 0.6,
            qps: 20.0,
            burst: 30,
            max_concurrent_reconciles: 3,
        }
    }

    /// Reject configs that can never produce a sane resize (e.g. a request
    /// multiplier below 1.0 combined with an up-threshold above 1.0 would
    /// never justify the multiplier).
    pub fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();

        if self.cpu_request_multiplier < 1.0 && self.cpu_scale_up_threshold > 1.0 {
            fields.push("cpuRequestMultiplier".to_string());
        }
        if self.memory_request_multiplier < 1.0 && self.memory_scale_up_threshold > 1.0 {
            fields.push("memoryRequestMultiplier".to_string());
        }
        if !(0.0..=1.0).contains(&self.cpu_scale_down_threshold)
            || !(0.0..=1.0).contains(&self.memory_scale_down_threshold)
        {
            fields.push("scaleDownThreshold".to_string());
        }
        if self.cpu_scale_up_threshold <= self.cpu_scale_down_threshold {
            fields.push("cpuScaleUpThreshold<=cpuScaleDownThreshold".to_string());
        }
        if self.memory_scale_up_threshold <= self.memory_scale_down_threshold {
            fields.push("memoryScaleUpThreshold<=memoryScaleDownThreshold".to_string());
        }
        if self.max_cpu_limit_millis <= self.min_cpu_request_millis {
            fields.push("maxCPULimit<=minCPURequest".to_string());
        }
        if self.max_memory_limit_bytes <= self.min_memory_request_bytes {
            fields.push("maxMemoryLimit<=minMemoryRequest".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            fields.push("confidenceThreshold".to_string());
        }
        if self.max_concurrent_reconciles == 0 {
            fields.push("maxConcurrentReconciles".to_string());
        }
        for ns in self.namespace_include.intersection(&self.namespace_exclude) {
            fields.push(format!("namespace {ns} in both include and exclude"));
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(OperatorError::InvalidConfig {
                message: "configuration failed validation".to_string(),
                fields,
            })
        }
    }

    /// Namespace filter: exclude wins over include; an empty include set
    /// means "all namespaces not excluded".
    pub fn namespace_allowed(&self, namespace: &str) -> bool {
        if self.namespace_exclude.contains(namespace) {
            return false;
        }
        self.namespace_include.is_empty() || self.namespace_include.contains(namespace)
    }
}

impl Default for ConfigSpec {
    fn default() -> Self {
        Self::for_mode(Mode::default())
    }
}

/// A versioned, atomically-readable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub spec: Arc<ConfigSpec>,
    pub generation: u64,
}

/// Single-writer, many-reader configuration store (§4.1, §5 "Shared
/// resources"). Invalid writes are rejected and the previous snapshot is
/// retained.
pub struct ConfigStore {
    current: ArcSwap<Snapshot>,
    generation: AtomicU64,
}

impl ConfigStore {
    pub fn new(initial: ConfigSpec) -> Result<Self> {
        initial.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(Snapshot {
                spec: Arc::new(initial),
                generation: 0,
            }),
            generation: AtomicU64::new(0),
        })
    }

    /// An atomic, immutable view of the current configuration.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Validate and, if valid, install `next` as the new current
    /// configuration, bumping the generation counter. On failure the prior
    /// snapshot is retained and a categorized error is returned.
    pub fn try_update(&self, next: ConfigSpec) -> Result<u64> {
        if let Err(e) = next.validate() {
            warn!(error = %e, "rejected invalid configuration write, retaining prior snapshot");
            return Err(e);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.store(Arc::new(Snapshot {
            spec: Arc::new(next),
            generation,
        }));
        info!(generation, "configuration updated");
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_contradictory_multiplier_and_threshold() {
        let mut spec = ConfigSpec::default();
        spec.cpu_request_multiplier = 0.5;
        spec.cpu_scale_up_threshold = 1.5;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn invalid_write_retains_previous_snapshot() {
        let store = ConfigStore::new(ConfigSpec::default()).unwrap();
        let before = store.snapshot();

        let mut bad = ConfigSpec::default();
        bad.max_concurrent_reconciles = 0;
        assert!(store.try_update(bad).is_err());

        let after = store.snapshot();
        assert_eq!(before.generation, after.generation);
    }

    #[test]
    fn valid_write_bumps_generation() {
        let store = ConfigStore::new(ConfigSpec::default()).unwrap();
        let mut next = ConfigSpec::default();
        next.dry_run = true;
        let generation = store.try_update(next).unwrap();
        assert_eq!(generation, 1);
        assert!(store.snapshot().spec.dry_run);
    }

    #[test]
    fn namespace_exclude_wins_over_include() {
        let mut spec = ConfigSpec::default();
        spec.namespace_include.insert("team-a".to_string());
        assert!(spec.namespace_allowed("team-a"));
        assert!(!spec.namespace_allowed("team-b"));

        spec.namespace_exclude.insert("team-a".to_string());
        assert!(spec.validate().is_err());
    }
}
