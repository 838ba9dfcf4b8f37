//! Core data model (spec §3): resource requirements, QoS class derivation,
//! samples, scaling decisions, recommendations, and audit records.

use crate::identity::ContainerIdentity;
use chrono::{DateTime, Utc};
use rightsizer_common::ResourceQuantity;
use serde::{Deserialize, Serialize};

/// CPU/memory requests and limits for one container. Absence of a field is
/// semantically distinct from zero (e.g. a BestEffort container has no
/// request at all, not a zero request).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_request: Option<ResourceQuantity>,
    pub memory_request: Option<ResourceQuantity>,
    pub cpu_limit: Option<ResourceQuantity>,
    pub memory_limit: Option<ResourceQuantity>,
}

impl ResourceRequirements {
    /// `limit >= request` for each dimension where both are present.
    pub fn respects_limit_ge_request(&self) -> bool {
        let cpu_ok = match (&self.cpu_request, &self.cpu_limit) {
            (Some(req), Some(lim)) => lim.base_units() >= req.base_units(),
            _ => true,
        };
        let mem_ok = match (&self.memory_request, &self.memory_limit) {
            (Some(req), Some(lim)) => lim.base_units() >= req.base_units(),
            _ => true,
        };
        cpu_ok && mem_ok
    }

    fn declares_any(&self) -> bool {
        self.cpu_request.is_some()
            || self.memory_request.is_some()
            || self.cpu_limit.is_some()
            || self.memory_limit.is_some()
    }

    /// Every dimension has both a request and a limit, and they're equal.
    fn is_guaranteed(&self) -> bool {
        let cpu = matches!(
            (&self.cpu_request, &self.cpu_limit),
            (Some(r), Some(l)) if r.base_units() == l.base_units()
        );
        let mem = matches!(
            (&self.memory_request, &self.memory_limit),
            (Some(r), Some(l)) if r.base_units() == l.base_units()
        );
        cpu && mem
    }
}

/// Derived pod scheduling class. Resizes MUST NOT change a pod's QoSClass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QoSClass {
    Guaranteed,
    Burstable,
    BestEffort,
}

/// Derive the QoS class of a pod from all of its containers' resource
/// requirements (spec §3).
pub fn derive_qos_class(containers: &[ResourceRequirements]) -> QoSClass {
    if containers.is_empty() || containers.iter().all(|c| !c.declares_any()) {
        return QoSClass::BestEffort;
    }
    if containers.iter().all(|c| c.is_guaranteed()) {
        return QoSClass::Guaranteed;
    }
    QoSClass::Burstable
}

/// A single usage observation for one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub identity: ContainerIdentity,
    pub cpu_millicores: f64,
    pub memory_bytes: f64,
}

/// Per-resource scaling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    None,
    Up,
    Down,
}

/// Combined CPU + memory decision for one container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContainerDecision {
    pub cpu: Decision,
    pub memory: Decision,
}

impl ContainerDecision {
    pub fn none() -> Self {
        Self {
            cpu: Decision::None,
            memory: Decision::None,
        }
    }

    /// Memory-only downscales are suppressed: the risk of a resize isn't
    /// justified when CPU isn't also moving (spec §4.5, testable invariant).
    pub fn is_suppressed(&self) -> bool {
        matches!(self.cpu, Decision::None) && matches!(self.memory, Decision::Down)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.cpu, Decision::None) && matches!(self.memory, Decision::None)
    }
}

/// Which resource axis a sample, decision, or prediction concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Cpu,
    Memory,
}

/// Lower/upper bound plus the confidence level they were computed at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub pct: f64,
}

/// A forecast for one container, one dimension, at one horizon. Produced
/// by a predictor; filtered out by the Engine when
/// `confidence < confidenceThreshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub identity: ContainerIdentity,
    pub dimension: Dimension,
    pub value: f64,
    pub horizon: chrono::Duration,
    pub confidence: f64,
    pub interval: Interval,
    pub method: String,
    pub generated_at: DateTime<Utc>,
}

/// Priority tier for a `Recommendation`, used to order deferred retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityTier {
    /// One step up, capped at `Critical`. Used to boost a recommendation's
    /// priority each time its resize gets deferred and rescheduled, so a
    /// repeatedly-deferred container doesn't starve behind fresh ones.
    pub fn escalate(self) -> Self {
        match self {
            PriorityTier::Low => PriorityTier::Medium,
            PriorityTier::Medium => PriorityTier::High,
            PriorityTier::High | PriorityTier::Critical => PriorityTier::Critical,
        }
    }
}

/// A durable record of a computed decision: inputs, target, savings, and an
/// expiration after which it's discarded unapplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub identity: ContainerIdentity,
    pub decision: ContainerDecision,
    pub current: ResourceRequirements,
    pub target: ResourceRequirements,
    pub savings_pct: Option<f64>,
    pub confidence: Option<f64>,
    pub priority: PriorityTier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Terminal outcome of a resize attempt, recorded in the audit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Applied,
    Deferred,
    Failed,
    DryRun,
}

/// Append-only record describing one resize attempt (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub identity: ContainerIdentity,
    pub old: ResourceRequirements,
    pub new: ResourceRequirements,
    pub rationale: String,
    pub outcome: AuditOutcome,
    pub error_category: Option<String>,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: f64) -> ResourceQuantity {
        ResourceQuantity::cpu_millis(v)
    }

    #[test]
    fn guaranteed_requires_all_containers_equal_request_and_limit() {
        let c = ResourceRequirements {
            cpu_request: Some(q(200.0)),
            cpu_limit: Some(q(200.0)),
            memory_request: Some(ResourceQuantity::memory_bytes(100.0)),
            memory_limit: Some(ResourceQuantity::memory_bytes(100.0)),
        };
        assert_eq!(derive_qos_class(&[c]), QoSClass::Guaranteed);
    }

    #[test]
    fn best_effort_requires_no_container_declares_anything() {
        let c = ResourceRequirements::default();
        assert_eq!(derive_qos_class(&[c]), QoSClass::BestEffort);
    }

    #[test]
    fn burstable_otherwise() {
        let c = ResourceRequirements {
            cpu_request: Some(q(100.0)),
            cpu_limit: Some(q(200.0)),
            ..Default::default()
        };
        assert_eq!(derive_qos_class(&[c]), QoSClass::Burstable);
    }

    #[test]
    fn memory_only_downscale_is_suppressed() {
        let d = ContainerDecision {
            cpu: Decision::None,
            memory: Decision::Down,
        };
        assert!(d.is_suppressed());

        let d = ContainerDecision {
            cpu: Decision::Down,
            memory: Decision::Down,
        };
        assert!(!d.is_suppressed());
    }
}
