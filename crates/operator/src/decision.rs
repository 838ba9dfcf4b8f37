//! Decision Engine (spec §4.5): per-container, per-dimension scaling
//! decisions plus the durable `Recommendation` each non-suppressed
//! decision produces.

use crate::config::ConfigSpec;
use crate::identity::ContainerIdentity;
use crate::model::{
    ContainerDecision, Decision, Dimension, PriorityTier, Recommendation, ResourceRequirements,
};
use chrono::{Duration, Utc};
use rightsizer_common::ResourceQuantity;

/// Everything the engine needs for one container beyond the resolved
/// config: its current declared resources and the latest usage sample.
pub struct DecisionInput<'a> {
    pub identity: &'a ContainerIdentity,
    pub current: &'a ResourceRequirements,
    pub cpu_usage_millis: f64,
    pub memory_usage_bytes: f64,
    pub cpu_prediction: Option<&'a crate::model::Prediction>,
    pub memory_prediction: Option<&'a crate::model::Prediction>,
}

/// Audit-visible reason a dimension ended up `none`, distinct from
/// "never crossed a threshold" — needed so the audit trail can explain a
/// minChangePct demotion rather than silently reporting no decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemotionReason {
    NotApplicable,
    BelowMinChangePct,
}

pub struct DimensionOutcome {
    pub decision: Decision,
    pub target: Option<ResourceQuantity>,
    pub demotion: DemotionReason,
}

/// Outcome for one container: combined decision, target resources (if
/// anything changed), and an optional recommendation.
pub struct EngineOutcome {
    pub decision: ContainerDecision,
    pub target: ResourceRequirements,
    pub recommendation: Option<Recommendation>,
    pub cpu_demotion: DemotionReason,
    pub memory_demotion: DemotionReason,
    /// Set when the combined decision hit the memory-only-downscale
    /// suppression rule. `decision` is reset to `none()` in that case, so
    /// callers needing to tell "suppressed" apart from "nothing crossed a
    /// threshold" for audit purposes must consult this flag rather than
    /// `decision.is_suppressed()`, which can never be true on the reset
    /// value.
    pub suppressed: bool,
}

fn utilization(usage: f64, limit: Option<&ResourceQuantity>) -> Option<f64> {
    limit.map(|l| {
        if l.base_units() <= 0.0 {
            f64::INFINITY
        } else {
            usage / l.base_units()
        }
    })
}

fn threshold_decision(utilization: Option<f64>, up: f64, down: f64) -> Decision {
    match utilization {
        None => Decision::None,
        Some(u) if u >= up => Decision::Up,
        Some(u) if u <= down => Decision::Down,
        _ => Decision::None,
    }
}

/// Compute the raw (undamped) target request for one dimension.
fn raw_target(
    usage: f64,
    request_multiplier: f64,
    limit_multiplier: f64,
    min_request: f64,
    max_limit: f64,
) -> f64 {
    let max_request = if limit_multiplier > 0.0 {
        max_limit / limit_multiplier
    } else {
        max_limit
    };
    (usage * request_multiplier).clamp(min_request, max_request.max(min_request))
}

fn damp(current: f64, target: f64, decision: Decision, up_mult: f64, down_mult: f64) -> f64 {
    let factor = match decision {
        Decision::Up => up_mult,
        Decision::Down => down_mult,
        Decision::None => return current,
    };
    current + factor * (target - current)
}

fn change_pct(current: f64, applied: f64) -> f64 {
    if current.abs() < f64::EPSILON {
        if applied.abs() < f64::EPSILON {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((applied - current) / current).abs()
    }
}

/// Run the per-dimension algorithm for CPU or memory.
fn decide_dimension(
    usage: f64,
    current_request: Option<&ResourceQuantity>,
    current_limit: Option<&ResourceQuantity>,
    prediction: Option<&crate::model::Prediction>,
    config: &ConfigSpec,
    up_threshold: f64,
    down_threshold: f64,
    request_multiplier: f64,
    limit_multiplier: f64,
    min_request: f64,
    max_limit: f64,
) -> DimensionOutcome {
    let util = utilization(usage, current_limit);
    let mut decision = threshold_decision(util, up_threshold, down_threshold);

    if matches!(decision, Decision::None) {
        return DimensionOutcome {
            decision: Decision::None,
            target: None,
            demotion: DemotionReason::NotApplicable,
        };
    }

    let current = current_request.map(|q| q.base_units()).unwrap_or(0.0);
    let mut target =
        raw_target(usage, request_multiplier, limit_multiplier, min_request, max_limit);

    if let Some(pred) = prediction {
        if pred.confidence >= config.confidence_threshold {
            let predicted_target = pred.value * request_multiplier;
            target = target.max(predicted_target).min(pred.interval.upper);
        }
    }

    let mut applied = damp(
        current,
        target,
        decision,
        config.scale_up_multiplier,
        config.scale_down_multiplier,
    );

    let mut demotion = DemotionReason::NotApplicable;
    if change_pct(current, applied) < config.min_change_pct {
        decision = Decision::None;
        applied = current;
        demotion = DemotionReason::BelowMinChangePct;
    }

    DimensionOutcome {
        decision,
        target: if matches!(decision, Decision::None) {
            None
        } else {
            Some(if current_request.map(|q| q.unit())
                == Some(rightsizer_common::UnitClass::Memory)
            {
                ResourceQuantity::memory_bytes(applied)
            } else {
                ResourceQuantity::cpu_millis(applied)
            }),
        },
        demotion,
    }
}

fn priority_tier(utilization: Option<f64>, up_threshold: f64, decision: Decision) -> PriorityTier {
    if matches!(decision, Decision::None) {
        return PriorityTier::Low;
    }
    match utilization {
        Some(u) if u > 0.95 => PriorityTier::Critical,
        Some(u) if u > up_threshold + 0.1 => PriorityTier::High,
        Some(_) => PriorityTier::Medium,
        None => PriorityTier::Low,
    }
}

pub struct DecisionEngine;

impl DecisionEngine {
    /// Run the full per-container decision, producing a combined
    /// `ContainerDecision`, target resources, and (if not suppressed) a
    /// `Recommendation`.
    pub fn decide(config: &ConfigSpec, input: &DecisionInput) -> EngineOutcome {
        let cpu_outcome = decide_dimension(
            input.cpu_usage_millis,
            input.current.cpu_request.as_ref(),
            input.current.cpu_limit.as_ref(),
            input.cpu_prediction,
            config,
            config.cpu_scale_up_threshold,
            config.cpu_scale_down_threshold,
            config.cpu_request_multiplier,
            config.cpu_limit_multiplier,
            config.min_cpu_request_millis,
            config.max_cpu_limit_millis,
        );
        let memory_outcome = decide_dimension(
            input.memory_usage_bytes,
            input.current.memory_request.as_ref(),
            input.current.memory_limit.as_ref(),
            input.memory_prediction,
            config,
            config.memory_scale_up_threshold,
            config.memory_scale_down_threshold,
            config.memory_request_multiplier,
            config.memory_limit_multiplier,
            config.min_memory_request_bytes,
            config.max_memory_limit_bytes,
        );

        let mut combined = ContainerDecision {
            cpu: cpu_outcome.decision,
            memory: memory_outcome.decision,
        };

        // Re-check the suppression rule after minChangePct may have
        // demoted one axis to `none`.
        let suppressed = combined.is_suppressed();
        if suppressed {
            combined = ContainerDecision::none();
        }

        let mut target = input.current.clone();
        if !suppressed {
            if let Some(q) = &cpu_outcome.target {
                target.cpu_request = Some(*q);
                target.cpu_limit = Some(ResourceQuantity::cpu_millis(
                    q.base_units() * config.cpu_limit_multiplier,
                ));
            }
            if let Some(q) = &memory_outcome.target {
                target.memory_request = Some(*q);
                target.memory_limit = Some(ResourceQuantity::memory_bytes(
                    q.base_units() * config.memory_limit_multiplier,
                ));
            }
        }

        let recommendation = if !suppressed && !combined.is_noop() {
            let cpu_util = utilization(input.cpu_usage_millis, input.current.cpu_limit.as_ref());
            let mem_util =
                utilization(input.memory_usage_bytes, input.current.memory_limit.as_ref());
            let priority = priority_tier(cpu_util, config.cpu_scale_up_threshold, combined.cpu)
                .max(priority_tier(
                    mem_util,
                    config.memory_scale_up_threshold,
                    combined.memory,
                ));

            let savings_pct = savings_percent(&combined, input.current, &target);

            let now = Utc::now();
            Some(Recommendation {
                identity: input.identity.clone(),
                decision: combined,
                current: input.current.clone(),
                target: target.clone(),
                savings_pct,
                confidence: input
                    .cpu_prediction
                    .map(|p| p.confidence)
                    .or_else(|| input.memory_prediction.map(|p| p.confidence)),
                priority,
                created_at: now,
                expires_at: now + Duration::minutes(10),
            })
        } else {
            None
        };

        EngineOutcome {
            decision: combined,
            target,
            recommendation,
            cpu_demotion: cpu_outcome.demotion,
            memory_demotion: memory_outcome.demotion,
            suppressed,
        }
    }
}

/// Savings % across the dimension(s) being scaled down; downscale only
/// (an upscale doesn't "save" anything).
fn savings_percent(
    decision: &ContainerDecision,
    current: &ResourceRequirements,
    target: &ResourceRequirements,
) -> Option<f64> {
    let mut deltas = Vec::new();
    if matches!(decision.cpu, Decision::Down) {
        if let (Some(c), Some(t)) = (&current.cpu_request, &target.cpu_request) {
            if c.base_units() > 0.0 {
                deltas.push((c.base_units() - t.base_units()) / c.base_units());
            }
        }
    }
    if matches!(decision.memory, Decision::Down) {
        if let (Some(c), Some(t)) = (&current.memory_request, &target.memory_request) {
            if c.base_units() > 0.0 {
                deltas.push((c.base_units() - t.base_units()) / c.base_units());
            }
        }
    }
    if deltas.is_empty() {
        None
    } else {
        Some(deltas.iter().sum::<f64>() / deltas.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn config() -> ConfigSpec {
        let mut c = ConfigSpec::for_mode(Mode::Balanced);
        c.cpu_scale_up_threshold = 0.8;
        c.cpu_scale_down_threshold = 0.3;
        c.memory_scale_up_threshold = 0.8;
        c.memory_scale_down_threshold = 0.3;
        c.cpu_request_multiplier = 1.2;
        c.cpu_limit_multiplier = 2.0;
        c.memory_request_multiplier = 1.2;
        c.memory_limit_multiplier = 2.0;
        c.min_change_pct = 0.10;
        c.min_cpu_request_millis = 10.0;
        c.max_cpu_limit_millis = 100_000.0;
        c
    }

    fn identity() -> ContainerIdentity {
        ContainerIdentity::new("ns", "pod", "c")
    }

    #[test]
    fn downscale_cpu_only() {
        let config = config();
        let identity = identity();
        let current = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(500.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(500.0)),
            memory_request: None,
            memory_limit: None,
        };
        let input = DecisionInput {
            identity: &identity,
            current: &current,
            cpu_usage_millis: 60.0,
            memory_usage_bytes: 0.0,
            cpu_prediction: None,
            memory_prediction: None,
        };
        let outcome = DecisionEngine::decide(&config, &input);
        assert_eq!(outcome.decision.cpu, Decision::Down);
        assert_eq!(outcome.decision.memory, Decision::None);
        let new_request = outcome.target.cpu_request.unwrap().base_units();
        assert!((new_request - 72.0).abs() < 1e-6);
    }

    #[test]
    fn memory_only_downscale_is_suppressed() {
        let config = config();
        let identity = identity();
        let current = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(500.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(500.0)),
            memory_request: Some(ResourceQuantity::memory_bytes(128.0 * 1024.0 * 1024.0)),
            memory_limit: Some(ResourceQuantity::memory_bytes(128.0 * 1024.0 * 1024.0)),
        };
        let input = DecisionInput {
            identity: &identity,
            current: &current,
            cpu_usage_millis: 250.0,
            memory_usage_bytes: 20.0 * 1024.0 * 1024.0,
            cpu_prediction: None,
            memory_prediction: None,
        };
        let outcome = DecisionEngine::decide(&config, &input);
        assert_eq!(outcome.decision.cpu, Decision::None);
        assert_eq!(outcome.decision.memory, Decision::None);
        assert!(outcome.suppressed);
        assert!(outcome.recommendation.is_none());
    }

    #[test]
    fn change_below_min_change_pct_is_demoted() {
        let mut config = config();
        config.min_change_pct = 0.5;
        let identity = identity();
        let current = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(500.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(500.0)),
            memory_request: None,
            memory_limit: None,
        };
        let input = DecisionInput {
            identity: &identity,
            current: &current,
            cpu_usage_millis: 60.0,
            memory_usage_bytes: 0.0,
            cpu_prediction: None,
            memory_prediction: None,
        };
        let outcome = DecisionEngine::decide(&config, &input);
        assert_eq!(outcome.decision.cpu, Decision::None);
        assert_eq!(outcome.cpu_demotion, DemotionReason::BelowMinChangePct);
    }
}
