//! Validator (spec §4.6, first half): admission-style safety checks run
//! on a computed target before any patch is emitted.

use crate::config::ConfigSpec;
use crate::error::{OperatorError, Result, ValidationFailure};
use crate::identity::ContainerIdentity;
use crate::model::{QoSClass, ResourceRequirements};
use rightsizer_common::ResourceQuantity;

/// Node-level capacity the container's target must fit within. Populated
/// by the caller from the scheduled node's allocatable resources.
pub struct NodeCapacity {
    pub node_name: String,
    pub allocatable_cpu_millis: f64,
    pub allocatable_memory_bytes: f64,
}

/// Kind of container a patch would apply to. Init and ephemeral
/// containers are never resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Regular,
    Init,
    Ephemeral,
}

pub struct ValidationInput<'a> {
    pub identity: &'a ContainerIdentity,
    pub kind: ContainerKind,
    pub pod_qos_class: QoSClass,
    pub current: &'a ResourceRequirements,
    pub target: &'a ResourceRequirements,
    pub node: Option<&'a NodeCapacity>,
}

pub struct Validator;

impl Validator {
    /// Run every admission-style check. Returns `Ok(())` when the target
    /// may be patched as-is, or the first failing `ValidationFailure`.
    ///
    /// Callers that get a QoS mismatch for a `Guaranteed` pod should
    /// reshape the target (request = limit) and re-validate rather than
    /// treating it as fatal — see `reshape_for_guaranteed`.
    pub fn validate(config: &ConfigSpec, input: &ValidationInput) -> Result<()> {
        if matches!(input.kind, ContainerKind::Init | ContainerKind::Ephemeral) {
            return Err(OperatorError::ValidationFailed(
                ValidationFailure::BoundViolation {
                    identity: input.identity.clone(),
                    reason: "init and ephemeral containers are never resized".to_string(),
                },
            ));
        }

        if !config.namespace_allowed(&input.identity.namespace) {
            return Err(OperatorError::ValidationFailed(
                ValidationFailure::BoundViolation {
                    identity: input.identity.clone(),
                    reason: format!("namespace {} excluded by policy", input.identity.namespace),
                },
            ));
        }

        Self::check_qos_preserved(input)?;
        Self::check_positivity_and_limit_invariant(input)?;
        Self::check_bounds(config, input)?;
        if let Some(node) = input.node {
            Self::check_node_capacity(input, node)?;
        }

        Ok(())
    }

    fn check_qos_preserved(input: &ValidationInput) -> Result<()> {
        if input.pod_qos_class != QoSClass::Guaranteed {
            return Ok(());
        }
        let cpu_equal = matches!(
            (&input.target.cpu_request, &input.target.cpu_limit),
            (Some(r), Some(l)) if r.base_units() == l.base_units()
        );
        let mem_equal = matches!(
            (&input.target.memory_request, &input.target.memory_limit),
            (Some(r), Some(l)) if r.base_units() == l.base_units()
        );
        if cpu_equal && mem_equal {
            Ok(())
        } else {
            Err(OperatorError::ValidationFailed(ValidationFailure::QoSViolation {
                identity: input.identity.clone(),
                reason: "target would change pod from Guaranteed QoS".to_string(),
            }))
        }
    }

    fn check_positivity_and_limit_invariant(input: &ValidationInput) -> Result<()> {
        if !input.target.respects_limit_ge_request() {
            return Err(OperatorError::ValidationFailed(ValidationFailure::BoundViolation {
                identity: input.identity.clone(),
                reason: "target would set limit below request".to_string(),
            }));
        }

        for (had_request, request) in [
            (input.current.cpu_request.is_some(), &input.target.cpu_request),
            (input.current.memory_request.is_some(), &input.target.memory_request),
        ] {
            if had_request {
                if let Some(q) = request {
                    if q.base_units() <= 0.0 {
                        return Err(OperatorError::ValidationFailed(
                            ValidationFailure::BoundViolation {
                                identity: input.identity.clone(),
                                reason: "target request must be positive".to_string(),
                            },
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_bounds(config: &ConfigSpec, input: &ValidationInput) -> Result<()> {
        if let Some(q) = &input.target.cpu_request {
            if q.base_units() < config.min_cpu_request_millis {
                return Err(bound_violation(input.identity, "cpu request below minimum"));
            }
        }
        if let Some(q) = &input.target.cpu_limit {
            if q.base_units() > config.max_cpu_limit_millis {
                return Err(bound_violation(input.identity, "cpu limit above maximum"));
            }
        }
        if let Some(q) = &input.target.memory_request {
            if q.base_units() < config.min_memory_request_bytes {
                return Err(bound_violation(input.identity, "memory request below minimum"));
            }
        }
        if let Some(q) = &input.target.memory_limit {
            if q.base_units() > config.max_memory_limit_bytes {
                return Err(bound_violation(input.identity, "memory limit above maximum"));
            }
        }
        Ok(())
    }

    fn check_node_capacity(input: &ValidationInput, node: &NodeCapacity) -> Result<()> {
        if let Some(q) = &input.target.cpu_limit {
            if q.base_units() > node.allocatable_cpu_millis {
                return Err(OperatorError::ValidationFailed(
                    ValidationFailure::InfeasibleCapacity {
                        identity: input.identity.clone(),
                        node: node.node_name.clone(),
                        reason: format!(
                            "target cpu limit {} exceeds node allocatable {}",
                            q, node.allocatable_cpu_millis
                        ),
                    },
                ));
            }
        }
        if let Some(q) = &input.target.memory_limit {
            if q.base_units() > node.allocatable_memory_bytes {
                return Err(OperatorError::ValidationFailed(
                    ValidationFailure::InfeasibleCapacity {
                        identity: input.identity.clone(),
                        node: node.node_name.clone(),
                        reason: format!(
                            "target memory limit {} exceeds node allocatable {}",
                            q, node.allocatable_memory_bytes
                        ),
                    },
                ));
            }
        }
        Ok(())
    }

    /// Reshape a target to keep a Guaranteed pod Guaranteed: set both
    /// dimensions' limits equal to their requests.
    pub fn reshape_for_guaranteed(target: &ResourceRequirements) -> ResourceRequirements {
        let mut reshaped = target.clone();
        if let Some(r) = reshaped.cpu_request {
            reshaped.cpu_limit = Some(r);
        }
        if let Some(r) = reshaped.memory_request {
            reshaped.memory_limit = Some(r);
        }
        reshaped
    }
}

fn bound_violation(identity: &ContainerIdentity, reason: &str) -> OperatorError {
    OperatorError::ValidationFailed(ValidationFailure::BoundViolation {
        identity: identity.clone(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn identity() -> ContainerIdentity {
        ContainerIdentity::new("ns", "pod", "c")
    }

    #[test]
    fn guaranteed_pod_with_unequal_target_fails_qos_check() {
        let config = ConfigSpec::for_mode(Mode::Balanced);
        let identity = identity();
        let current = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(200.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(200.0)),
            memory_request: Some(ResourceQuantity::memory_bytes(100.0)),
            memory_limit: Some(ResourceQuantity::memory_bytes(100.0)),
        };
        let target = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(216.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(432.0)),
            memory_request: Some(ResourceQuantity::memory_bytes(100.0)),
            memory_limit: Some(ResourceQuantity::memory_bytes(100.0)),
        };
        let input = ValidationInput {
            identity: &identity,
            kind: ContainerKind::Regular,
            pod_qos_class: QoSClass::Guaranteed,
            current: &current,
            target: &target,
            node: None,
        };
        let result = Validator::validate(&config, &input);
        assert!(matches!(
            result,
            Err(OperatorError::ValidationFailed(ValidationFailure::QoSViolation { .. }))
        ));

        let reshaped = Validator::reshape_for_guaranteed(&target);
        let input = ValidationInput {
            target: &reshaped,
            ..input
        };
        assert!(Validator::validate(&config, &input).is_ok());
    }

    #[test]
    fn infeasible_node_capacity_is_categorized() {
        let config = ConfigSpec::for_mode(Mode::Balanced);
        let identity = identity();
        let current = ResourceRequirements::default();
        let target = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(8000.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(8000.0)),
            memory_request: None,
            memory_limit: None,
        };
        let node = NodeCapacity {
            node_name: "node-1".to_string(),
            allocatable_cpu_millis: 2000.0,
            allocatable_memory_bytes: 8.0 * 1024.0 * 1024.0 * 1024.0,
        };
        let input = ValidationInput {
            identity: &identity,
            kind: ContainerKind::Regular,
            pod_qos_class: QoSClass::Burstable,
            current: &current,
            target: &target,
            node: Some(&node),
        };
        let result = Validator::validate(&config, &input);
        assert!(matches!(
            result,
            Err(OperatorError::ValidationFailed(ValidationFailure::InfeasibleCapacity { .. }))
        ));
    }

    #[test]
    fn init_containers_are_never_resized() {
        let config = ConfigSpec::for_mode(Mode::Balanced);
        let identity = identity();
        let current = ResourceRequirements::default();
        let target = ResourceRequirements::default();
        let input = ValidationInput {
            identity: &identity,
            kind: ContainerKind::Init,
            pod_qos_class: QoSClass::BestEffort,
            current: &current,
            target: &target,
            node: None,
        };
        assert!(Validator::validate(&config, &input).is_err());
    }
}
