//! Policy Registry (spec §4.2): an ordered collection of selector-based
//! policies that refine Config Store values per workload.

use crate::config::{ConfigSpec, Mode};
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The fully-resolved view a caller (Decision Engine, Validator, Rate
/// Limiter) consumes. It is the Config Store schema after the matching
/// policy's overrides have been overlaid — no separate "base + overlay"
/// pair to thread through the pipeline.
pub type EffectiveConfig = ConfigSpec;

/// What a policy matches against. A selector with no clauses at all
/// matches nothing, preventing accidental global overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Selector {
    pub namespaces: Option<Vec<String>>,
    pub labels: HashMap<String, String>,
    pub workload_kinds: Option<Vec<String>>,
}

impl Selector {
    fn is_empty(&self) -> bool {
        self.namespaces.is_none() && self.labels.is_empty() && self.workload_kinds.is_none()
    }

    fn matches(&self, target: &WorkloadContext) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(namespaces) = &self.namespaces {
            if !namespaces.iter().any(|n| n == &target.namespace) {
                return false;
            }
        }
        if !self
            .labels
            .iter()
            .all(|(k, v)| target.labels.get(k) == Some(v))
        {
            return false;
        }
        if let Some(kinds) = &self.workload_kinds {
            if !kinds.iter().any(|k| k == &target.workload_kind) {
                return false;
            }
        }
        true
    }
}

/// Context describing the container's owning workload, used for selector
/// matching.
#[derive(Debug, Clone)]
pub struct WorkloadContext {
    pub namespace: String,
    pub labels: HashMap<String, String>,
    pub workload_kind: String,
}

/// Sparse overrides a policy applies on top of the Config Store snapshot.
/// Unspecified fields fall through to the base value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PolicyOverrides {
    pub mode: Option<Mode>,
    pub cpu_scale_up_threshold: Option<f64>,
    pub cpu_scale_down_threshold: Option<f64>,
    pub memory_scale_up_threshold: Option<f64>,
    pub memory_scale_down_threshold: Option<f64>,
    pub cpu_request_multiplier: Option<f64>,
    pub memory_request_multiplier: Option<f64>,
    pub cpu_limit_multiplier: Option<f64>,
    pub memory_limit_multiplier: Option<f64>,
    pub min_cpu_request_millis: Option<f64>,
    pub min_memory_request_bytes: Option<f64>,
    pub max_cpu_limit_millis: Option<f64>,
    pub max_memory_limit_bytes: Option<f64>,
    pub min_change_pct: Option<f64>,
    pub scale_up_multiplier: Option<f64>,
    pub scale_down_multiplier: Option<f64>,
    pub dry_run: Option<bool>,
}

impl PolicyOverrides {
    fn apply_to(&self, base: &ConfigSpec) -> ConfigSpec {
        let mut merged = base.clone();
        macro_rules! overlay {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    merged.$field = v;
                }
            };
        }
        overlay!(mode);
        overlay!(cpu_scale_up_threshold);
        overlay!(cpu_scale_down_threshold);
        overlay!(memory_scale_up_threshold);
        overlay!(memory_scale_down_threshold);
        overlay!(cpu_request_multiplier);
        overlay!(memory_request_multiplier);
        overlay!(cpu_limit_multiplier);
        overlay!(memory_limit_multiplier);
        overlay!(min_cpu_request_millis);
        overlay!(min_memory_request_bytes);
        overlay!(max_cpu_limit_millis);
        overlay!(max_memory_limit_bytes);
        overlay!(min_change_pct);
        overlay!(scale_up_multiplier);
        overlay!(scale_down_multiplier);
        overlay!(dry_run);
        merged
    }
}

/// A selector-scoped set of overrides (spec §3 "Policy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub priority: i64,
    pub selector: Selector,
    pub overrides: PolicyOverrides,
    pub enabled: bool,
}

/// Ordered collection of policies. Resolution walks policies in
/// decreasing-priority order (tie-broken by name) and overlays the first
/// match onto the Config Store snapshot.
pub struct PolicyRegistry {
    policies: RwLock<Vec<Policy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
        }
    }

    /// Replace the full policy set, re-sorting by (priority desc, name asc).
    pub fn replace(&self, mut policies: Vec<Policy>) {
        policies.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        *self.policies.write() = policies;
    }

    /// Resolve the effective configuration for a container's workload,
    /// overlaying the first matching enabled policy onto `base`.
    pub fn resolve(&self, target: &WorkloadContext, base: &ConfigSpec) -> EffectiveConfig {
        let policies = self.policies.read();
        for policy in policies.iter() {
            if !policy.enabled {
                continue;
            }
            if policy.selector.matches(target) {
                return policy.overrides.apply_to(base);
            }
        }
        base.clone()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ns: &str) -> WorkloadContext {
        WorkloadContext {
            namespace: ns.to_string(),
            labels: HashMap::new(),
            workload_kind: "Deployment".to_string(),
        }
    }

    #[test]
    fn empty_selector_matches_nothing() {
        let registry = PolicyRegistry::new();
        registry.replace(vec![Policy {
            name: "catch-all".to_string(),
            priority: 100,
            selector: Selector::default(),
            overrides: PolicyOverrides {
                dry_run: Some(true),
                ..Default::default()
            },
            enabled: true,
        }]);

        let base = ConfigSpec::default();
        let resolved = registry.resolve(&ctx("team-a"), &base);
        assert_eq!(resolved.dry_run, base.dry_run);
    }

    #[test]
    fn higher_priority_policy_wins_and_unspecified_fields_fall_through() {
        let registry = PolicyRegistry::new();
        registry.replace(vec![
            Policy {
                name: "low".to_string(),
                priority: 1,
                selector: Selector {
                    namespaces: Some(vec!["team-a".to_string()]),
                    ..Default::default()
                },
                overrides: PolicyOverrides {
                    dry_run: Some(false),
                    ..Default::default()
                },
                enabled: true,
            },
            Policy {
                name: "high".to_string(),
                priority: 10,
                selector: Selector {
                    namespaces: Some(vec!["team-a".to_string()]),
                    ..Default::default()
                },
                overrides: PolicyOverrides {
                    dry_run: Some(true),
                    ..Default::default()
                },
                enabled: true,
            },
        ]);

        let base = ConfigSpec::default();
        let resolved = registry.resolve(&ctx("team-a"), &base);
        assert!(resolved.dry_run);
        // unspecified fields fall through to base
        assert_eq!(
            resolved.cpu_scale_up_threshold,
            base.cpu_scale_up_threshold
        );
    }

    #[test]
    fn equal_priority_tie_broken_by_name() {
        let registry = PolicyRegistry::new();
        registry.replace(vec![
            Policy {
                name: "zzz".to_string(),
                priority: 5,
                selector: Selector {
                    namespaces: Some(vec!["team-a".to_string()]),
                    ..Default::default()
                },
                overrides: PolicyOverrides {
                    min_change_pct: Some(0.99),
                    ..Default::default()
                },
                enabled: true,
            },
            Policy {
                name: "aaa".to_string(),
                priority: 5,
                selector: Selector {
                    namespaces: Some(vec!["team-a".to_string()]),
                    ..Default::default()
                },
                overrides: PolicyOverrides {
                    min_change_pct: Some(0.01),
                    ..Default::default()
                },
                enabled: true,
            },
        ]);

        let resolved = registry.resolve(&ctx("team-a"), &ConfigSpec::default());
        assert_eq!(resolved.min_change_pct, 0.01);
    }

    #[test]
    fn disabled_policy_is_skipped() {
        let registry = PolicyRegistry::new();
        registry.replace(vec![Policy {
            name: "off".to_string(),
            priority: 100,
            selector: Selector {
                namespaces: Some(vec!["team-a".to_string()]),
                ..Default::default()
            },
            overrides: PolicyOverrides {
                dry_run: Some(true),
                ..Default::default()
            },
            enabled: false,
        }]);

        let base = ConfigSpec::default();
        let resolved = registry.resolve(&ctx("team-a"), &base);
        assert_eq!(resolved.dry_run, base.dry_run);
    }
}
