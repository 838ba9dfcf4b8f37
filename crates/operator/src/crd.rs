//! Custom Resource Definitions for the two declarative configuration
//! kinds (spec §6): `OperatorConfig` mirrors the Config Store schema;
//! `SizingPolicy` mirrors a single Policy Registry entry.

use crate::config::{ConfigSpec, Mode};
use crate::policy::{PolicyOverrides, Selector};
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Cluster-scoped source of the process-wide Config Store.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "rightsizer.io",
    version = "v1",
    kind = "OperatorConfig",
    singular = "operatorconfig",
    plural = "operatorconfigs",
    shortname = "rsoc",
    status = "OperatorConfigStatus",
    printcolumn = r#"{"name":"Mode", "type":"string", "jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Generation", "type":"integer", "jsonPath":".status.observedGeneration"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigSpec {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_resize_interval_secs")]
    pub resize_interval_secs: u64,

    #[serde(default)]
    pub cpu_scale_up_threshold: Option<f64>,
    #[serde(default)]
    pub cpu_scale_down_threshold: Option<f64>,
    #[serde(default)]
    pub memory_scale_up_threshold: Option<f64>,
    #[serde(default)]
    pub memory_scale_down_threshold: Option<f64>,

    #[serde(default)]
    pub cpu_request_multiplier: Option<f64>,
    #[serde(default)]
    pub memory_request_multiplier: Option<f64>,
    #[serde(default)]
    pub cpu_limit_multiplier: Option<f64>,
    #[serde(default)]
    pub memory_limit_multiplier: Option<f64>,

    #[serde(default)]
    pub min_cpu_request: Option<String>,
    #[serde(default)]
    pub min_memory_request: Option<String>,
    #[serde(default)]
    pub max_cpu_limit: Option<String>,
    #[serde(default)]
    pub max_memory_limit: Option<String>,

    #[serde(default)]
    pub min_change_pct: Option<f64>,
    #[serde(default)]
    pub scale_up_multiplier: Option<f64>,
    #[serde(default)]
    pub scale_down_multiplier: Option<f64>,

    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub update_resize_policy: bool,

    #[serde(default)]
    pub namespace_include: HashSet<String>,
    #[serde(default)]
    pub namespace_exclude: HashSet<String>,

    #[serde(default)]
    pub confidence_threshold: Option<f64>,

    #[serde(default)]
    pub qps: Option<f32>,
    #[serde(default)]
    pub burst: Option<u32>,
    #[serde(default)]
    pub max_concurrent_reconciles: Option<usize>,
}

fn default_resize_interval_secs() -> u64 {
    30
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigStatus {
    pub observed_generation: i64,
    pub applied_at: Option<DateTime<Utc>>,
    pub validation_errors: Vec<String>,
}

/// Merge an `OperatorConfigSpec` onto mode defaults to produce a full
/// `ConfigSpec`, leaving unspecified numeric fields at the mode preset.
pub fn resolve_config_spec(crd: &OperatorConfigSpec) -> ConfigSpec {
    let mut spec = ConfigSpec::for_mode(crd.mode);
    spec.resize_interval = std::time::Duration::from_secs(crd.resize_interval_secs);

    macro_rules! overlay {
        ($field:ident) => {
            if let Some(v) = crd.$field {
                spec.$field = v;
            }
        };
    }
    overlay!(cpu_scale_up_threshold);
    overlay!(cpu_scale_down_threshold);
    overlay!(memory_scale_up_threshold);
    overlay!(memory_scale_down_threshold);
    overlay!(cpu_request_multiplier);
    overlay!(memory_request_multiplier);
    overlay!(cpu_limit_multiplier);
    overlay!(memory_limit_multiplier);
    overlay!(min_change_pct);
    overlay!(scale_up_multiplier);
    overlay!(scale_down_multiplier);
    overlay!(confidence_threshold);
    overlay!(qps);
    overlay!(burst);
    overlay!(max_concurrent_reconciles);

    if let Some(raw) = &crd.min_cpu_request {
        if let Ok(q) = rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Cpu) {
            spec.min_cpu_request_millis = q.base_units();
        }
    }
    if let Some(raw) = &crd.min_memory_request {
        if let Ok(q) = rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Memory) {
            spec.min_memory_request_bytes = q.base_units();
        }
    }
    if let Some(raw) = &crd.max_cpu_limit {
        if let Ok(q) = rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Cpu) {
            spec.max_cpu_limit_millis = q.base_units();
        }
    }
    if let Some(raw) = &crd.max_memory_limit {
        if let Ok(q) = rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Memory) {
            spec.max_memory_limit_bytes = q.base_units();
        }
    }

    spec.dry_run = crd.dry_run;
    spec.update_resize_policy = crd.update_resize_policy;
    spec.namespace_include = crd.namespace_include.clone();
    spec.namespace_exclude = crd.namespace_exclude.clone();
    spec
}

/// A single Policy Registry entry, sourced from the cluster.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "rightsizer.io",
    version = "v1",
    kind = "SizingPolicy",
    singular = "sizingpolicy",
    plural = "sizingpolicies",
    shortname = "rssp",
    status = "SizingPolicyStatus",
    printcolumn = r#"{"name":"Priority", "type":"integer", "jsonPath":".spec.priority"}"#,
    printcolumn = r#"{"name":"Enabled", "type":"boolean", "jsonPath":".spec.enabled"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SizingPolicySpec {
    pub priority: i64,
    #[serde(default)]
    pub selector: Selector,
    #[serde(default)]
    pub overrides: PolicyOverrides,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SizingPolicyStatus {
    pub match_count: i64,
    pub last_applied: Option<DateTime<Utc>>,
}

impl From<&SizingPolicy> for crate::policy::Policy {
    fn from(crd: &SizingPolicy) -> Self {
        crate::policy::Policy {
            name: crd.name_any(),
            priority: crd.spec.priority,
            selector: crd.spec.selector.clone(),
            overrides: crd.spec.overrides.clone(),
            enabled: crd.spec.enabled,
        }
    }
}

use kube::ResourceExt;
