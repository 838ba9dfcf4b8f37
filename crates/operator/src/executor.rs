//! Resize Executor (spec §4.7): applies an admitted target via the
//! `resize` subresource, falls back to a restarting patch when allowed,
//! tracks progress through pod status conditions, and retries transient
//! failures with backoff.

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{OperatorError, Result};
use crate::identity::ContainerIdentity;
use crate::model::{AuditOutcome, AuditRecord, ResourceRequirements};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::wait::{await_condition, conditions};
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// State machine for one pending resize (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    Queued,
    Admitted,
    InFlight,
    Completed,
    Deferred,
    Failed,
}

pub struct ResizeRequest<'a> {
    pub identity: &'a ContainerIdentity,
    pub pod_name: &'a str,
    pub namespace: &'a str,
    pub current: &'a ResourceRequirements,
    pub target: &'a ResourceRequirements,
    pub memory_resize_policy: Option<MemoryResizePolicy>,
    pub allow_restart_fallback: bool,
    pub resize_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryResizePolicy {
    NotRequired,
    RestartContainer,
}

pub struct ExecutionOutcome {
    pub state: ResizeState,
    pub audit: AuditRecord,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

pub struct ResizeExecutor {
    client: kube::Client,
    circuit_breaker: CircuitBreaker,
}

impl ResizeExecutor {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            circuit_breaker: CircuitBreaker::with_defaults(),
        }
    }

    fn build_patch(request: &ResizeRequest) -> serde_json::Value {
        let mut resources = serde_json::Map::new();
        let mut requests = serde_json::Map::new();
        let mut limits = serde_json::Map::new();

        if let Some(q) = &request.target.cpu_request {
            requests.insert("cpu".to_string(), json!(q.to_string()));
        }
        if let Some(q) = &request.target.memory_request {
            requests.insert("memory".to_string(), json!(q.to_string()));
        }
        if let Some(q) = &request.target.cpu_limit {
            limits.insert("cpu".to_string(), json!(q.to_string()));
        }
        if let Some(q) = &request.target.memory_limit {
            limits.insert("memory".to_string(), json!(q.to_string()));
        }
        if !requests.is_empty() {
            resources.insert("requests".to_string(), serde_json::Value::Object(requests));
        }
        if !limits.is_empty() {
            resources.insert("limits".to_string(), serde_json::Value::Object(limits));
        }

        json!({
            "spec": {
                "containers": [{
                    "name": request.identity.container_name,
                    "resources": serde_json::Value::Object(resources),
                }]
            }
        })
    }

    /// Apply one resize end-to-end: patch, poll, retry, audit.
    pub async fn execute(&self, request: &ResizeRequest<'_>) -> ExecutionOutcome {
        if !self.circuit_breaker.allow(std::time::Instant::now()) {
            return ExecutionOutcome {
                state: ResizeState::Deferred,
                audit: audit_record(
                    request,
                    AuditOutcome::Deferred,
                    Some("circuit_open".to_string()),
                    "circuit breaker open, short-circuiting to deferred".to_string(),
                ),
            };
        }

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), request.namespace);
        let patch = Self::build_patch(request);

        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            attempt += 1;
            let result = pods
                .patch_resize(
                    request.pod_name,
                    &PatchParams::default(),
                    &Patch::Strategic(patch.clone()),
                )
                .await;

            match result {
                Ok(_) => {
                    self.circuit_breaker.record_success();
                    return self.await_completion(request, &pods).await;
                }
                Err(kube::Error::Api(ref resp)) if resp.code == 409 && attempt < MAX_ATTEMPTS => {
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff = next_backoff(backoff);
                    continue;
                }
                Err(kube::Error::Api(ref resp)) if resp.code >= 500 && attempt < MAX_ATTEMPTS => {
                    self.circuit_breaker.record_failure(std::time::Instant::now());
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff = next_backoff(backoff);
                    continue;
                }
                Err(kube::Error::Api(ref resp)) if resp.code == 404 || resp.reason == "NotFound" => {
                    return self.handle_unsupported(request, &pods).await;
                }
                Err(e) => {
                    self.circuit_breaker.record_failure(std::time::Instant::now());
                    let category = if attempt >= MAX_ATTEMPTS {
                        "api_transient_exhausted"
                    } else {
                        "api_permanent"
                    };
                    warn!(error = %e, %attempt, "resize patch failed");
                    return ExecutionOutcome {
                        state: ResizeState::Failed,
                        audit: audit_record(
                            request,
                            AuditOutcome::Failed,
                            Some(category.to_string()),
                            format!("resize subresource call failed: {e}"),
                        ),
                    };
                }
            }
        }
    }

    async fn handle_unsupported(
        &self,
        request: &ResizeRequest<'_>,
        pods: &Api<Pod>,
    ) -> ExecutionOutcome {
        if !request.allow_restart_fallback {
            let err = OperatorError::ResizeUnsupported {
                identity: request.identity.clone(),
            };
            return ExecutionOutcome {
                state: ResizeState::Failed,
                audit: audit_record(
                    request,
                    AuditOutcome::Failed,
                    Some(err.category().to_string()),
                    format!("{err}: restart fallback disallowed"),
                ),
            };
        }

        let patch = Self::build_patch(request);
        match pods
            .patch(request.pod_name, &PatchParams::default(), &Patch::Strategic(patch))
            .await
        {
            Ok(_) => {
                info!(identity = %request.identity, "applied resize via restarting fallback patch");
                ExecutionOutcome {
                    state: ResizeState::Completed,
                    audit: audit_record(
                        request,
                        AuditOutcome::Applied,
                        None,
                        "applied via restart fallback (subresource unsupported)".to_string(),
                    ),
                }
            }
            Err(e) => ExecutionOutcome {
                state: ResizeState::Failed,
                audit: audit_record(
                    request,
                    AuditOutcome::Failed,
                    Some("api_permanent".to_string()),
                    format!("restart fallback patch failed: {e}"),
                ),
            },
        }
    }

    async fn await_completion(
        &self,
        request: &ResizeRequest<'_>,
        pods: &Api<Pod>,
    ) -> ExecutionOutcome {
        let deadline = request.resize_interval * 2;
        let resized = await_condition(
            pods.clone(),
            request.pod_name,
            conditions::is_pod_resized(),
        );

        match tokio::time::timeout(deadline, resized).await {
            Ok(Ok(_)) => ExecutionOutcome {
                state: ResizeState::Completed,
                audit: audit_record(
                    request,
                    AuditOutcome::Applied,
                    None,
                    "resize completed".to_string(),
                ),
            },
            Ok(Err(e)) => ExecutionOutcome {
                state: ResizeState::Deferred,
                audit: audit_record(
                    request,
                    AuditOutcome::Deferred,
                    Some("resize_watch_error".to_string()),
                    format!("error watching resize progress: {e}"),
                ),
            },
            Err(_) => {
                if matches!(request.memory_resize_policy, Some(MemoryResizePolicy::NotRequired)) {
                    // Best-effort: a timeout without reaching the new
                    // allocation is treated as success under NotRequired.
                    ExecutionOutcome {
                        state: ResizeState::Completed,
                        audit: audit_record(
                            request,
                            AuditOutcome::Applied,
                            None,
                            "best-effort completion under memory NotRequired policy".to_string(),
                        ),
                    }
                } else {
                    let err = OperatorError::ResizeInProgressTimeout {
                        identity: request.identity.clone(),
                    };
                    ExecutionOutcome {
                        state: ResizeState::Deferred,
                        audit: audit_record(
                            request,
                            AuditOutcome::Deferred,
                            Some(err.category().to_string()),
                            err.to_string(),
                        ),
                    }
                }
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    let next = current.mul_f64(BACKOFF_FACTOR);
    next.min(MAX_BACKOFF)
}

fn jittered(base: Duration) -> Duration {
    let jitter_frac = rand::thread_rng().gen_range(-0.1..=0.1);
    let millis = base.as_millis() as f64 * (1.0 + jitter_frac);
    Duration::from_millis(millis.max(0.0) as u64)
}

fn audit_record(
    request: &ResizeRequest,
    outcome: AuditOutcome,
    error_category: Option<String>,
    rationale: String,
) -> AuditRecord {
    AuditRecord {
        identity: request.identity.clone(),
        old: request.current.clone(),
        new: request.target.clone(),
        rationale,
        outcome,
        error_category,
        actor: "rightsizer-operator".to_string(),
        recorded_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rightsizer_common::ResourceQuantity;

    #[test]
    fn build_patch_includes_only_changed_dimensions() {
        let identity = ContainerIdentity::new("ns", "pod", "app");
        let current = ResourceRequirements::default();
        let target = ResourceRequirements {
            cpu_request: Some(ResourceQuantity::cpu_millis(150.0)),
            cpu_limit: Some(ResourceQuantity::cpu_millis(300.0)),
            memory_request: None,
            memory_limit: None,
        };
        let request = ResizeRequest {
            identity: &identity,
            pod_name: "pod",
            namespace: "ns",
            current: &current,
            target: &target,
            memory_resize_policy: None,
            allow_restart_fallback: false,
            resize_interval: Duration::from_secs(30),
        };
        let patch = ResizeExecutor::build_patch(&request);
        let resources = &patch["spec"]["containers"][0]["resources"];
        assert_eq!(resources["requests"]["cpu"], "150m");
        assert!(resources.get("memory").is_none());
    }

    #[test]
    fn backoff_caps_at_max() {
        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..10 {
            backoff = next_backoff(backoff);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }
}
