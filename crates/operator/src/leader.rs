//! Leader election (spec §5 "Leader election", §6 env vars): gates only
//! the Resize Executor. Losing the lease halts mutation but leaves
//! Metrics Provider / History / Decision Engine / Validator read paths
//! running, so observability and audit keep flowing.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::ResourceExt;
use k8s_openapi::api::coordination::v1::Lease;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Whether this process currently holds the lease. Cheap to read from any
/// worker deciding whether to run executor calls.
#[derive(Clone)]
pub struct LeaderState {
    is_leader: Arc<AtomicBool>,
    lease_lost: Arc<AtomicBool>,
}

impl LeaderState {
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Set once this process held the lease and then failed to renew or
    /// re-acquire it. A single-replica deployment has no sibling to fail
    /// over to, so the entrypoint treats this as fatal (exit code 2)
    /// rather than continuing to run read-only forever.
    pub fn lease_lost(&self) -> bool {
        self.lease_lost.load(Ordering::SeqCst)
    }
}

/// Renews a coordination.k8s.io Lease on an interval; reports whether this
/// identity currently holds it. Disabled (always-leader) when leader
/// election isn't configured, matching single-instance deployments.
pub struct LeaderElector {
    client: kube::Client,
    namespace: String,
    lease_name: String,
    identity: String,
    lease_duration: Duration,
    renew_interval: Duration,
    state: LeaderState,
}

impl LeaderElector {
    pub fn new(
        client: kube::Client,
        namespace: impl Into<String>,
        lease_name: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            lease_name: lease_name.into(),
            identity: identity.into(),
            lease_duration: Duration::from_secs(15),
            renew_interval: Duration::from_secs(5),
            state: LeaderState {
                is_leader: Arc::new(AtomicBool::new(false)),
                lease_lost: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn state(&self) -> LeaderState {
        self.state.clone()
    }

    /// Always-leader stand-in for single-instance deployments
    /// (`LEADER_ELECTION=false`).
    pub fn disabled() -> LeaderState {
        LeaderState {
            is_leader: Arc::new(AtomicBool::new(true)),
            lease_lost: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the renew loop until `shutdown` resolves. Acquires the lease if
    /// unheld or held by an expired holder; otherwise waits and retries.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let leases: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let mut ticker = tokio::time::interval(self.renew_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.try_acquire_or_renew(&leases).await {
                        Ok(acquired) => {
                            let was_leader = self.state.is_leader.swap(acquired, Ordering::SeqCst);
                            if acquired && !was_leader {
                                info!(identity = %self.identity, "acquired leader lease");
                            } else if !acquired && was_leader {
                                warn!(identity = %self.identity, "lost leader lease");
                                self.state.lease_lost.store(true, Ordering::SeqCst);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "lease renewal failed, assuming not leader");
                            let was_leader = self.state.is_leader.swap(false, Ordering::SeqCst);
                            if was_leader {
                                self.state.lease_lost.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.release(&leases).await;
                        return;
                    }
                }
            }
        }
    }

    async fn try_acquire_or_renew(&self, leases: &Api<Lease>) -> kube::Result<bool> {
        match leases.get_opt(&self.lease_name).await? {
            None => {
                let lease = Lease {
                    metadata: kube::api::ObjectMeta {
                        name: Some(self.lease_name.clone()),
                        ..Default::default()
                    },
                    spec: Some(k8s_openapi::api::coordination::v1::LeaseSpec {
                        holder_identity: Some(self.identity.clone()),
                        lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                        acquire_time: Some(MicroTime(chrono::Utc::now())),
                        renew_time: Some(MicroTime(chrono::Utc::now())),
                        lease_transitions: Some(0),
                        ..Default::default()
                    }),
                };
                leases.create(&PostParams::default(), &lease).await?;
                Ok(true)
            }
            Some(existing) => {
                let held_by_us = existing
                    .spec
                    .as_ref()
                    .and_then(|s| s.holder_identity.as_deref())
                    == Some(self.identity.as_str());

                let expired = existing
                    .spec
                    .as_ref()
                    .and_then(|s| s.renew_time.as_ref())
                    .map(|t| {
                        chrono::Utc::now().signed_duration_since(t.0)
                            > chrono::Duration::from_std(self.lease_duration * 2).unwrap()
                    })
                    .unwrap_or(true);

                if held_by_us || expired {
                    let patch = json!({
                        "spec": {
                            "holderIdentity": self.identity,
                            "renewTime": MicroTime(chrono::Utc::now()),
                        }
                    });
                    leases
                        .patch(
                            existing.name_any().as_str(),
                            &PatchParams::apply("rightsizer-leader-election"),
                            &Patch::Apply(patch),
                        )
                        .await?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn release(&self, leases: &Api<Lease>) {
        if let Ok(Some(existing)) = leases.get_opt(&self.lease_name).await {
            let held_by_us = existing
                .spec
                .as_ref()
                .and_then(|s| s.holder_identity.as_deref())
                == Some(self.identity.as_str());
            if held_by_us {
                info!(identity = %self.identity, "releasing leader lease on shutdown");
            }
        }
        self.state.is_leader.store(false, Ordering::SeqCst);
    }
}
