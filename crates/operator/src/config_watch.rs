//! Watches the two declarative configuration kinds (spec §6) and
//! materializes their cluster state into the Config Store and Policy
//! Registry, satisfying spec §3's lifecycle contract that config object
//! changes "propagate to the Config Store within one reconcile tick."
//!
//! These are two extra producer tasks alongside the pod watch/ticker in
//! `manager.rs`: `OperatorConfig` changes replace the Config Store's
//! active snapshot; `SizingPolicy` changes replace the Policy Registry's
//! full ordered set (the registry has no per-policy upsert API, so each
//! event re-derives the whole set from the reflector's current store).

use crate::config::ConfigStore;
use crate::crd::{resolve_config_spec, OperatorConfig, SizingPolicy};
use crate::policy::{Policy, PolicyRegistry};
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::ResourceExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Watch `OperatorConfig` objects cluster-wide and apply the most
/// recently observed one to the Config Store. Multiple instances in the
/// cluster is a misconfiguration the spec doesn't define tie-breaking
/// for; last-write-wins, same as any other watch-driven last-applied
/// state.
pub async fn run_operator_config_watch(
    client: kube::Client,
    config_store: Arc<ConfigStore>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let api: Api<OperatorConfig> = Api::all(client);
    let stream = watcher(api, watcher::Config::default()).applied_objects();
    tokio::pin!(stream);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(obj)) => {
                        let name = obj.name_any();
                        let spec = resolve_config_spec(&obj.spec);
                        match config_store.try_update(spec) {
                            Ok(generation) => {
                                info!(generation, operator_config = %name, "config store updated from OperatorConfig");
                            }
                            Err(e) => {
                                warn!(error = %e, operator_config = %name, "rejected OperatorConfig update, retaining prior snapshot");
                            }
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "OperatorConfig watch error"),
                    None => return,
                }
            }
        }
    }
}

/// Watch `SizingPolicy` objects cluster-wide and keep the Policy
/// Registry's ordered set in sync via a reflector store (so deletions
/// are reflected, not just upserts).
pub async fn run_sizing_policy_watch(
    client: kube::Client,
    policy_registry: Arc<PolicyRegistry>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let api: Api<SizingPolicy> = Api::all(client);
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()));
    tokio::pin!(stream);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(_)) => {
                        let policies: Vec<Policy> =
                            reader.state().iter().map(|p| Policy::from(p.as_ref())).collect();
                        info!(count = policies.len(), "policy registry refreshed from SizingPolicy objects");
                        policy_registry.replace(policies);
                    }
                    Some(Err(e)) => warn!(error = %e, "SizingPolicy watch error"),
                    None => return,
                }
            }
        }
    }
}
