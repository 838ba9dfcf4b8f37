//! Reconcile Manager (spec §5): the single process-wide driver that turns
//! pod watch events and a scheduled tick into reconciles, fans them out
//! across a bounded worker pool, and wires every other component (Config
//! Store → Policy Registry → Metrics Provider → History & Predictor →
//! Decision Engine → Validator & Rate Limiter → Resize Executor → audit)
//! into one per-workload reconcile function.
//!
//! A workload key (`namespace/podName`) is owned by at most one worker at
//! a time; reconciles for distinct keys carry no ordering guarantee.

use crate::config::ConfigStore;
use crate::decision::{DecisionEngine, DecisionInput};
use crate::error::{OperatorError, Recovery};
use crate::executor::{MemoryResizePolicy, ResizeExecutor, ResizeRequest};
use crate::history::HistoryStore;
use crate::identity::ContainerIdentity;
use crate::leader::LeaderState;
use crate::metrics_provider::MetricsProviderHandle;
use crate::model::{
    derive_qos_class, AuditOutcome, AuditRecord, Dimension, Prediction, PriorityTier, QoSClass,
    ResourceRequirements,
};
use crate::policy::{PolicyRegistry, WorkloadContext};
use crate::predictor::{PredictionEngine, PredictionStore};
use crate::rate_limiter::RateLimiter;
use crate::validator::{ContainerKind, NodeCapacity, ValidationInput, Validator};
use chrono::Duration as ChronoDuration;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::ResourceExt;
use rightsizer_common::audit::AuditSink;
use rightsizer_common::{MetricsRegistry, ResourceQuantity, UnitClass};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, info_span, warn, Instrument};

/// History/prediction store eviction cadence (spec §4.4).
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Construction-time knobs that aren't part of the Config Store snapshot
/// (they shape the worker pool plumbing itself, not sizing policy).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub work_queue_capacity: usize,
    pub prediction_horizons: Vec<ChronoDuration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            work_queue_capacity: 4096,
            prediction_horizons: vec![ChronoDuration::hours(1), ChronoDuration::hours(24)],
        }
    }
}

/// Ties every component into one running reconcile loop. Constructed once
/// at boot by the binary entrypoint and driven via `run`.
pub struct Manager {
    client: kube::Client,
    manager_config: ManagerConfig,
    config_store: Arc<ConfigStore>,
    policy_registry: Arc<PolicyRegistry>,
    metrics_provider: Arc<MetricsProviderHandle>,
    history: Arc<parking_lot::RwLock<HistoryStore>>,
    prediction_engine: Arc<PredictionEngine>,
    prediction_store: Arc<parking_lot::Mutex<PredictionStore>>,
    rate_limiter: Arc<RateLimiter>,
    executor: Arc<ResizeExecutor>,
    leader: LeaderState,
    metrics: Arc<MetricsRegistry>,
    audit_sink: Arc<dyn AuditSink>,
    in_flight: Arc<parking_lot::Mutex<HashSet<String>>>,
    allow_restart_fallback: bool,
    /// Priority boost accrued by a container across consecutive deferred
    /// resizes (spec §4.7 state machine: "rescheduled with backoff and a
    /// priority boost capped at the critical tier"). Cleared once a
    /// container's resize either applies or terminally fails.
    deferred_priority: Arc<parking_lot::Mutex<HashMap<String, PriorityTier>>>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: kube::Client,
        manager_config: ManagerConfig,
        config_store: Arc<ConfigStore>,
        policy_registry: Arc<PolicyRegistry>,
        metrics_provider: Arc<MetricsProviderHandle>,
        executor: Arc<ResizeExecutor>,
        rate_limiter: Arc<RateLimiter>,
        leader: LeaderState,
        metrics: Arc<MetricsRegistry>,
        audit_sink: Arc<dyn AuditSink>,
        allow_restart_fallback: bool,
    ) -> Self {
        let confidence_threshold = config_store.snapshot().spec.confidence_threshold;
        Self {
            client,
            manager_config,
            config_store,
            policy_registry,
            metrics_provider,
            history: Arc::new(parking_lot::RwLock::new(HistoryStore::new())),
            prediction_engine: Arc::new(PredictionEngine::new(confidence_threshold)),
            prediction_store: Arc::new(parking_lot::Mutex::new(PredictionStore::new())),
            rate_limiter,
            executor,
            leader,
            metrics,
            audit_sink,
            in_flight: Arc::new(parking_lot::Mutex::new(HashSet::new())),
            allow_restart_fallback,
            deferred_priority: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    /// Escalate and return the stored priority tier for a deferred
    /// container, seeding it from `base` on first deferral.
    fn escalate_priority(&self, container_key: &str, base: PriorityTier) -> PriorityTier {
        let mut tiers = self.deferred_priority.lock();
        let escalated = tiers.get(container_key).copied().unwrap_or(base).escalate();
        tiers.insert(container_key.to_string(), escalated);
        escalated
    }

    /// Clear accrued priority boost once a container's resize reaches a
    /// terminal, non-deferred outcome.
    fn clear_priority(&self, container_key: &str) {
        self.deferred_priority.lock().remove(container_key);
    }

    /// Run until `shutdown` is set to `true`. Spawns: one watch-driven
    /// producer, one ticker-driven producer (the scheduled `resizeInterval`
    /// sweep), and `maxConcurrentReconciles` bounded workers consuming a
    /// shared queue of workload keys. On shutdown, producers stop first;
    /// workers drain in-flight reconciles before the function returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let worker_count = self.config_store.snapshot().spec.max_concurrent_reconciles.max(1);
        let (tx, rx) = mpsc::channel::<String>(self.manager_config.work_queue_capacity);
        let rx = Arc::new(AsyncMutex::new(rx));

        let mut producer_shutdown = shutdown.clone();
        let watch_tx = tx.clone();
        let watch_client = self.client.clone();
        let watch_task = tokio::spawn(async move {
            Self::run_watch_producer(watch_client, watch_tx, &mut producer_shutdown).await;
        });

        let mut config_watch_shutdown = shutdown.clone();
        let config_watch_client = self.client.clone();
        let config_watch_store = self.config_store.clone();
        let config_watch_task = tokio::spawn(async move {
            crate::config_watch::run_operator_config_watch(
                config_watch_client,
                config_watch_store,
                &mut config_watch_shutdown,
            )
            .await;
        });

        let mut policy_watch_shutdown = shutdown.clone();
        let policy_watch_client = self.client.clone();
        let policy_watch_registry = self.policy_registry.clone();
        let policy_watch_task = tokio::spawn(async move {
            crate::config_watch::run_sizing_policy_watch(
                policy_watch_client,
                policy_watch_registry,
                &mut policy_watch_shutdown,
            )
            .await;
        });

        let mut ticker_shutdown = shutdown.clone();
        let ticker_tx = tx.clone();
        let ticker_client = self.client.clone();
        let ticker_store = self.config_store.clone();
        let ticker_task = tokio::spawn(async move {
            Self::run_ticker_producer(ticker_client, ticker_store, ticker_tx, &mut ticker_shutdown)
                .await;
        });
        drop(tx);

        let mut cleanup_shutdown = shutdown.clone();
        let cleanup_manager = self.clone();
        let cleanup_task = tokio::spawn(async move {
            cleanup_manager.run_cleanup_ticker(&mut cleanup_shutdown).await;
        });

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let manager = self.clone();
            let rx = rx.clone();
            let mut worker_shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                manager.run_worker(worker_id, rx, &mut worker_shutdown).await;
            }));
        }

        let _ = shutdown.changed().await;
        info!("graceful drain: waiting for in-flight reconciles to reach a terminal state");
        let _ = watch_task.await;
        let _ = config_watch_task.await;
        let _ = policy_watch_task.await;
        let _ = ticker_task.await;
        let _ = cleanup_task.await;
        for worker in workers {
            let _ = worker.await;
        }
        self.history.write().cleanup();
        self.prediction_store.lock().cleanup();
        info!("manager drained");
    }

    /// Evicts expired history windows and predictions once an hour (spec
    /// §4.4). The shutdown-drain cleanup above is a final pass on top of
    /// this, not a substitute for it.
    async fn run_cleanup_ticker(self: Arc<Self>, shutdown: &mut watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(CLEANUP_INTERVAL) => {
                    self.history.write().cleanup();
                    self.prediction_store.lock().cleanup();
                    debug!("hourly history/prediction cleanup ran");
                }
            }
        }
    }

    async fn run_watch_producer(
        client: kube::Client,
        tx: mpsc::Sender<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let pods: Api<Pod> = Api::all(client);
        let stream = watcher(pods, watcher::Config::default()).applied_objects();
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
                        Some(Ok(pod)) => {
                            let key = format!("{}/{}", pod.namespace().unwrap_or_default(), pod.name_any());
                            if tx.send(key).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => warn!(error = %e, "pod watch stream error"),
                        None => return,
                    }
                }
            }
        }
    }

    async fn run_ticker_producer(
        client: kube::Client,
        config_store: Arc<ConfigStore>,
        tx: mpsc::Sender<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        loop {
            let interval = config_store.snapshot().spec.resize_interval;
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    let pods: Api<Pod> = Api::all(client.clone());
                    match pods.list(&Default::default()).await {
                        Ok(list) => {
                            for pod in list.items {
                                let key =
                                    format!("{}/{}", pod.namespace().unwrap_or_default(), pod.name_any());
                                if tx.send(key).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "scheduled reconcile sweep: pod list failed"),
                    }
                }
            }
        }
    }

    async fn run_worker(
        self: Arc<Self>,
        worker_id: usize,
        rx: Arc<AsyncMutex<mpsc::Receiver<String>>>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        loop {
            let key = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                        continue;
                    }
                    next = rx.recv() => next,
                }
            };
            let Some(key) = key else { return };

            {
                let mut in_flight = self.in_flight.lock();
                if in_flight.contains(&key) {
                    // Another worker already owns this workload key; drop
                    // this duplicate trigger rather than block the worker.
                    continue;
                }
                in_flight.insert(key.clone());
            }

            let span = info_span!("reconcile", worker = worker_id, workload = %key);
            if let Err(e) = self.reconcile_workload(&key).instrument(span).await {
                warn!(workload = %key, error = %e, "reconcile failed");
            }

            self.in_flight.lock().remove(&key);
        }
    }

    /// One full pass over one pod: resolve config, fetch usage, forecast,
    /// decide, validate, rate-limit, execute, audit — once per container.
    async fn reconcile_workload(&self, key: &str) -> crate::error::Result<()> {
        let (namespace, pod_name) = key
            .split_once('/')
            .ok_or_else(|| OperatorError::ApiPermanent(format!("malformed workload key {key}")))?;

        let snapshot = self.config_store.snapshot();
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = match pods.get_opt(pod_name).await {
            Ok(Some(pod)) => pod,
            Ok(None) => return Ok(()), // deleted since being queued
            Err(e) => return Err(OperatorError::ApiTransient(e.to_string())),
        };

        let Some(spec) = &pod.spec else { return Ok(()) };

        let workload_kind = pod
            .metadata
            .owner_references
            .iter()
            .flatten()
            .find(|o| o.controller.unwrap_or(false))
            .map(|o| o.kind.clone())
            .unwrap_or_else(|| "Pod".to_string());
        let labels: HashMap<String, String> =
            pod.metadata.labels.clone().unwrap_or_default().into_iter().collect();
        let workload_ctx = WorkloadContext {
            namespace: namespace.to_string(),
            labels,
            workload_kind,
        };
        let effective_config = self.policy_registry.resolve(&workload_ctx, &snapshot.spec);

        if !effective_config.namespace_allowed(namespace) {
            return Ok(());
        }

        let all_requirements: Vec<ResourceRequirements> = spec
            .containers
            .iter()
            .map(|c| parse_requirements(c.resources.as_ref()))
            .collect();
        let pod_qos_class = derive_qos_class(&all_requirements);

        let usage = match self.metrics_provider.fetch(namespace, pod_name).await {
            Ok(usage) => usage,
            Err(OperatorError::MetricsUnavailable { .. }) => {
                debug!(workload = %key, "metrics unavailable this cycle, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let node_capacity = if let Some(node_name) = &spec.node_name {
            self.fetch_node_capacity(node_name).await
        } else {
            None
        };

        for container in &spec.containers {
            let Some(sample) = usage.get(&container.name) else {
                continue;
            };
            let identity =
                ContainerIdentity::new(namespace.to_string(), pod_name.to_string(), container.name.clone());

            {
                let mut history = self.history.write();
                history.record(sample.clone());
            }

            let (cpu_prediction, memory_prediction) = {
                let snapshot_window = {
                    let history = self.history.read();
                    history.window(&identity.to_string()).map(|w| w.samples_snapshot())
                };
                match snapshot_window {
                    Some(samples) => {
                        let window = crate::history::HistoryWindow::from_snapshot(
                            samples,
                            crate::history::DEFAULT_CAPACITY,
                            crate::history::DEFAULT_MAX_AGE,
                        );
                        let predictions = self
                            .prediction_engine
                            .predict_all(&window, &self.manager_config.prediction_horizons)
                            .await;
                        self.prediction_store
                            .lock()
                            .record(&identity.to_string(), predictions.clone());
                        (
                            best_prediction(&predictions, Dimension::Cpu),
                            best_prediction(&predictions, Dimension::Memory),
                        )
                    }
                    None => (None, None),
                }
            };

            let current = parse_requirements(container.resources.as_ref());
            let decision_input = DecisionInput {
                identity: &identity,
                current: &current,
                cpu_usage_millis: sample.cpu_millicores,
                memory_usage_bytes: sample.memory_bytes,
                cpu_prediction: cpu_prediction.as_ref(),
                memory_prediction: memory_prediction.as_ref(),
            };
            let outcome = DecisionEngine::decide(&effective_config, &decision_input);

            self.metrics
                .decisions_total
                .with_label_values(&["cpu", decision_label(outcome.decision.cpu)])
                .inc();
            self.metrics
                .decisions_total
                .with_label_values(&["memory", decision_label(outcome.decision.memory)])
                .inc();

            if outcome.suppressed {
                self.metrics.suppressed_total.inc();
                self.emit_audit(
                    &identity,
                    &current,
                    &current,
                    AuditOutcome::Deferred,
                    Some("suppressed".to_string()),
                    "suppressed_memory_only_downscale".to_string(),
                )
                .await;
                continue;
            }

            if outcome.decision.is_noop() {
                continue;
            }

            let mut target = outcome.target.clone();
            let mut validation = Validator::validate(
                &effective_config,
                &ValidationInput {
                    identity: &identity,
                    kind: ContainerKind::Regular,
                    pod_qos_class,
                    current: &current,
                    target: &target,
                    node: node_capacity.as_ref(),
                },
            );

            if let Err(OperatorError::ValidationFailed(
                crate::error::ValidationFailure::QoSViolation { .. },
            )) = &validation
            {
                if pod_qos_class == QoSClass::Guaranteed {
                    target = Validator::reshape_for_guaranteed(&target);
                    validation = Validator::validate(
                        &effective_config,
                        &ValidationInput {
                            identity: &identity,
                            kind: ContainerKind::Regular,
                            pod_qos_class,
                            current: &current,
                            target: &target,
                            node: node_capacity.as_ref(),
                        },
                    );
                }
            }

            let container_key = identity.to_string();
            let memory_resize_policy = derive_memory_resize_policy(container);
            let Err(failure) = validation else {
                self.admit_and_execute(
                    &identity,
                    &current,
                    &target,
                    &effective_config,
                    key,
                    memory_resize_policy,
                )
                .await;
                continue;
            };

            let category = validation_category(&failure);
            self.metrics
                .validation_failures_total
                .with_label_values(&[category])
                .inc();

            let base_priority = outcome
                .recommendation
                .as_ref()
                .map(|r| r.priority)
                .unwrap_or(PriorityTier::Low);
            let audit_outcome = match failure.recovery() {
                Recovery::Defer => {
                    let tier = self.escalate_priority(&container_key, base_priority);
                    self.emit_audit(
                        &identity,
                        &current,
                        &target,
                        AuditOutcome::Deferred,
                        Some(category.to_string()),
                        format!("{failure} (priority={tier:?})"),
                    )
                    .await;
                    continue;
                }
                _ => AuditOutcome::Failed,
            };
            self.clear_priority(&container_key);
            self.emit_audit(
                &identity,
                &current,
                &target,
                audit_outcome,
                Some(category.to_string()),
                failure.to_string(),
            )
            .await;
        }

        Ok(())
    }

    async fn admit_and_execute(
        &self,
        identity: &ContainerIdentity,
        current: &ResourceRequirements,
        target: &ResourceRequirements,
        effective_config: &crate::config::ConfigSpec,
        workload_key: &str,
        memory_resize_policy: Option<MemoryResizePolicy>,
    ) {
        let container_key = identity.to_string();
        let now = Instant::now();
        if let Err(e) = self.rate_limiter.check(&container_key, workload_key, &identity.namespace, now) {
            self.metrics
                .rate_limited_total
                .with_label_values(&[rate_limit_scope(&e)])
                .inc();
            let tier = self.escalate_priority(&container_key, PriorityTier::Low);
            self.emit_audit(
                identity,
                current,
                target,
                AuditOutcome::Deferred,
                Some("rate_limited".to_string()),
                format!("{e} (priority={tier:?})"),
            )
            .await;
            return;
        }

        if effective_config.dry_run {
            self.emit_audit(
                identity,
                current,
                target,
                AuditOutcome::DryRun,
                None,
                "dry_run: decision computed and audited, no patch applied".to_string(),
            )
            .await;
            return;
        }

        if !self.leader.is_leader() {
            self.emit_audit(
                identity,
                current,
                target,
                AuditOutcome::Deferred,
                Some("not_leader".to_string()),
                "lease not held, executor short-circuited".to_string(),
            )
            .await;
            return;
        }

        self.rate_limiter.admit(&identity.namespace);
        let request = ResizeRequest {
            identity,
            pod_name: &identity.pod_name,
            namespace: &identity.namespace,
            current,
            target,
            memory_resize_policy,
            allow_restart_fallback: self.allow_restart_fallback,
            resize_interval: effective_config.resize_interval,
        };
        let outcome = self.executor.execute(&request).await;
        self.rate_limiter.release(&identity.namespace);

        self.metrics
            .resize_outcomes_total
            .with_label_values(&[audit_outcome_label(outcome.audit.outcome)])
            .inc();

        match outcome.audit.outcome {
            AuditOutcome::Applied => {
                self.clear_priority(&container_key);
                self.rate_limiter.record_resize(&container_key, workload_key, now);
            }
            AuditOutcome::Failed => self.clear_priority(&container_key),
            AuditOutcome::Deferred | AuditOutcome::DryRun => {}
        }

        rightsizer_common::audit::emit(self.audit_sink.as_ref(), &outcome.audit).await;
    }

    async fn emit_audit(
        &self,
        identity: &ContainerIdentity,
        old: &ResourceRequirements,
        new: &ResourceRequirements,
        outcome: AuditOutcome,
        error_category: Option<String>,
        rationale: String,
    ) {
        self.metrics
            .resize_outcomes_total
            .with_label_values(&[audit_outcome_label(outcome)])
            .inc();
        let record = AuditRecord {
            identity: identity.clone(),
            old: old.clone(),
            new: new.clone(),
            rationale,
            outcome,
            error_category,
            actor: "rightsizer-operator".to_string(),
            recorded_at: chrono::Utc::now(),
        };
        rightsizer_common::audit::emit(self.audit_sink.as_ref(), &record).await;
    }

    async fn fetch_node_capacity(&self, node_name: &str) -> Option<NodeCapacity> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get_opt(node_name).await.ok().flatten()?;
        let allocatable = node.status?.allocatable?;
        let cpu = allocatable
            .get("cpu")
            .and_then(|q| ResourceQuantity::parse(&q.0, UnitClass::Cpu).ok())
            .map(|q| q.base_units())
            .unwrap_or(f64::INFINITY);
        let memory = allocatable
            .get("memory")
            .and_then(|q| ResourceQuantity::parse(&q.0, UnitClass::Memory).ok())
            .map(|q| q.base_units())
            .unwrap_or(f64::INFINITY);
        Some(NodeCapacity {
            node_name: node_name.to_string(),
            allocatable_cpu_millis: cpu,
            allocatable_memory_bytes: memory,
        })
    }
}

/// Reads the container's real `resizePolicy` for the memory dimension
/// (spec §4.7 point 4), falling back to `None` when the container declares
/// no policy for memory so the executor treats it as `NotRequired` there.
fn derive_memory_resize_policy(
    container: &k8s_openapi::api::core::v1::Container,
) -> Option<MemoryResizePolicy> {
    container.resize_policy.as_ref()?.iter().find_map(|p| {
        if p.resource_name == "memory" {
            Some(match p.restart_policy.as_str() {
                "RestartContainer" => MemoryResizePolicy::RestartContainer,
                _ => MemoryResizePolicy::NotRequired,
            })
        } else {
            None
        }
    })
}

fn parse_requirements(
    reqs: Option<&k8s_openapi::api::core::v1::ResourceRequirements>,
) -> ResourceRequirements {
    let mut out = ResourceRequirements::default();
    let Some(reqs) = reqs else { return out };

    if let Some(requests) = &reqs.requests {
        if let Some(q) = requests.get("cpu") {
            out.cpu_request = ResourceQuantity::parse(&q.0, UnitClass::Cpu).ok();
        }
        if let Some(q) = requests.get("memory") {
            out.memory_request = ResourceQuantity::parse(&q.0, UnitClass::Memory).ok();
        }
    }
    if let Some(limits) = &reqs.limits {
        if let Some(q) = limits.get("cpu") {
            out.cpu_limit = ResourceQuantity::parse(&q.0, UnitClass::Cpu).ok();
        }
        if let Some(q) = limits.get("memory") {
            out.memory_limit = ResourceQuantity::parse(&q.0, UnitClass::Memory).ok();
        }
    }
    out
}

/// The highest-confidence prediction for `dimension`, if any (`predictions`
/// is already sorted confidence desc by `PredictionEngine`).
fn best_prediction(predictions: &[Prediction], dimension: Dimension) -> Option<Prediction> {
    predictions.iter().find(|p| p.dimension == dimension).cloned()
}

fn decision_label(decision: crate::model::Decision) -> &'static str {
    match decision {
        crate::model::Decision::None => "none",
        crate::model::Decision::Up => "up",
        crate::model::Decision::Down => "down",
    }
}

fn audit_outcome_label(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Applied => "applied",
        AuditOutcome::Deferred => "deferred",
        AuditOutcome::Failed => "failed",
        AuditOutcome::DryRun => "dry_run",
    }
}

fn validation_category(failure: &OperatorError) -> &'static str {
    match failure {
        OperatorError::ValidationFailed(crate::error::ValidationFailure::QoSViolation { .. }) => {
            "invalid"
        }
        OperatorError::ValidationFailed(crate::error::ValidationFailure::BoundViolation {
            ..
        }) => "invalid",
        OperatorError::ValidationFailed(crate::error::ValidationFailure::InfeasibleCapacity {
            ..
        }) => "infeasible",
        _ => "invalid",
    }
}

fn rate_limit_scope(error: &OperatorError) -> &'static str {
    match error {
        OperatorError::RateLimited { scope, .. } if scope.starts_with("container") => "cooldown",
        OperatorError::RateLimited { scope, .. } if scope.starts_with("workload") => "workload",
        OperatorError::RateLimited { scope, .. } if scope.starts_with("namespace") => "namespace",
        OperatorError::RateLimited { .. } => "global",
        _ => "unknown",
    }
}
