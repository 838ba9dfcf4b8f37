//! Process entrypoint (spec §6 boot environment variables, §9 ambient
//! logging/config): reads env vars, builds every pipeline component, and
//! drives the reconcile `Manager` until SIGINT/SIGTERM, with a 30-second
//! graceful drain.
//!
//! Exit codes: 0 normal shutdown, 1 fatal configuration error at boot, 2
//! lost leader lease with no failover configured. 137 (SIGKILL) is never
//! set here; it is what the container runtime imposes if the drain
//! deadline is exceeded.

use anyhow::Context;
use rightsizer_common::audit::{AuditSink, HttpSink, StdoutSink};
use rightsizer_common::MetricsRegistry;
use rightsizer_operator::config::{ConfigSpec, ConfigStore, Mode};
use rightsizer_operator::executor::ResizeExecutor;
use rightsizer_operator::leader::LeaderElector;
use rightsizer_operator::metrics_provider::{
    ClusterMetricsApiProvider, MetricsProviderHandle, PrometheusBackendProvider,
};
use rightsizer_operator::policy::PolicyRegistry;
use rightsizer_operator::rate_limiter::{RateLimiter, RateLimiterConfig};
use rightsizer_operator::{Manager, ManagerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const GRACEFUL_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let log_level = env_string("LOG_LEVEL", "info");
    if let Err(e) = rightsizer_common::tracing_init::init_tracing(&log_level) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    match run().await {
        Ok(()) => std::process::exit(0),
        Err(e) if e.downcast_ref::<LeaseLost>().is_some() => {
            error!(error = %e, "exiting: leader lease lost with no failover");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "fatal error at boot");
            std::process::exit(1);
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("leader lease lost")]
struct LeaseLost;

async fn run() -> anyhow::Result<()> {
    let boot = BootConfig::from_env();

    let client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;

    let mut config_spec = ConfigSpec::for_mode(boot.mode);
    config_spec.qps = boot.qps;
    config_spec.burst = boot.burst;
    config_spec.max_concurrent_reconciles = boot.max_concurrent_reconciles;
    config_spec.dry_run = boot.dry_run;

    let config_store = Arc::new(
        ConfigStore::new(config_spec).context("initial configuration failed validation")?,
    );
    let policy_registry = Arc::new(PolicyRegistry::new());

    let metrics_provider = Arc::new(build_metrics_provider(&boot, client.clone()));

    let executor = Arc::new(ResizeExecutor::new(client.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        max_concurrent_reconciles: boot.max_concurrent_reconciles,
        ..Default::default()
    }));
    let metrics = Arc::new(MetricsRegistry::new());
    let audit_sink = build_audit_sink(&boot);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let leader = if boot.leader_election {
        let elector = LeaderElector::new(
            client.clone(),
            boot.leader_election_namespace.clone(),
            "rightsizer-leader",
            instance_identity(),
        );
        let state = elector.state();
        let elector_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { elector.run(elector_shutdown).await });
        state
    } else {
        LeaderElector::disabled()
    };

    let leader_watch = leader.clone();
    let manager = Arc::new(Manager::new(
        client,
        ManagerConfig::default(),
        config_store,
        policy_registry,
        metrics_provider,
        executor,
        rate_limiter,
        leader,
        metrics,
        audit_sink,
        boot.allow_restart_fallback,
    ));

    let run_handle = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run(shutdown_rx).await }
    });

    let lease_lost = tokio::select! {
        _ = wait_for_termination() => false,
        _ = watch_for_lease_loss(leader_watch), if boot.leader_election => true,
    };

    if lease_lost {
        info!("leader lease lost with no failover configured, draining before fatal exit");
    } else {
        info!("shutdown signal received, draining in-flight reconciles");
    }
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(GRACEFUL_DRAIN, run_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "manager task panicked during drain"),
        Err(_) => warn!("graceful drain deadline exceeded, exiting anyway"),
    }

    if lease_lost {
        return Err(LeaseLost.into());
    }
    Ok(())
}

/// Polls until the elector reports it held the lease and then lost it.
/// Leader election is expected to flap between instances in a multi-replica
/// deployment; this only fires once this process specifically transitions
/// out of leadership, which the entrypoint treats as fatal (see module
/// docs on exit code 2).
async fn watch_for_lease_loss(leader: rightsizer_operator::leader::LeaderState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if leader.lease_lost() {
            return;
        }
    }
}

fn build_metrics_provider(boot: &BootConfig, client: kube::Client) -> MetricsProviderHandle {
    match boot.prometheus_url.as_deref() {
        Some(url) => MetricsProviderHandle::PrometheusBackend(PrometheusBackendProvider::new(url)),
        None => MetricsProviderHandle::ClusterMetricsApi(ClusterMetricsApiProvider::new(client)),
    }
}

fn build_audit_sink(boot: &BootConfig) -> Arc<dyn AuditSink> {
    match boot.audit_endpoint.as_deref() {
        Some(endpoint) => Arc::new(HttpSink::new(endpoint.to_string(), boot.audit_bearer_token.clone())),
        None => Arc::new(StdoutSink),
    }
}

fn instance_identity() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| format!("rightsizer-{}", std::process::id()))
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Boot-time knobs read once at process start (spec §6). Everything here
/// is `std::env` plus a typed default; there is no CLI-flag surface by
/// design (policy is CRD-driven, not flag-driven).
struct BootConfig {
    mode: Mode,
    qps: f32,
    burst: u32,
    max_concurrent_reconciles: usize,
    leader_election: bool,
    leader_election_namespace: String,
    dry_run: bool,
    allow_restart_fallback: bool,
    prometheus_url: Option<String>,
    audit_endpoint: Option<String>,
    audit_bearer_token: Option<String>,
}

impl BootConfig {
    fn from_env() -> Self {
        Self {
            mode: parse_mode(&env_string("MODE", "balanced")),
            qps: env_parse("QPS", 20.0),
            burst: env_parse("BURST", 30),
            max_concurrent_reconciles: env_parse("MAX_CONCURRENT_RECONCILES", 3),
            leader_election: env_parse("LEADER_ELECTION", true),
            leader_election_namespace: env_string("LEADER_ELECTION_NAMESPACE", "rightsizer-system"),
            dry_run: env_parse("DRY_RUN", false),
            allow_restart_fallback: env_parse("ALLOW_RESTART_FALLBACK", true),
            prometheus_url: std::env::var("PROMETHEUS_URL").ok(),
            audit_endpoint: std::env::var("AUDIT_ENDPOINT").ok(),
            audit_bearer_token: std::env::var("AUDIT_BEARER_TOKEN").ok(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_mode(s: &str) -> Mode {
    match s.to_ascii_lowercase().as_str() {
        "conservative" => Mode::Conservative,
        "aggressive" => Mode::Aggressive,
        _ => Mode::Balanced,
    }
}
