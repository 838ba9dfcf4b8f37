//! Metrics Provider (spec §4.3): abstraction over the in-cluster metrics
//! API or an external time-series backend, returning per-container usage
//! samples. Implemented as a small tagged-enum dispatch rather than a
//! trait object, per the Design Notes' guidance that dynamic dispatch be
//! reserved for genuinely open-ended extension points.

use crate::error::{OperatorError, Result};
use crate::identity::ContainerIdentity;
use crate::model::Sample;
use async_trait::async_trait;
use chrono::Utc;
use kube::api::{Api, DynamicObject, GroupVersionKind};
use kube::Client;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch the latest usage sample for every container in `pod_name`.
    /// Returns `MetricsUnavailable` when the backend is reachable but has
    /// no data for this pod yet.
    async fn fetch(&self, namespace: &str, pod_name: &str) -> Result<HashMap<String, Sample>>;

    /// Whether the backend itself is reachable, independent of whether any
    /// particular pod has data.
    async fn healthy(&self) -> bool;
}

/// Dispatches to one of the two supported backends.
pub enum MetricsProviderHandle {
    ClusterMetricsApi(ClusterMetricsApiProvider),
    PrometheusBackend(PrometheusBackendProvider),
}

#[async_trait]
impl MetricsProvider for MetricsProviderHandle {
    async fn fetch(&self, namespace: &str, pod_name: &str) -> Result<HashMap<String, Sample>> {
        match self {
            Self::ClusterMetricsApi(p) => p.fetch(namespace, pod_name).await,
            Self::PrometheusBackend(p) => p.fetch(namespace, pod_name).await,
        }
    }

    async fn healthy(&self) -> bool {
        match self {
            Self::ClusterMetricsApi(p) => p.healthy().await,
            Self::PrometheusBackend(p) => p.healthy().await,
        }
    }
}

/// Reads the `metrics.k8s.io` aggregated API via the dynamic client — the
/// `PodMetrics` type isn't part of `k8s-openapi`'s built-in type set.
pub struct ClusterMetricsApiProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PodMetricsUsage {
    containers: Vec<ContainerMetricsUsage>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetricsUsage {
    name: String,
    usage: HashMap<String, String>,
}

impl ClusterMetricsApiProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics")
    }
}

#[async_trait]
impl MetricsProvider for ClusterMetricsApiProvider {
    async fn fetch(&self, namespace: &str, pod_name: &str) -> Result<HashMap<String, Sample>> {
        let gvk = Self::gvk();
        let api_resource = kube::discovery::ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &api_resource);

        let obj = api.get(pod_name).await.map_err(|e| match e {
            kube::Error::Api(ref resp) if resp.code == 404 => OperatorError::MetricsUnavailable {
                identity: ContainerIdentity::new(namespace, pod_name, ""),
                reason: "no metrics recorded for pod yet".to_string(),
            },
            other => OperatorError::MetricsBackendDown {
                reason: other.to_string(),
            },
        })?;

        let usage: PodMetricsUsage =
            serde_json::from_value(obj.data).map_err(|e| OperatorError::MetricsUnavailable {
                identity: ContainerIdentity::new(namespace, pod_name, ""),
                reason: format!("malformed PodMetrics payload: {e}"),
            })?;

        let now = Utc::now();
        let mut out = HashMap::new();
        for c in usage.containers {
            let identity = ContainerIdentity::new(namespace, pod_name, c.name.clone());
            let cpu = parse_cpu_quantity(c.usage.get("cpu"));
            let memory = parse_memory_quantity(c.usage.get("memory"));
            let (cpu, memory) = match (cpu, memory) {
                (Some(cpu), Some(memory)) => (cpu, memory),
                _ => {
                    warn!(%identity, "skipping container with unparseable usage quantity");
                    continue;
                }
            };
            out.insert(
                c.name,
                Sample {
                    timestamp: now,
                    identity,
                    cpu_millicores: cpu,
                    memory_bytes: memory,
                },
            );
        }
        Ok(out)
    }

    async fn healthy(&self) -> bool {
        let gvk = Self::gvk();
        let api_resource = kube::discovery::ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
        api.list(&Default::default()).await.is_ok()
    }
}

fn parse_cpu_quantity(raw: Option<&String>) -> Option<f64> {
    let raw = raw?;
    rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Cpu)
        .ok()
        .map(|q| q.base_units())
}

fn parse_memory_quantity(raw: Option<&String>) -> Option<f64> {
    let raw = raw?;
    rightsizer_common::ResourceQuantity::parse(raw, rightsizer_common::UnitClass::Memory)
        .ok()
        .map(|q| q.base_units())
}

/// Issues PromQL range queries against an external Prometheus-compatible
/// backend.
pub struct PrometheusBackendProvider {
    http: HttpClient,
    base_url: String,
    cpu_query: String,
    memory_query: String,
}

#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    data: Option<PromData>,
}

#[derive(Debug, Deserialize)]
struct PromData {
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
struct PromSeries {
    metric: HashMap<String, String>,
    value: (f64, String),
}

impl PrometheusBackendProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client construction"),
            base_url: base_url.into(),
            cpu_query: "container_cpu_usage_millicores".to_string(),
            memory_query: "container_memory_working_set_bytes".to_string(),
        }
    }

    async fn query(&self, promql: &str, namespace: &str, pod_name: &str) -> Result<Vec<PromSeries>> {
        let url = format!("{}/api/v1/query", self.base_url);
        let full_query = format!(
            "{promql}{{namespace=\"{namespace}\", pod=\"{pod_name}\"}}"
        );
        let resp = self
            .http
            .get(&url)
            .query(&[("query", full_query.as_str())])
            .send()
            .await
            .map_err(|e| OperatorError::MetricsBackendDown {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(OperatorError::MetricsBackendDown {
                reason: format!("prometheus returned {}", resp.status()),
            });
        }

        let parsed: PromResponse = resp.json().await.map_err(|e| OperatorError::MetricsBackendDown {
            reason: format!("malformed prometheus response: {e}"),
        })?;

        if parsed.status != "success" {
            return Err(OperatorError::MetricsBackendDown {
                reason: format!("prometheus query status: {}", parsed.status),
            });
        }

        Ok(parsed.data.map(|d| d.result).unwrap_or_default())
    }
}

#[async_trait]
impl MetricsProvider for PrometheusBackendProvider {
    async fn fetch(&self, namespace: &str, pod_name: &str) -> Result<HashMap<String, Sample>> {
        let (cpu_series, memory_series) = tokio::try_join!(
            self.query(&self.cpu_query, namespace, pod_name),
            self.query(&self.memory_query, namespace, pod_name),
        )?;

        if cpu_series.is_empty() && memory_series.is_empty() {
            return Err(OperatorError::MetricsUnavailable {
                identity: ContainerIdentity::new(namespace, pod_name, ""),
                reason: "no time series returned for pod".to_string(),
            });
        }

        let now = Utc::now();
        let mut memory_by_container: HashMap<String, f64> = HashMap::new();
        for series in &memory_series {
            if let Some(container) = series.metric.get("container") {
                if let Ok(v) = series.value.1.parse::<f64>() {
                    memory_by_container.insert(container.clone(), v);
                }
            }
        }

        let mut out = HashMap::new();
        for series in &cpu_series {
            let Some(container) = series.metric.get("container") else {
                continue;
            };
            let Ok(cpu) = series.value.1.parse::<f64>() else {
                continue;
            };
            let memory = memory_by_container.get(container).copied().unwrap_or(0.0);
            out.insert(
                container.clone(),
                Sample {
                    timestamp: now,
                    identity: ContainerIdentity::new(namespace, pod_name, container.clone()),
                    cpu_millicores: cpu,
                    memory_bytes: memory,
                },
            );
        }
        Ok(out)
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/api/v1/query", self.base_url);
        self.http
            .get(&url)
            .query(&[("query", "up")])
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
