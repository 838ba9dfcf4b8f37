//! Audit sink transport. The sink contract is at-least-once and best
//! effort: a delivery failure is logged, never propagated into the
//! decision pipeline (§5 "Shared resources", §6 "Metrics/audit sinks").

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// A destination for append-only audit records. Implementations must not
/// block or fail the caller's pipeline on delivery errors; `record` returns
/// an `Err` only so the caller can count/log failures, never to unwind a
/// reconcile.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: serde_json::Value) -> Result<()>;
}

/// Serialize `value` and hand it to `sink`, logging (not propagating) any
/// delivery failure.
pub async fn emit<T: Serialize + Sync>(sink: &dyn AuditSink, value: &T) {
    match serde_json::to_value(value) {
        Ok(json) => {
            if let Err(e) = sink.record(json).await {
                warn!(error = %e, "audit record delivery failed");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize audit record"),
    }
}

/// Writes newline-delimited JSON to stdout. Used for `dryRun` and local
/// development.
#[derive(Default)]
pub struct StdoutSink;

#[async_trait]
impl AuditSink for StdoutSink {
    async fn record(&self, record: serde_json::Value) -> Result<()> {
        println!("{record}");
        Ok(())
    }
}

/// Posts each record as bearer-authed JSON to an HTTP endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bearer_token,
        }
    }
}

#[async_trait]
impl AuditSink for HttpSink {
    async fn record(&self, record: serde_json::Value) -> Result<()> {
        let mut req = self.client.post(&self.endpoint).json(&record);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(crate::error::Error::Sink(format!(
                "audit endpoint returned {}",
                resp.status()
            ))),
            Err(e) => Err(crate::error::Error::Sink(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdout_sink_never_errors() {
        let sink = StdoutSink;
        assert!(sink.record(serde_json::json!({"ok": true})).await.is_ok());
    }
}
