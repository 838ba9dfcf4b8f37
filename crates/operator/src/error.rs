//! Error taxonomy for the sizing pipeline (spec §7).
//!
//! Each variant carries exactly the fields a caller needs to decide
//! retry/defer/fail/fatal without string-matching the message, per the
//! Design Notes' "error returns" rule. The propagation policy table in §7
//! is implemented by `OperatorError::recovery()`.

use crate::identity::ContainerIdentity;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OperatorError>;

/// How a caller should react to an error, per the §7 propagation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Recovered locally by deferral with backoff; processing continues.
    Defer,
    /// Fails the one decision/resize and emits an audit record; processing
    /// of other containers continues.
    FailOne,
    /// Fatal at boot, non-fatal (status-only) at runtime.
    ConfigInvalid,
    /// Drain and exit.
    Fatal,
}

#[derive(Error, Debug, Clone)]
pub enum OperatorError {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String, fields: Vec<String> },

    #[error("metrics unavailable for {identity}: {reason}")]
    MetricsUnavailable {
        identity: ContainerIdentity,
        reason: String,
    },

    #[error("metrics backend down: {reason}")]
    MetricsBackendDown { reason: String },

    #[error("insufficient history for {identity}: have {have}, need {need}")]
    InsufficientHistory {
        identity: ContainerIdentity,
        have: usize,
        need: usize,
    },

    #[error("prediction timed out after {0:?}")]
    PredictionTimeout(Duration),

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationFailure),

    #[error("rate limited: {scope} retry_after={retry_after:?}")]
    RateLimited { scope: String, retry_after: Duration },

    #[error("resize subresource unsupported for {identity}")]
    ResizeUnsupported { identity: ContainerIdentity },

    #[error("resize for {identity} did not complete within deadline")]
    ResizeInProgressTimeout { identity: ContainerIdentity },

    #[error("transient API error: {0}")]
    ApiTransient(String),

    #[error("permanent API error: {0}")]
    ApiPermanent(String),

    #[error("circuit open, short-circuiting to deferred")]
    CircuitOpen,

    #[error("leader lease lost")]
    LeaderLost,
}

/// Sub-categories of `ValidationFailed`, matching §4.6.
#[derive(Error, Debug, Clone)]
pub enum ValidationFailure {
    #[error("QoS violation for {identity}: {reason}")]
    QoSViolation {
        identity: ContainerIdentity,
        reason: String,
    },
    #[error("bound violation for {identity}: {reason}")]
    BoundViolation {
        identity: ContainerIdentity,
        reason: String,
    },
    #[error("infeasible capacity for {identity} on node {node}: {reason}")]
    InfeasibleCapacity {
        identity: ContainerIdentity,
        node: String,
        reason: String,
    },
}

impl OperatorError {
    /// The recovery policy from §7's propagation table.
    pub fn recovery(&self) -> Recovery {
        match self {
            OperatorError::ApiTransient(_)
            | OperatorError::PredictionTimeout(_)
            | OperatorError::RateLimited { .. }
            | OperatorError::MetricsUnavailable { .. }
            | OperatorError::InsufficientHistory { .. }
            | OperatorError::CircuitOpen => Recovery::Defer,

            OperatorError::MetricsBackendDown { .. } => Recovery::Defer,

            OperatorError::InvalidConfig { .. } => Recovery::ConfigInvalid,

            OperatorError::ValidationFailed(ValidationFailure::InfeasibleCapacity { .. }) => {
                Recovery::Defer
            }
            OperatorError::ValidationFailed(_) => Recovery::FailOne,

            OperatorError::ResizeUnsupported { .. } | OperatorError::ApiPermanent(_) => {
                Recovery::FailOne
            }

            // in-flight -> deferred on timeout without progress (spec §4.7).
            OperatorError::ResizeInProgressTimeout { .. } => Recovery::Defer,

            OperatorError::LeaderLost => Recovery::Fatal,
        }
    }

    /// Stable metrics/audit label, independent of the Display message.
    pub fn category(&self) -> &'static str {
        match self {
            OperatorError::InvalidConfig { .. } => "invalid_config",
            OperatorError::MetricsUnavailable { .. } => "metrics_unavailable",
            OperatorError::MetricsBackendDown { .. } => "metrics_backend_down",
            OperatorError::InsufficientHistory { .. } => "insufficient_history",
            OperatorError::PredictionTimeout(_) => "prediction_timeout",
            OperatorError::ValidationFailed(_) => "validation_failed",
            OperatorError::RateLimited { .. } => "rate_limited",
            OperatorError::ResizeUnsupported { .. } => "resize_unsupported",
            OperatorError::ResizeInProgressTimeout { .. } => "resize_in_progress_timeout",
            OperatorError::ApiTransient(_) => "api_transient",
            OperatorError::ApiPermanent(_) => "api_permanent",
            OperatorError::CircuitOpen => "circuit_open",
            OperatorError::LeaderLost => "leader_lost",
        }
    }
}
