//! Low-level error types shared by the ambient stack (quantity parsing,
//! logging setup, metric encoding, audit sink transport).
//!
//! The operator-facing error taxonomy (`InvalidConfig`, `MetricsUnavailable`,
//! `CircuitOpen`, ...) lives in `rightsizer_operator::error` since it encodes
//! pipeline-level recovery policy; this module only covers failures that can
//! occur below that layer.

use thiserror::Error;

/// Result alias for the ambient stack.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A resource quantity string did not parse (e.g. `"150mX"`).
    #[error("invalid resource quantity {input:?}: {reason}")]
    InvalidQuantity { input: String, reason: String },

    /// An arithmetic or comparison operation mixed CPU and memory quantities.
    #[error("unit class mismatch: {0}")]
    UnitMismatch(String),

    /// Tracing/logging subsystem failed to initialize.
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// An audit or metrics sink failed to deliver a record. Sinks are
    /// best-effort, so callers log this rather than propagate it.
    #[error("sink delivery failed: {0}")]
    Sink(String),
}
