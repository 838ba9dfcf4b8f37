//! Ambient stack shared by the right-sizing operator: resource quantities,
//! a low-level error type, structured logging bootstrap, the Prometheus
//! metric registry, and the audit sink contract.
//!
//! Everything pipeline-specific (the §7 error taxonomy, the data model for
//! containers/policies/decisions) lives in `rightsizer-operator`, which
//! depends on this crate.

pub mod audit;
pub mod error;
pub mod metrics;
pub mod quantity;
pub mod tracing_init;

pub use error::{Error, Result};
pub use metrics::MetricsRegistry;
pub use quantity::{ResourceQuantity, UnitClass};
