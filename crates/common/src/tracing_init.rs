//! Structured logging bootstrap. Every binary and integration test in this
//! workspace goes through `init_tracing` rather than configuring
//! `tracing_subscriber` ad hoc.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber from a `LOG_LEVEL` string
/// (`"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`, or a full
/// `EnvFilter` directive string). Safe to call more than once; subsequent
/// calls are no-ops.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    Ok(())
}
