//! Error types for termfleet-health.
//!
//! Probe failures are ordinary [`ProbeResult`](crate::ProbeResult) values.
//! These errors only cover building a prober.

use thiserror::Error;

/// Errors raised while setting up probing.
#[derive(Debug, Error)]
pub enum HealthError {
    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type for health operations.
pub type HealthResult<T> = Result<T, HealthError>;
