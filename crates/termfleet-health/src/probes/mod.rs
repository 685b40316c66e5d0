//! Reachability probes for workstations.

mod http;

pub use http::{HttpProber, HttpProberConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Whether the endpoint answered with HTTP 200.
    pub success: bool,

    /// HTTP status returned, if a response arrived.
    pub status_code: Option<u16>,

    /// Time spent on the probe in milliseconds.
    pub latency_ms: u64,

    /// Failure detail.
    pub message: Option<String>,

    /// When the probe finished.
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl ProbeResult {
    /// Create a successful probe result.
    pub fn success(status_code: u16, latency_ms: u64) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            latency_ms,
            message: None,
            checked_at: chrono::Utc::now(),
        }
    }

    /// Create a failed probe result.
    pub fn failure(status_code: Option<u16>, message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: false,
            status_code,
            latency_ms,
            message: Some(message.into()),
            checked_at: chrono::Utc::now(),
        }
    }

    /// Create a timeout probe result.
    pub fn timeout(timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        Self::failure(
            None,
            format!("Probe timed out after {}ms", timeout_ms),
            timeout_ms,
        )
    }

    /// Failure recorded without touching the network.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::failure(None, reason, 0)
    }
}

/// Trait for workstation probes.
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// Check `domain_name` once, giving up after `timeout`.
    async fn probe(&self, domain_name: &str, timeout: Duration) -> ProbeResult;
}

/// Probe a workstation that may not have a domain yet.
///
/// Workstations without a domain fail immediately.
pub async fn probe_target<P>(
    prober: &P,
    domain_name: Option<&str>,
    timeout: Duration,
) -> ProbeResult
where
    P: HealthProber + ?Sized,
{
    match domain_name {
        Some(domain) => prober.probe(domain, timeout).await,
        None => ProbeResult::skipped("workstation has no domain name"),
    }
}
