//! Application state for API handlers

use crate::dns::DnsRegistrar;
use crate::scheduler::Reconciler;
use crate::storage::Storage;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage backend
    pub storage: Arc<dyn Storage>,

    /// Registration coordinator
    pub registrar: Arc<DnsRegistrar>,

    /// Reconciler handle, used to request an early tick
    pub reconciler: Arc<Reconciler>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        storage: Arc<dyn Storage>,
        registrar: Arc<DnsRegistrar>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            storage,
            registrar,
            reconciler,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Whole seconds since the daemon started
    pub fn uptime_secs(&self) -> u64 {
        (chrono::Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
