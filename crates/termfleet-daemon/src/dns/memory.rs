//! In-process DNS provider

use super::provider::{join_domain, DnsProvider};
use crate::error::{DnsError, DnsResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record held by [`InMemoryDnsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub address: String,
    pub ttl: u32,
}

/// DNS provider that keeps records in memory.
///
/// Used for development and tests. It can be switched into a failure mode
/// where every write is rejected.
#[derive(Debug, Clone)]
pub struct InMemoryDnsProvider {
    base_domain: String,
    records: Arc<RwLock<HashMap<String, MemoryRecord>>>,
    failing: Arc<AtomicBool>,
    upserts: Arc<AtomicUsize>,
}

impl InMemoryDnsProvider {
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            records: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(AtomicBool::new(false)),
            upserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject (or stop rejecting) every write
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of upsert calls seen, including failed ones
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub async fn record(&self, name: &str) -> Option<MemoryRecord> {
        self.records.read().await.get(name).cloned()
    }

    fn check_available(&self) -> DnsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DnsError::Unavailable("provider is in failure mode".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for InMemoryDnsProvider {
    async fn upsert_record(&self, name: &str, address: &str, ttl: u32) -> DnsResult<String> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        self.records.write().await.insert(
            name.to_string(),
            MemoryRecord {
                address: address.to_string(),
                ttl,
            },
        );
        Ok(self.fqdn(name))
    }

    async fn delete_record(&self, name: &str) -> DnsResult<bool> {
        self.check_available()?;
        Ok(self.records.write().await.remove(name).is_some())
    }

    fn fqdn(&self, name: &str) -> String {
        join_domain(name, &self.base_domain)
    }
}
