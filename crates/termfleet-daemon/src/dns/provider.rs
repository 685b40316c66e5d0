//! DNS collaborator traits

use crate::error::DnsResult;
use async_trait::async_trait;

/// Writes A records under the fleet's base domain
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create or replace the A record for `name`, returning the full domain
    async fn upsert_record(&self, name: &str, address: &str, ttl: u32) -> DnsResult<String>;

    /// Remove the A record for `name`; false if there was none
    async fn delete_record(&self, name: &str) -> DnsResult<bool>;

    /// Fully-qualified domain for a workstation name
    fn fqdn(&self, name: &str) -> String;
}

/// Read-only lookup used to confirm propagation
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Whether `domain` currently resolves to an IPv4 address
    async fn resolves(&self, domain: &str) -> bool;
}

/// Join a label and a zone
pub fn join_domain(name: &str, base_domain: &str) -> String {
    format!("{}.{}", name, base_domain.trim_matches('.'))
}
