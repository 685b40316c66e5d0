//! System resolver used for propagation checks

use super::provider::DnsResolver;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Resolver backed by the operating system's lookup
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolves(&self, domain: &str) -> bool {
        // lookup_host needs a port; it is not used.
        let lookup = tokio::net::lookup_host((domain, 0));

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(addrs)) => {
                let propagated = addrs.into_iter().any(|addr: SocketAddr| addr.is_ipv4());
                tracing::debug!(domain, propagated, "DNS propagation check result");
                propagated
            }
            Ok(Err(e)) => {
                tracing::debug!(domain, error = %e, "DNS not yet propagated");
                false
            }
            Err(_) => {
                tracing::debug!(domain, "DNS propagation check timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literal_resolves() {
        let resolver = SystemResolver::default();
        assert!(resolver.resolves("127.0.0.1").await);
    }

    #[tokio::test]
    async fn test_unresolvable_name_is_not_propagated() {
        let resolver = SystemResolver::default();
        assert!(!resolver.resolves("desk1.termfleet.invalid").await);
    }
}
