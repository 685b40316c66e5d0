//! DNS records for workstations
//!
//! Providers write A records under the fleet's base domain; the resolver
//! confirms propagation; the registrar ties both to workstation records.

mod memory;
mod provider;
mod registrar;
mod resolver;
mod spaceship;

pub use memory::{InMemoryDnsProvider, MemoryRecord};
pub use provider::{DnsProvider, DnsResolver};
pub use registrar::{DnsRegistrar, PropagationStatus, RegistrationOutcome};
pub use resolver::SystemResolver;
pub use spaceship::SpaceshipProvider;

use crate::config::{DnsConfig, DnsProviderConfig};
use crate::error::DnsResult;
use std::sync::Arc;

/// Build the DNS provider selected in configuration
pub fn build_provider(config: &DnsConfig) -> DnsResult<Arc<dyn DnsProvider>> {
    match &config.provider {
        DnsProviderConfig::Memory => {
            tracing::warn!("Using in-memory DNS provider; records are not published");
            Ok(Arc::new(InMemoryDnsProvider::new(&config.base_domain)))
        }
        DnsProviderConfig::Spaceship {
            api_key,
            api_secret,
            api_base,
        } => Ok(Arc::new(SpaceshipProvider::new(
            api_base,
            api_key,
            api_secret,
            &config.base_domain,
        )?)),
    }
}
