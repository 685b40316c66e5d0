//! Registration coordination
//!
//! Registration is the only way a workstation enters the fleet and the only
//! way out of DNS_FAILED. Every attempt that touches DNS leaves exactly one
//! audit event behind, whether the upsert succeeded or not.

use super::provider::{DnsProvider, DnsResolver};
use crate::error::RegistrarError;
use crate::storage::{EventStorage, Storage, WorkstationStorage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use termfleet_types::{
    NewWorkstationEvent, Workstation, WorkstationEventType, WorkstationPatch, WorkstationStatus,
    WorkstationView,
};
use tokio::sync::Mutex;

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    pub view: WorkstationView,
    /// True when the record did not exist before
    pub created: bool,
}

/// Answer to a propagation check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationStatus {
    pub name: String,
    pub domain_name: String,
    pub propagated: bool,
    pub checked_at: DateTime<Utc>,
}

/// Coordinates DNS upserts with workstation records
pub struct DnsRegistrar {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn DnsProvider>,
    resolver: Arc<dyn DnsResolver>,
    ttl: u32,
    // One registration at a time, so two requests for a new name cannot race.
    lock: Mutex<()>,
}

impl DnsRegistrar {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn DnsProvider>,
        resolver: Arc<dyn DnsResolver>,
        ttl: u32,
    ) -> Self {
        Self {
            storage,
            provider,
            resolver,
            ttl,
            lock: Mutex::new(()),
        }
    }

    /// Domain a workstation name maps to
    pub fn fqdn(&self, name: &str) -> String {
        self.provider.fqdn(name)
    }

    /// Register `name` at `ip`, creating or updating its record
    pub async fn register(&self, name: &str, ip: &str) -> Result<RegistrationOutcome, RegistrarError> {
        self.register_at(name, ip, Utc::now()).await
    }

    /// [`register`](Self::register) with an explicit clock
    pub async fn register_at(
        &self,
        name: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, RegistrarError> {
        let _guard = self.lock.lock().await;

        match self.storage.get_workstation(name).await? {
            None => self.register_new(name, ip, now).await,
            Some(existing)
                if existing.ip_address == ip && existing.status != WorkstationStatus::DnsFailed =>
            {
                tracing::debug!(name, ip, "Registration unchanged");
                Ok(RegistrationOutcome {
                    view: existing.into(),
                    created: false,
                })
            }
            Some(existing) => self.reregister(existing, ip, now).await,
        }
    }

    async fn register_new(
        &self,
        name: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, RegistrarError> {
        tracing::info!(name, ip, "Registering workstation");

        match self.provider.upsert_record(name, ip, self.ttl).await {
            Ok(domain) => {
                let ws = self
                    .storage
                    .create_workstation(Workstation::starting(name, ip, domain, now))
                    .await?;

                self.storage
                    .append_event(
                        NewWorkstationEvent::new(name, WorkstationEventType::Registered)
                            .with_statuses(None, Some(WorkstationStatus::Starting))
                            .with_details("Workstation registered"),
                    )
                    .await?;

                Ok(RegistrationOutcome {
                    view: ws.into(),
                    created: true,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(name, ip, error = %reason, "DNS registration failed");

                let ws = Workstation::dns_failed(name, ip, self.fqdn(name), &reason, now);
                self.storage.create_workstation(ws).await?;

                self.storage
                    .append_event(
                        NewWorkstationEvent::new(name, WorkstationEventType::DnsFailed)
                            .with_statuses(None, Some(WorkstationStatus::DnsFailed))
                            .with_details(reason.clone()),
                    )
                    .await?;

                Err(RegistrarError::DnsFailed {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    async fn reregister(
        &self,
        existing: Workstation,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, RegistrarError> {
        let name = existing.name.as_str();
        let ip_changed = existing.ip_address != ip;

        tracing::info!(
            name,
            old_ip = %existing.ip_address,
            new_ip = ip,
            status = %existing.status,
            "Re-registering workstation"
        );

        match self.provider.upsert_record(name, ip, self.ttl).await {
            Ok(domain) => {
                let patch = WorkstationPatch {
                    ip_address: Some(ip.to_string()),
                    domain_name: Some(Some(domain)),
                    status: Some(WorkstationStatus::Starting),
                    state_changed_at: Some(now),
                    started_at: Some(Some(now)),
                    dns_error: Some(None),
                    unknown_since: Some(None),
                    terminated_at: Some(None),
                    ..Default::default()
                };
                self.apply(name, &patch).await?;

                let event = if ip_changed {
                    NewWorkstationEvent::new(name, WorkstationEventType::DnsUpdated).with_details(
                        format!("IP changed from {} to {}", existing.ip_address, ip),
                    )
                } else {
                    NewWorkstationEvent::new(name, WorkstationEventType::Registered)
                        .with_details("DNS registration retried")
                };
                self.storage
                    .append_event(
                        event.with_statuses(Some(existing.status), Some(WorkstationStatus::Starting)),
                    )
                    .await?;

                let ws = self
                    .storage
                    .get_workstation(name)
                    .await?
                    .ok_or_else(|| RegistrarError::NotFound(name.to_string()))?;

                Ok(RegistrationOutcome {
                    view: ws.into(),
                    created: false,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(name, ip, error = %reason, "DNS update failed");

                let patch = WorkstationPatch {
                    status: Some(WorkstationStatus::DnsFailed),
                    dns_error: Some(Some(reason.clone())),
                    state_changed_at: Some(now),
                    unknown_since: Some(None),
                    ..Default::default()
                };
                self.apply(name, &patch).await?;

                self.storage
                    .append_event(
                        NewWorkstationEvent::new(name, WorkstationEventType::DnsFailed)
                            .with_statuses(Some(existing.status), Some(WorkstationStatus::DnsFailed))
                            .with_details(reason.clone()),
                    )
                    .await?;

                Err(RegistrarError::DnsFailed {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    async fn apply(&self, name: &str, patch: &WorkstationPatch) -> Result<(), RegistrarError> {
        if self.storage.update_workstation(name, patch).await? {
            Ok(())
        } else {
            // Pruned between the read and the write.
            Err(RegistrarError::NotFound(name.to_string()))
        }
    }

    /// Check whether a workstation's domain resolves yet. Read-only.
    pub async fn check_propagation(&self, name: &str) -> Result<PropagationStatus, RegistrarError> {
        let ws = self
            .storage
            .get_workstation(name)
            .await?
            .ok_or_else(|| RegistrarError::NotFound(name.to_string()))?;

        let domain_name = ws
            .domain_name
            .ok_or_else(|| RegistrarError::NoDomain(name.to_string()))?;

        let propagated = self.resolver.resolves(&domain_name).await;

        Ok(PropagationStatus {
            name: ws.name,
            domain_name,
            propagated,
            checked_at: Utc::now(),
        })
    }
}
