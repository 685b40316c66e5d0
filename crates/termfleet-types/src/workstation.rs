//! Workstation records
//!
//! A Workstation is one member of the fleet. Its `name` is unique, immutable
//! and doubles as the DNS label under the fleet's base domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a workstation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkstationStatus {
    /// Registered with DNS, waiting for the first successful probe
    Starting,
    /// Responding to probes
    Online,
    /// Stopped responding; may still recover
    Unknown,
    /// DNS registration failed; only a new registration can leave this state
    DnsFailed,
    /// Presumed dead; pruned once the post-termination grace period expires
    Terminated,
}

impl WorkstationStatus {
    pub const ALL: [WorkstationStatus; 5] = [
        WorkstationStatus::Starting,
        WorkstationStatus::Online,
        WorkstationStatus::Unknown,
        WorkstationStatus::DnsFailed,
        WorkstationStatus::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkstationStatus::Starting => "starting",
            WorkstationStatus::Online => "online",
            WorkstationStatus::Unknown => "unknown",
            WorkstationStatus::DnsFailed => "dns_failed",
            WorkstationStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for WorkstationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workstation status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for WorkstationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkstationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// A tracked remote host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    /// Record identifier; equal to `name`
    pub id: String,

    /// Unique, immutable name; also the DNS label
    pub name: String,

    /// Current network address
    pub ip_address: String,

    /// Fully-qualified subdomain, absent if never registered
    pub domain_name: Option<String>,

    /// Current lifecycle status
    pub status: WorkstationStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Most recent successful probe
    pub last_check: Option<DateTime<Utc>>,

    /// Last status change
    pub state_changed_at: DateTime<Utc>,

    /// Last DNS failure message, only while DNS_FAILED
    pub dns_error: Option<String>,

    /// Set when entering STARTING
    pub started_at: Option<DateTime<Utc>>,

    /// Set when entering UNKNOWN, cleared on recovery
    pub unknown_since: Option<DateTime<Utc>>,

    /// Set when entering TERMINATED
    pub terminated_at: Option<DateTime<Utc>>,
}

impl Workstation {
    /// A freshly registered workstation whose DNS record was written
    pub fn starting(
        name: impl Into<String>,
        ip_address: impl Into<String>,
        domain_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            ip_address: ip_address.into(),
            domain_name: Some(domain_name.into()),
            status: WorkstationStatus::Starting,
            created_at: now,
            last_check: None,
            state_changed_at: now,
            dns_error: None,
            started_at: Some(now),
            unknown_since: None,
            terminated_at: None,
        }
    }

    /// A freshly registered workstation whose DNS upsert failed.
    ///
    /// `domain_name` is the derived but unconfirmed subdomain.
    pub fn dns_failed(
        name: impl Into<String>,
        ip_address: impl Into<String>,
        domain_name: impl Into<String>,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: WorkstationStatus::DnsFailed,
            dns_error: Some(error.into()),
            ..Self::starting(name, ip_address, domain_name, now)
        }
    }

    /// Apply a patch, returning the updated record
    pub fn patched(mut self, patch: &WorkstationPatch) -> Self {
        patch.apply(&mut self);
        self
    }
}

/// Partial update of a workstation record.
///
/// `None` leaves a field untouched. For nullable columns `Some(None)` clears
/// the value. Timestamps never move backwards: when both the stored and the
/// patched value are set, the later of the two is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkstationPatch {
    pub ip_address: Option<String>,
    pub domain_name: Option<Option<String>>,
    pub status: Option<WorkstationStatus>,
    pub last_check: Option<Option<DateTime<Utc>>>,
    pub state_changed_at: Option<DateTime<Utc>>,
    pub dns_error: Option<Option<String>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub unknown_since: Option<Option<DateTime<Utc>>>,
    pub terminated_at: Option<Option<DateTime<Utc>>>,
}

impl WorkstationPatch {
    /// Apply the patch in place
    pub fn apply(&self, ws: &mut Workstation) {
        if let Some(ip) = &self.ip_address {
            ws.ip_address = ip.clone();
        }
        if let Some(domain) = &self.domain_name {
            ws.domain_name = domain.clone();
        }
        if let Some(status) = self.status {
            ws.status = status;
        }
        if let Some(at) = self.state_changed_at {
            ws.state_changed_at = ws.state_changed_at.max(at);
        }
        if let Some(error) = &self.dns_error {
            ws.dns_error = error.clone();
        }
        apply_timestamp(&mut ws.last_check, self.last_check);
        apply_timestamp(&mut ws.started_at, self.started_at);
        apply_timestamp(&mut ws.unknown_since, self.unknown_since);
        apply_timestamp(&mut ws.terminated_at, self.terminated_at);
    }
}

fn apply_timestamp(field: &mut Option<DateTime<Utc>>, update: Option<Option<DateTime<Utc>>>) {
    match update {
        None => {}
        Some(None) => *field = None,
        Some(Some(at)) => *field = Some(field.map_or(at, |old| old.max(at))),
    }
}

/// Workstation as exposed through the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkstationView {
    #[serde(flatten)]
    pub workstation: Workstation,

    /// Browser terminal URL, when a domain is known
    pub ttyd_url: Option<String>,
}

impl From<Workstation> for WorkstationView {
    fn from(workstation: Workstation) -> Self {
        let ttyd_url = workstation
            .domain_name
            .as_ref()
            .map(|domain| format!("https://{}", domain));
        Self {
            workstation,
            ttyd_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(now: DateTime<Utc>) -> Workstation {
        Workstation::starting("desk1", "10.0.0.5", "desk1.fleet.example", now)
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in WorkstationStatus::ALL {
            assert_eq!(status.as_str().parse::<WorkstationStatus>(), Ok(status));
        }
        assert_eq!("DNS_FAILED".parse::<WorkstationStatus>(), Ok(WorkstationStatus::DnsFailed));
        assert!("removed".parse::<WorkstationStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkstationStatus::DnsFailed).unwrap();
        assert_eq!(json, "\"dns_failed\"");
    }

    #[test]
    fn test_dns_failed_constructor() {
        let now = Utc::now();
        let ws = Workstation::dns_failed("desk1", "10.0.0.5", "desk1.fleet.example", "boom", now);
        assert_eq!(ws.status, WorkstationStatus::DnsFailed);
        assert_eq!(ws.dns_error.as_deref(), Some("boom"));
        assert_eq!(ws.domain_name.as_deref(), Some("desk1.fleet.example"));
        assert_eq!(ws.id, "desk1");
    }

    #[test]
    fn test_patch_clears_nullable_fields() {
        let now = Utc::now();
        let mut ws = sample(now);
        ws.unknown_since = Some(now);
        ws.dns_error = Some("old".into());

        let patch = WorkstationPatch {
            unknown_since: Some(None),
            dns_error: Some(None),
            ..Default::default()
        };
        patch.apply(&mut ws);

        assert!(ws.unknown_since.is_none());
        assert!(ws.dns_error.is_none());
    }

    #[test]
    fn test_patch_never_moves_timestamps_backwards() {
        let now = Utc::now();
        let mut ws = sample(now);
        ws.last_check = Some(now);

        let earlier = now - Duration::seconds(30);
        let patch = WorkstationPatch {
            last_check: Some(Some(earlier)),
            state_changed_at: Some(earlier),
            ..Default::default()
        };
        patch.apply(&mut ws);

        assert_eq!(ws.last_check, Some(now));
        assert_eq!(ws.state_changed_at, now);
    }

    #[test]
    fn test_view_derives_ttyd_url() {
        let now = Utc::now();
        let view = WorkstationView::from(sample(now));
        assert_eq!(view.ttyd_url.as_deref(), Some("https://desk1.fleet.example"));

        let mut ws = sample(now);
        ws.domain_name = None;
        assert!(WorkstationView::from(ws).ttyd_url.is_none());
    }

    #[test]
    fn test_view_flattens_record() {
        let view = WorkstationView::from(sample(Utc::now()));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["name"], "desk1");
        assert_eq!(json["status"], "starting");
        assert_eq!(json["ttyd_url"], "https://desk1.fleet.example");
    }
}
