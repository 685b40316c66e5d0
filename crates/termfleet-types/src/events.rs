//! Workstation audit events
//!
//! Events are append-only. One is written for every registration attempt and
//! for every transition that changes a workstation's status. Heartbeat
//! refreshes that keep the status unchanged are not audited.

use crate::WorkstationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkstationEventType {
    /// Workstation registered with a confirmed DNS record
    Registered,
    /// Status changed after a health probe
    StatusChanged,
    /// DNS record moved to a new address
    DnsUpdated,
    /// DNS upsert failed
    DnsFailed,
}

impl WorkstationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkstationEventType::Registered => "registered",
            WorkstationEventType::StatusChanged => "status_changed",
            WorkstationEventType::DnsUpdated => "dns_updated",
            WorkstationEventType::DnsFailed => "dns_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(WorkstationEventType::Registered),
            "status_changed" => Some(WorkstationEventType::StatusChanged),
            "dns_updated" => Some(WorkstationEventType::DnsUpdated),
            "dns_failed" => Some(WorkstationEventType::DnsFailed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkstationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkstationEvent {
    pub id: Uuid,
    pub workstation_id: String,
    pub event_type: WorkstationEventType,
    pub old_status: Option<WorkstationStatus>,
    pub new_status: Option<WorkstationStatus>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An event before the store assigns its id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkstationEvent {
    pub workstation_id: String,
    pub event_type: WorkstationEventType,
    pub old_status: Option<WorkstationStatus>,
    pub new_status: Option<WorkstationStatus>,
    pub details: Option<String>,
}

impl NewWorkstationEvent {
    pub fn new(workstation_id: impl Into<String>, event_type: WorkstationEventType) -> Self {
        Self {
            workstation_id: workstation_id.into(),
            event_type,
            old_status: None,
            new_status: None,
            details: None,
        }
    }

    /// Status change recorded by the reconciler
    pub fn status_changed(
        workstation_id: impl Into<String>,
        old_status: WorkstationStatus,
        new_status: WorkstationStatus,
        probe_succeeded: bool,
    ) -> Self {
        Self::new(workstation_id, WorkstationEventType::StatusChanged)
            .with_statuses(Some(old_status), Some(new_status))
            .with_details(format!(
                "Health check: {}",
                if probe_succeeded { "success" } else { "failed" }
            ))
    }

    pub fn with_statuses(
        mut self,
        old_status: Option<WorkstationStatus>,
        new_status: Option<WorkstationStatus>,
    ) -> Self {
        self.old_status = old_status;
        self.new_status = new_status;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Materialize the event with a fresh id
    pub fn into_event(self, timestamp: DateTime<Utc>) -> WorkstationEvent {
        WorkstationEvent {
            id: Uuid::new_v4(),
            workstation_id: self.workstation_id,
            event_type: self.event_type,
            old_status: self.old_status,
            new_status: self.new_status,
            details: self.details,
            timestamp,
        }
    }
}
