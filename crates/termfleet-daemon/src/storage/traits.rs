//! Storage trait definitions

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::str::FromStr;
use termfleet_types::{
    NewWorkstationEvent, Workstation, WorkstationEvent, WorkstationPatch, WorkstationStatus,
};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Number of events returned when the caller does not ask for a limit
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Combined storage trait
#[async_trait]
pub trait Storage: WorkstationStorage + EventStorage + Send + Sync {}

impl<T> Storage for T where T: WorkstationStorage + EventStorage + Send + Sync {}

/// Column a listing can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Status,
    CreatedAt,
    LastCheck,
}

impl SortField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Status => "status",
            SortField::CreatedAt => "created_at",
            SortField::LastCheck => "last_check",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortField::Name),
            "status" => Ok(SortField::Status),
            "created_at" => Ok(SortField::CreatedAt),
            "last_check" => Ok(SortField::LastCheck),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("unknown sort order: {}", s)),
        }
    }
}

/// Filter and ordering for workstation listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkstationQuery {
    pub status: Option<WorkstationStatus>,
    pub sort: Option<SortField>,
    pub order: SortOrder,
}

impl WorkstationQuery {
    /// Every workstation, in name order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: WorkstationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some(field);
        self.order = order;
        self
    }

    pub(crate) fn matches(&self, ws: &Workstation) -> bool {
        self.status.map_or(true, |status| ws.status == status)
    }

    /// Comparator used by backends that sort in process.
    ///
    /// Missing `last_check` values sort first, like SQL NULLs. Ties fall back
    /// to name order.
    pub(crate) fn compare(&self, a: &Workstation, b: &Workstation) -> Ordering {
        let primary = match self.sort.unwrap_or(SortField::Name) {
            SortField::Name => Ordering::Equal,
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::LastCheck => a.last_check.cmp(&b.last_check),
        }
        .then_with(|| a.name.cmp(&b.name));

        match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        }
    }
}

/// The fields a conditional update expects to find unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkstationVersion {
    pub status: WorkstationStatus,
    pub ip_address: String,
    pub state_changed_at: DateTime<Utc>,
}

impl WorkstationVersion {
    /// Version of a record as it was read
    pub fn of(ws: &Workstation) -> Self {
        Self {
            status: ws.status,
            ip_address: ws.ip_address.clone(),
            state_changed_at: ws.state_changed_at,
        }
    }

    pub fn matches(&self, ws: &Workstation) -> bool {
        ws.status == self.status
            && ws.ip_address == self.ip_address
            && ws.state_changed_at == self.state_changed_at
    }
}

/// Result of [`WorkstationStorage::update_workstation_if`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalUpdate {
    Applied,
    /// The record no longer matches the expected version; nothing was written
    Changed,
    Missing,
}

/// Storage for workstation records
#[async_trait]
pub trait WorkstationStorage: Send + Sync {
    /// List workstations matching the query
    async fn list_workstations(&self, query: &WorkstationQuery) -> StorageResult<Vec<Workstation>>;

    /// Get a workstation by name
    async fn get_workstation(&self, name: &str) -> StorageResult<Option<Workstation>>;

    /// Insert a new workstation; fails with `Conflict` if the name is taken
    async fn create_workstation(&self, workstation: Workstation) -> StorageResult<Workstation>;

    /// Apply a patch; returns false if the workstation does not exist
    async fn update_workstation(&self, name: &str, patch: &WorkstationPatch)
        -> StorageResult<bool>;

    /// Apply a patch only if the record still matches `expected`.
    ///
    /// The comparison and the write happen under the same write guard, so no
    /// other writer can land in between.
    async fn update_workstation_if(
        &self,
        name: &str,
        expected: &WorkstationVersion,
        patch: &WorkstationPatch,
    ) -> StorageResult<ConditionalUpdate>;

    /// Delete a workstation and its events
    async fn delete_workstation(&self, name: &str) -> StorageResult<bool>;
}

/// Append-only storage for audit events
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Store an event, assigning its id and timestamp
    async fn append_event(&self, event: NewWorkstationEvent) -> StorageResult<WorkstationEvent>;

    /// Events of one workstation, newest first
    async fn list_events(
        &self,
        workstation_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<WorkstationEvent>>;
}
