//! In-memory storage implementation

use super::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use termfleet_types::{NewWorkstationEvent, Workstation, WorkstationEvent, WorkstationPatch};
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    workstations: Arc<RwLock<HashMap<String, Workstation>>>,
    events: Arc<RwLock<Vec<WorkstationEvent>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkstationStorage for InMemoryStorage {
    async fn list_workstations(&self, query: &WorkstationQuery) -> StorageResult<Vec<Workstation>> {
        let workstations = self.workstations.read().await;
        let mut matching: Vec<Workstation> = workstations
            .values()
            .filter(|ws| query.matches(ws))
            .cloned()
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));
        Ok(matching)
    }

    async fn get_workstation(&self, name: &str) -> StorageResult<Option<Workstation>> {
        let workstations = self.workstations.read().await;
        Ok(workstations.get(name).cloned())
    }

    async fn create_workstation(&self, workstation: Workstation) -> StorageResult<Workstation> {
        let mut workstations = self.workstations.write().await;
        if workstations.contains_key(&workstation.name) {
            return Err(StorageError::Conflict(format!(
                "Workstation {} already exists",
                workstation.name
            )));
        }
        workstations.insert(workstation.name.clone(), workstation.clone());
        Ok(workstation)
    }

    async fn update_workstation(
        &self,
        name: &str,
        patch: &WorkstationPatch,
    ) -> StorageResult<bool> {
        let mut workstations = self.workstations.write().await;
        match workstations.get_mut(name) {
            Some(ws) => {
                patch.apply(ws);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_workstation_if(
        &self,
        name: &str,
        expected: &WorkstationVersion,
        patch: &WorkstationPatch,
    ) -> StorageResult<ConditionalUpdate> {
        let mut workstations = self.workstations.write().await;
        match workstations.get_mut(name) {
            Some(ws) if expected.matches(ws) => {
                patch.apply(ws);
                Ok(ConditionalUpdate::Applied)
            }
            Some(_) => Ok(ConditionalUpdate::Changed),
            None => Ok(ConditionalUpdate::Missing),
        }
    }

    async fn delete_workstation(&self, name: &str) -> StorageResult<bool> {
        let mut workstations = self.workstations.write().await;
        let removed = workstations.remove(name).is_some();
        if removed {
            let mut events = self.events.write().await;
            events.retain(|e| e.workstation_id != name);
        }
        Ok(removed)
    }
}

#[async_trait]
impl EventStorage for InMemoryStorage {
    async fn append_event(&self, event: NewWorkstationEvent) -> StorageResult<WorkstationEvent> {
        let event = event.into_event(chrono::Utc::now());
        let mut events = self.events.write().await;
        events.push(event.clone());
        Ok(event)
    }

    async fn list_events(
        &self,
        workstation_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<WorkstationEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.workstation_id == workstation_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
