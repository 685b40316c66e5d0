//! Storage layer for termfleet-daemon
//!
//! Workstation records plus their append-only audit log.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{
    ConditionalUpdate, EventStorage, SortField, SortOrder, Storage, StorageResult,
    WorkstationQuery, WorkstationStorage, WorkstationVersion, DEFAULT_EVENT_LIMIT,
};

use crate::config::StorageConfig;
use std::sync::Arc;

/// Build the storage backend selected in configuration
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageConfig::Sqlite {
            path,
            max_connections,
        } => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        crate::error::StorageError::Connection(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            let storage = SqliteStorage::connect(path, *max_connections).await?;
            tracing::info!(path = %path, "Using SQLite storage");
            Ok(Arc::new(storage))
        }
    }
}
