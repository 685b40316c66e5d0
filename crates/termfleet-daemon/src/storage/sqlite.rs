//! SQLite storage implementation

use super::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use termfleet_types::{
    NewWorkstationEvent, Workstation, WorkstationEvent, WorkstationEventType, WorkstationPatch,
    WorkstationStatus,
};
use tokio::sync::Mutex;
use uuid::Uuid;

const WORKSTATION_COLUMNS: &str = "id, name, ip_address, domain_name, status, created_at, \
     last_check, state_changed_at, dns_error, started_at, unknown_since, terminated_at";

/// SQLite-backed storage
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    // Serializes read-modify-write cycles; SQLite allows one writer anyway.
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStorage {
    /// Open (creating if missing) the database file and initialize schema
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS workstations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                ip_address TEXT NOT NULL,
                domain_name TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_check TEXT,
                state_changed_at TEXT NOT NULL,
                dns_error TEXT,
                started_at TEXT,
                unknown_since TEXT,
                terminated_at TEXT
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS workstations_status ON workstations(status);"#,
            r#"
            CREATE TABLE IF NOT EXISTS workstation_events (
                id TEXT PRIMARY KEY,
                workstation_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                old_status TEXT,
                new_status TEXT,
                details TEXT,
                timestamp TEXT NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS workstation_events_workstation ON workstation_events(workstation_id, timestamp DESC);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        Ok(())
    }

    // Read, compare, patch and write inside one transaction under the write lock.
    async fn patch_workstation(
        &self,
        name: &str,
        expected: Option<&WorkstationVersion>,
        patch: &WorkstationPatch,
    ) -> StorageResult<ConditionalUpdate> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let sql = format!("SELECT {} FROM workstations WHERE name = ?", WORKSTATION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(ConditionalUpdate::Missing);
        };
        let current = Self::row_to_workstation(&row)?;
        if expected.is_some_and(|version| !version.matches(&current)) {
            return Ok(ConditionalUpdate::Changed);
        }
        let ws = current.patched(patch);

        sqlx::query(
            r#"
            UPDATE workstations SET
                ip_address = ?,
                domain_name = ?,
                status = ?,
                last_check = ?,
                state_changed_at = ?,
                dns_error = ?,
                started_at = ?,
                unknown_since = ?,
                terminated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&ws.ip_address)
        .bind(&ws.domain_name)
        .bind(ws.status.as_str())
        .bind(ws.last_check)
        .bind(ws.state_changed_at)
        .bind(&ws.dns_error)
        .bind(ws.started_at)
        .bind(ws.unknown_since)
        .bind(ws.terminated_at)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(ConditionalUpdate::Applied)
    }

    fn parse_status(value: &str) -> Result<WorkstationStatus, StorageError> {
        value
            .parse()
            .map_err(|e: termfleet_types::ParseStatusError| StorageError::InvalidData(e.to_string()))
    }

    fn parse_optional_status(value: Option<String>) -> Result<Option<WorkstationStatus>, StorageError> {
        value.as_deref().map(Self::parse_status).transpose()
    }

    fn row_to_workstation(row: &SqliteRow) -> Result<Workstation, StorageError> {
        let get_err = |e: sqlx::Error| StorageError::Query(e.to_string());
        let status: String = row.try_get("status").map_err(get_err)?;

        Ok(Workstation {
            id: row.try_get("id").map_err(get_err)?,
            name: row.try_get("name").map_err(get_err)?,
            ip_address: row.try_get("ip_address").map_err(get_err)?,
            domain_name: row.try_get("domain_name").map_err(get_err)?,
            status: Self::parse_status(&status)?,
            created_at: row.try_get("created_at").map_err(get_err)?,
            last_check: row.try_get("last_check").map_err(get_err)?,
            state_changed_at: row.try_get("state_changed_at").map_err(get_err)?,
            dns_error: row.try_get("dns_error").map_err(get_err)?,
            started_at: row.try_get("started_at").map_err(get_err)?,
            unknown_since: row.try_get("unknown_since").map_err(get_err)?,
            terminated_at: row.try_get("terminated_at").map_err(get_err)?,
        })
    }

    fn row_to_event(row: &SqliteRow) -> Result<WorkstationEvent, StorageError> {
        let get_err = |e: sqlx::Error| StorageError::Query(e.to_string());
        let id: String = row.try_get("id").map_err(get_err)?;
        let event_type: String = row.try_get("event_type").map_err(get_err)?;

        Ok(WorkstationEvent {
            id: Uuid::parse_str(&id).map_err(|e| StorageError::InvalidData(e.to_string()))?,
            workstation_id: row.try_get("workstation_id").map_err(get_err)?,
            event_type: WorkstationEventType::parse(&event_type).ok_or_else(|| {
                StorageError::InvalidData(format!("unknown event type: {}", event_type))
            })?,
            old_status: Self::parse_optional_status(row.try_get("old_status").map_err(get_err)?)?,
            new_status: Self::parse_optional_status(row.try_get("new_status").map_err(get_err)?)?,
            details: row.try_get("details").map_err(get_err)?,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp").map_err(get_err)?,
        })
    }
}

#[async_trait]
impl WorkstationStorage for SqliteStorage {
    async fn list_workstations(&self, query: &WorkstationQuery) -> StorageResult<Vec<Workstation>> {
        let field = query.sort.unwrap_or(SortField::Name);
        let direction = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let order_by = match field {
            SortField::Name => format!("name {}", direction),
            other => format!("{} {}, name {}", other.column(), direction, direction),
        };

        let rows = match query.status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM workstations WHERE status = ? ORDER BY {}",
                    WORKSTATION_COLUMNS, order_by
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM workstations ORDER BY {}",
                    WORKSTATION_COLUMNS, order_by
                );
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(Self::row_to_workstation).collect()
    }

    async fn get_workstation(&self, name: &str) -> StorageResult<Option<Workstation>> {
        let sql = format!("SELECT {} FROM workstations WHERE name = ?", WORKSTATION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(Self::row_to_workstation).transpose()
    }

    async fn create_workstation(&self, workstation: Workstation) -> StorageResult<Workstation> {
        let _guard = self.write_lock.lock().await;

        let sql = format!(
            "INSERT INTO workstations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            WORKSTATION_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&workstation.id)
            .bind(&workstation.name)
            .bind(&workstation.ip_address)
            .bind(&workstation.domain_name)
            .bind(workstation.status.as_str())
            .bind(workstation.created_at)
            .bind(workstation.last_check)
            .bind(workstation.state_changed_at)
            .bind(&workstation.dns_error)
            .bind(workstation.started_at)
            .bind(workstation.unknown_since)
            .bind(workstation.terminated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict(
                    format!("Workstation {} already exists", workstation.name),
                ),
                other => StorageError::Query(other.to_string()),
            })?;

        Ok(workstation)
    }

    async fn update_workstation(
        &self,
        name: &str,
        patch: &WorkstationPatch,
    ) -> StorageResult<bool> {
        let outcome = self.patch_workstation(name, None, patch).await?;
        Ok(outcome == ConditionalUpdate::Applied)
    }

    async fn update_workstation_if(
        &self,
        name: &str,
        expected: &WorkstationVersion,
        patch: &WorkstationPatch,
    ) -> StorageResult<ConditionalUpdate> {
        self.patch_workstation(name, Some(expected), patch).await
    }

    async fn delete_workstation(&self, name: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        sqlx::query("DELETE FROM workstation_events WHERE workstation_id = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let result = sqlx::query("DELETE FROM workstations WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EventStorage for SqliteStorage {
    async fn append_event(&self, event: NewWorkstationEvent) -> StorageResult<WorkstationEvent> {
        let event = event.into_event(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO workstation_events
                (id, workstation_id, event_type, old_status, new_status, details, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.workstation_id)
        .bind(event.event_type.as_str())
        .bind(event.old_status.map(|s| s.as_str()))
        .bind(event.new_status.map(|s| s.as_str()))
        .bind(&event.details)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(event)
    }

    async fn list_events(
        &self,
        workstation_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<WorkstationEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, workstation_id, event_type, old_status, new_status, details, timestamp
            FROM workstation_events
            WHERE workstation_id = ?
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(workstation_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(Self::row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    struct TempDb {
        path: std::path::PathBuf,
    }

    impl TempDb {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("termfleet-test-{}.db", Uuid::new_v4()));
            Self { path }
        }

        async fn open(&self) -> SqliteStorage {
            SqliteStorage::connect(self.path.to_str().unwrap(), 2)
                .await
                .unwrap()
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = self.path.clone().into_os_string();
                path.push(suffix);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    fn desk(name: &str, now: DateTime<Utc>) -> Workstation {
        Workstation::starting(name, "10.0.0.5", format!("{}.fleet.example", name), now)
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();

        let created = storage.create_workstation(desk("desk1", now)).await.unwrap();
        let loaded = storage.get_workstation("desk1").await.unwrap().unwrap();

        assert_eq!(loaded, created);
        assert!(storage.get_workstation("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();

        storage.create_workstation(desk("desk1", now)).await.unwrap();
        let err = storage
            .create_workstation(desk("desk1", now))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_applies_patch_monotonically() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();
        storage.create_workstation(desk("desk1", now)).await.unwrap();

        let patch = WorkstationPatch {
            status: Some(WorkstationStatus::Online),
            last_check: Some(Some(now)),
            state_changed_at: Some(now - ChronoDuration::seconds(60)),
            ..Default::default()
        };
        assert!(storage.update_workstation("desk1", &patch).await.unwrap());
        assert!(!storage.update_workstation("ghost", &patch).await.unwrap());

        let ws = storage.get_workstation("desk1").await.unwrap().unwrap();
        assert_eq!(ws.status, WorkstationStatus::Online);
        assert_eq!(ws.last_check, Some(now));
        assert_eq!(ws.state_changed_at, now);
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_stale_version() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();
        let ws = storage.create_workstation(desk("desk1", now)).await.unwrap();
        let read = WorkstationVersion::of(&ws);

        // Another writer moves the address first.
        let moved = WorkstationPatch {
            ip_address: Some("10.0.0.9".to_string()),
            ..Default::default()
        };
        assert!(storage.update_workstation("desk1", &moved).await.unwrap());

        let stale = WorkstationPatch {
            status: Some(WorkstationStatus::Terminated),
            terminated_at: Some(Some(now)),
            ..Default::default()
        };
        assert_eq!(
            storage.update_workstation_if("desk1", &read, &stale).await.unwrap(),
            ConditionalUpdate::Changed
        );
        let current = storage.get_workstation("desk1").await.unwrap().unwrap();
        assert_eq!(current.status, WorkstationStatus::Starting);
        assert_eq!(current.terminated_at, None);

        let fresh = WorkstationVersion::of(&current);
        assert_eq!(
            storage.update_workstation_if("desk1", &fresh, &stale).await.unwrap(),
            ConditionalUpdate::Applied
        );
        assert_eq!(
            storage.update_workstation_if("ghost", &fresh, &stale).await.unwrap(),
            ConditionalUpdate::Missing
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_and_events_order() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();
        storage.create_workstation(desk("desk1", now)).await.unwrap();

        for details in ["first", "second", "third"] {
            storage
                .append_event(
                    NewWorkstationEvent::new("desk1", WorkstationEventType::StatusChanged)
                        .with_statuses(
                            Some(WorkstationStatus::Starting),
                            Some(WorkstationStatus::Online),
                        )
                        .with_details(details),
                )
                .await
                .unwrap();
        }

        let events = storage.list_events("desk1", 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details.as_deref(), Some("third"));
        assert_eq!(events[0].old_status, Some(WorkstationStatus::Starting));

        assert!(storage.delete_workstation("desk1").await.unwrap());
        assert!(storage.list_events("desk1", 10).await.unwrap().is_empty());
        assert!(storage.get_workstation("desk1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_status_and_sort() {
        let db = TempDb::new();
        let storage = db.open().await;
        let now = Utc::now();

        let mut old = desk("alpha", now - ChronoDuration::minutes(5));
        old.status = WorkstationStatus::Online;
        let mut young = desk("bravo", now);
        young.status = WorkstationStatus::Online;
        storage.create_workstation(young).await.unwrap();
        storage.create_workstation(old).await.unwrap();
        storage.create_workstation(desk("charlie", now)).await.unwrap();

        let newest_first = storage
            .list_workstations(
                &WorkstationQuery::all()
                    .with_status(WorkstationStatus::Online)
                    .sorted_by(SortField::CreatedAt, SortOrder::Desc),
            )
            .await
            .unwrap();
        let names: Vec<_> = newest_first.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["bravo", "alpha"]);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let db = TempDb::new();
        {
            let storage = db.open().await;
            storage
                .create_workstation(desk("desk1", Utc::now()))
                .await
                .unwrap();
            storage.pool.close().await;
        }

        let storage = db.open().await;
        assert!(storage.get_workstation("desk1").await.unwrap().is_some());
    }
}
