use crate::domain::models::BreakRecord;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait BreakStateRepository: Send + Sync {
    fn load(&self) -> Result<Option<BreakRecord>, InfraError>;
    fn save(&self, record: &BreakRecord) -> Result<(), InfraError>;
    fn mark_inactive(&self) -> Result<(), InfraError>;
    /// Forces an active record inactive and returns it as it was before the reset.
    fn deactivate_stale(&self) -> Result<Option<BreakRecord>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteBreakStateRepository {
    db_path: PathBuf,
}

impl SqliteBreakStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl BreakStateRepository for SqliteBreakStateRepository {
    fn load(&self) -> Result<Option<BreakRecord>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(Option<String>, Option<String>, Option<String>, bool)> = connection
            .query_row(
                "SELECT start_timestamp, start_date, start_time, is_active FROM break_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((Some(start_timestamp_raw), Some(start_date), Some(start_time), is_active)) = row
        else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&start_timestamp_raw).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid break_state.start_timestamp '{}': {error}",
                start_timestamp_raw
            ))
        })?;

        let record = BreakRecord {
            start_timestamp: parsed.with_timezone(&Utc),
            start_date,
            start_time,
            is_active,
        };
        record
            .validate()
            .map_err(|message| InfraError::InvalidConfig(format!("corrupted break_state row: {message}")))?;
        Ok(Some(record))
    }

    fn save(&self, record: &BreakRecord) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO break_state (id, start_timestamp, start_date, start_time, is_active)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               start_timestamp = excluded.start_timestamp,
               start_date = excluded.start_date,
               start_time = excluded.start_time,
               is_active = excluded.is_active",
            params![
                record.start_timestamp.to_rfc3339(),
                record.start_date,
                record.start_time,
                record.is_active
            ],
        )?;
        Ok(())
    }

    fn mark_inactive(&self) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("UPDATE break_state SET is_active = 0 WHERE id = 1", [])?;
        Ok(())
    }

    fn deactivate_stale(&self) -> Result<Option<BreakRecord>, InfraError> {
        let stale = self.load()?.filter(|record| record.is_active);
        if stale.is_some() {
            self.mark_inactive()?;
        }
        Ok(stale)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBreakStateRepository {
    state: Mutex<Option<BreakRecord>>,
}

impl InMemoryBreakStateRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<BreakRecord>>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("break state lock poisoned: {error}")))
    }
}

impl BreakStateRepository for InMemoryBreakStateRepository {
    fn load(&self) -> Result<Option<BreakRecord>, InfraError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, record: &BreakRecord) -> Result<(), InfraError> {
        *self.lock()? = Some(record.clone());
        Ok(())
    }

    fn mark_inactive(&self) -> Result<(), InfraError> {
        if let Some(record) = self.lock()?.as_mut() {
            record.is_active = false;
        }
        Ok(())
    }

    fn deactivate_stale(&self) -> Result<Option<BreakRecord>, InfraError> {
        let mut state = self.lock()?;
        let stale = state.clone().filter(|record| record.is_active);
        if let Some(record) = state.as_mut() {
            record.is_active = false;
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_ID: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        dir: PathBuf,
        path: PathBuf,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "breaklog-state-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp directory");
            let path = dir.join("breaks.sqlite");
            initialize_database(&path).expect("initialize database");
            Self { dir, path }
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn sample_record(timestamp: &str) -> BreakRecord {
        let instant = DateTime::parse_from_rfc3339(timestamp)
            .expect("valid RFC3339")
            .with_timezone(&Utc);
        BreakRecord::started_at(instant, &Utc)
    }

    #[test]
    fn sqlite_load_returns_none_before_first_break() {
        let db = TempDatabase::new();
        let repo = SqliteBreakStateRepository::new(&db.path);
        assert_eq!(repo.load().expect("load"), None);
    }

    #[test]
    fn sqlite_save_overwrites_the_singleton_row() {
        let db = TempDatabase::new();
        let repo = SqliteBreakStateRepository::new(&db.path);

        repo.save(&sample_record("2024-03-01T09:00:00Z")).expect("save first");
        let second = sample_record("2024-03-01T11:15:30Z");
        repo.save(&second).expect("save second");

        assert_eq!(repo.load().expect("load"), Some(second));
        let connection = Connection::open(&db.path).expect("open db");
        let rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM break_state", [], |row| row.get(0))
            .expect("count rows");
        assert_eq!(rows, 1);
    }

    #[test]
    fn sqlite_mark_inactive_keeps_start_fields() {
        let db = TempDatabase::new();
        let repo = SqliteBreakStateRepository::new(&db.path);
        repo.save(&sample_record("2024-03-01T09:00:00Z")).expect("save");

        repo.mark_inactive().expect("mark inactive");

        let loaded = repo.load().expect("load").expect("record exists");
        assert!(!loaded.is_active);
        assert_eq!(loaded.start_time, "09:00:00");
    }

    #[test]
    fn sqlite_deactivate_stale_reports_the_lost_break_once() {
        let db = TempDatabase::new();
        let repo = SqliteBreakStateRepository::new(&db.path);
        let record = sample_record("2024-03-01T09:00:00Z");
        repo.save(&record).expect("save");

        let reopened = SqliteBreakStateRepository::new(&db.path);
        assert_eq!(reopened.deactivate_stale().expect("first reset"), Some(record));
        assert_eq!(reopened.deactivate_stale().expect("second reset"), None);
        assert!(!reopened.load().expect("load").expect("record exists").is_active);
    }

    #[test]
    fn sqlite_load_rejects_corrupted_row() {
        let db = TempDatabase::new();
        let connection = Connection::open(&db.path).expect("open db");
        connection
            .execute(
                "INSERT INTO break_state (id, start_timestamp, start_date, start_time, is_active)
                 VALUES (1, '2024-03-01T09:00:00+00:00', '2024-03-01', '9am', 1)",
                [],
            )
            .expect("seed corrupted row");

        let repo = SqliteBreakStateRepository::new(&db.path);

        assert!(matches!(
            repo.load(),
            Err(InfraError::InvalidConfig(message)) if message.contains("corrupted break_state row")
        ));
    }

    #[test]
    fn in_memory_repository_matches_sqlite_semantics() {
        let repo = InMemoryBreakStateRepository::default();
        assert_eq!(repo.deactivate_stale().expect("reset empty"), None);

        let record = sample_record("2024-03-01T09:00:00Z");
        repo.save(&record).expect("save");
        assert_eq!(repo.deactivate_stale().expect("reset"), Some(record));
        assert!(!repo.load().expect("load").expect("record exists").is_active);
    }
}
