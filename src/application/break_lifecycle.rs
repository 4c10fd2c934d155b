use crate::application::NowProvider;
use crate::domain::models::{format_elapsed, BreakEntry, BreakRecord, RestartPolicy, TIME_FORMAT};
use crate::infrastructure::break_state_repository::BreakStateRepository;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendedRow {
    pub row_index: u32,
    pub range: String,
}

/// Write-only destination for finished breaks.
#[async_trait]
pub trait BreakLedger: Send + Sync {
    fn ensure_ready(&self) -> Result<(), InfraError>;
    async fn append_break(&self, entry: &BreakEntry) -> Result<AppendedRow, InfraError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BreakStatus {
    Active {
        start_date: String,
        start_time: String,
        start_timestamp: f64,
    },
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedBreak {
    pub entry: BreakEntry,
    pub row: AppendedRow,
    pub elapsed_seconds: i64,
}

impl EndedBreak {
    pub fn elapsed(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }
}

pub struct BreakController {
    repository: Arc<dyn BreakStateRepository>,
    ledger: Arc<dyn BreakLedger>,
    timezone: Tz,
    restart_policy: RestartPolicy,
    now_provider: NowProvider,
    transition: Mutex<()>,
}

impl BreakController {
    pub fn new(repository: Arc<dyn BreakStateRepository>, ledger: Arc<dyn BreakLedger>) -> Self {
        Self {
            repository,
            ledger,
            timezone: Tz::UTC,
            restart_policy: RestartPolicy::default(),
            now_provider: Arc::new(Utc::now),
            transition: Mutex::new(()),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_restart_policy(mut self, restart_policy: RestartPolicy) -> Self {
        self.restart_policy = restart_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Deactivates a break left running by a previous process. Its end data is lost.
    pub fn recover_on_startup(&self) -> Result<Option<BreakRecord>, InfraError> {
        let stale = self.repository.deactivate_stale()?;
        if let Some(record) = &stale {
            warn!(
                start_date = %record.start_date,
                start_time = %record.start_time,
                "discarded break left active by a previous run"
            );
        }
        Ok(stale)
    }

    /// Runs a store call on the blocking pool.
    async fn with_repository<T, F>(&self, operation: F) -> Result<T, InfraError>
    where
        F: FnOnce(&dyn BreakStateRepository) -> Result<T, InfraError> + Send + 'static,
        T: Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || operation(repository.as_ref()))
            .await
            .map_err(|error| InfraError::InvalidConfig(format!("break state task failed: {error}")))?
    }

    async fn active_record(&self) -> Result<Option<BreakRecord>, InfraError> {
        let record = self.with_repository(|repository| repository.load()).await?;
        Ok(record.filter(|record| record.is_active))
    }

    pub async fn start(&self) -> Result<BreakRecord, InfraError> {
        let _guard = self.transition.lock().await;
        self.ledger.ensure_ready()?;

        if let Some(current) = self.active_record().await? {
            match self.restart_policy {
                RestartPolicy::Reject => return Err(InfraError::BreakAlreadyActive),
                RestartPolicy::Overwrite => warn!(
                    start_date = %current.start_date,
                    start_time = %current.start_time,
                    "overwriting active break"
                ),
            }
        }

        let record = BreakRecord::started_at((self.now_provider)(), &self.timezone);
        let stored = record.clone();
        self.with_repository(move |repository| repository.save(&stored)).await?;
        info!(start_date = %record.start_date, start_time = %record.start_time, "break started");
        Ok(record)
    }

    pub async fn end(&self, reason: &str) -> Result<EndedBreak, InfraError> {
        let _guard = self.transition.lock().await;
        self.ledger.ensure_ready()?;

        let Some(record) = self.active_record().await? else {
            return Err(InfraError::NoActiveBreak);
        };

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(InfraError::Validation("reason required".to_string()));
        }

        let now = (self.now_provider)();
        let entry = BreakEntry {
            date: record.start_date.clone(),
            start_time: record.start_time.clone(),
            end_time: now
                .with_timezone(&self.timezone)
                .format(TIME_FORMAT)
                .to_string(),
            reason: reason.to_string(),
        };

        let row = self.ledger.append_break(&entry).await?;
        self.with_repository(|repository| repository.mark_inactive()).await?;

        let ended = EndedBreak {
            entry,
            row,
            elapsed_seconds: (now - record.start_timestamp).num_seconds(),
        };
        info!(row = ended.row.row_index, elapsed = %ended.elapsed(), "break ended");
        Ok(ended)
    }

    pub async fn status(&self) -> Result<BreakStatus, InfraError> {
        Ok(match self.active_record().await? {
            Some(record) => BreakStatus::Active {
                start_timestamp: record.start_epoch_seconds(),
                start_date: record.start_date,
                start_time: record.start_time,
            },
            None => BreakStatus::Inactive,
        })
    }
}
