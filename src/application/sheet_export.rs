use crate::application::break_lifecycle::{AppendedRow, BreakLedger};
use crate::application::oauth::AccessTokenProvider;
use crate::domain::models::BreakEntry;
use crate::infrastructure::config::{RemoteWriteSettings, SheetLayout};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_sheets_client::GoogleSheetsClient;
use crate::infrastructure::row_mapper::{column_range, encode_break_row, find_first_empty_row, row_range};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 500,
        }
    }
}

impl From<&RemoteWriteSettings> for RetryPolicy {
    fn from(settings: &RemoteWriteSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
        }
    }
}

pub struct ExportTarget<P> {
    pub spreadsheet_id: String,
    pub token_provider: Arc<P>,
}

/// Appends finished breaks to the spreadsheet. An unconfigured exporter keeps the reason so
/// every call can report it.
pub struct SpreadsheetExporter<C, P>
where
    C: GoogleSheetsClient,
    P: AccessTokenProvider,
{
    sheets_client: Arc<C>,
    target: Result<ExportTarget<P>, String>,
    layout: SheetLayout,
    retry_policy: RetryPolicy,
}

impl<C, P> SpreadsheetExporter<C, P>
where
    C: GoogleSheetsClient,
    P: AccessTokenProvider,
{
    pub fn new(sheets_client: Arc<C>, target: Result<ExportTarget<P>, String>, layout: SheetLayout) -> Self {
        Self {
            sheets_client,
            target,
            layout,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn service_account_email(&self) -> Option<&str> {
        self.target
            .as_ref()
            .ok()
            .map(|target| target.token_provider.service_account_email())
    }

    fn target(&self) -> Result<&ExportTarget<P>, InfraError> {
        self.target
            .as_ref()
            .map_err(|reason| InfraError::NotConfigured(reason.clone()))
    }

    async fn append_with_retry(
        &self,
        target: &ExportTarget<P>,
        entry: &BreakEntry,
    ) -> Result<AppendedRow, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self.append_once(target, entry).await {
                Ok(row) => return Ok(row),
                Err(error) if self.should_retry(&error) && attempt + 1 < max_attempts => {
                    if is_unauthorized(&error) {
                        target.token_provider.invalidate()?;
                    }
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    warn!(attempt = attempt + 1, delay_ms = delay, %error, "spreadsheet append failed, retrying");
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn append_once(
        &self,
        target: &ExportTarget<P>,
        entry: &BreakEntry,
    ) -> Result<AppendedRow, InfraError> {
        let access_token = target.token_provider.access_token().await?;
        let column = self
            .sheets_client
            .get_values(&access_token, &target.spreadsheet_id, &column_range(&self.layout, "A"))
            .await?;
        let row_index = find_first_empty_row(&column);
        let row = encode_break_row(entry, row_index, &self.layout)?;
        let range = row_range(&self.layout, row_index);

        let response = self
            .sheets_client
            .update_values(&access_token, &target.spreadsheet_id, &range, vec![row.cells()])
            .await?;

        info!(row = row_index, range = %range, cells = response.updated_cells, "logged break entry");
        Ok(AppendedRow {
            row_index,
            range: response.updated_range.unwrap_or(range),
        })
    }

    fn should_retry(&self, error: &InfraError) -> bool {
        match error {
            InfraError::OAuth(message) | InfraError::SheetsApi(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("network error")
                    || message.contains("timeout")
                    || message.contains("timed out")
                    || message.contains("connection reset")
                    || message.contains("http 401")
                    || message.contains("http 429")
                    || message.contains("http 500")
                    || message.contains("http 502")
                    || message.contains("http 503")
            }
            _ => false,
        }
    }
}

fn is_unauthorized(error: &InfraError) -> bool {
    matches!(error, InfraError::SheetsApi(message) if message.contains("http 401"))
}

#[async_trait]
impl<C, P> BreakLedger for SpreadsheetExporter<C, P>
where
    C: GoogleSheetsClient,
    P: AccessTokenProvider,
{
    fn ensure_ready(&self) -> Result<(), InfraError> {
        self.target().map(|_| ())
    }

    async fn append_break(&self, entry: &BreakEntry) -> Result<AppendedRow, InfraError> {
        entry.validate().map_err(InfraError::Validation)?;
        let target = self.target()?;

        self.append_with_retry(target, entry).await.map_err(|error| match error {
            InfraError::Validation(_) | InfraError::NotConfigured(_) => error,
            other => {
                warn!(error = %other, "spreadsheet append failed");
                InfraError::RemoteWrite {
                    detail: other.to_string(),
                    service_account: Some(target.token_provider.service_account_email().to_string()),
                }
            }
        })
    }
}
