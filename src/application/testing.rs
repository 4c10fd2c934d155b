use crate::application::break_lifecycle::{AppendedRow, BreakLedger};
use crate::application::oauth::AccessTokenProvider;
use crate::domain::models::BreakEntry;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_sheets_client::{GoogleSheetsClient, UpdateValuesResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const FAKE_SERVICE_ACCOUNT: &str = "breaks@demo.iam.gserviceaccount.com";

#[derive(Debug)]
pub struct FakeBreakLedger {
    configured: bool,
    fail_next: AtomicBool,
    entries: Mutex<Vec<BreakEntry>>,
}

impl Default for FakeBreakLedger {
    fn default() -> Self {
        Self {
            configured: true,
            fail_next: AtomicBool::new(false),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBreakLedger {
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<BreakEntry> {
        self.entries.lock().expect("entries mutex poisoned").clone()
    }
}

#[async_trait]
impl BreakLedger for FakeBreakLedger {
    fn ensure_ready(&self) -> Result<(), InfraError> {
        if self.configured {
            Ok(())
        } else {
            Err(InfraError::NotConfigured("missing spreadsheet id".to_string()))
        }
    }

    async fn append_break(&self, entry: &BreakEntry) -> Result<AppendedRow, InfraError> {
        self.ensure_ready()?;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(InfraError::RemoteWrite {
                detail: "google sheets api error: http 403".to_string(),
                service_account: Some(FAKE_SERVICE_ACCOUNT.to_string()),
            });
        }
        let mut entries = self.entries.lock().expect("entries mutex poisoned");
        entries.push(entry.clone());
        let row_index = entries.len() as u32 + 1;
        Ok(AppendedRow {
            row_index,
            range: format!("A{row_index}:G{row_index}"),
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeTokenProvider {
    fail: bool,
    pub invalidations: AtomicUsize,
}

impl FakeTokenProvider {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl AccessTokenProvider for FakeTokenProvider {
    async fn access_token(&self) -> Result<String, InfraError> {
        if self.fail {
            return Err(InfraError::OAuth("token endpoint error: invalid_grant".to_string()));
        }
        Ok(format!("token-{}", self.invalidations.load(Ordering::SeqCst)))
    }

    fn invalidate(&self) -> Result<(), InfraError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn service_account_email(&self) -> &str {
        FAKE_SERVICE_ACCOUNT
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FakeFailure {
    Network,
    Unauthorized,
    Forbidden,
}

impl FakeFailure {
    fn to_error(self) -> InfraError {
        match self {
            Self::Network => InfraError::SheetsApi(
                "network error while reading values: connection refused".to_string(),
            ),
            Self::Unauthorized => InfraError::SheetsApi("google sheets api error: http 401".to_string()),
            Self::Forbidden => InfraError::SheetsApi(
                "google sheets api error: http 403; body=PERMISSION_DENIED".to_string(),
            ),
        }
    }
}

type RecordedUpdate = (String, String, Vec<Vec<String>>);

#[derive(Debug, Default)]
pub struct FakeGoogleSheetsClient {
    column: Mutex<Vec<Vec<String>>>,
    failures: Mutex<VecDeque<FakeFailure>>,
    reads: Mutex<Vec<String>>,
    updates: Mutex<Vec<RecordedUpdate>>,
    pub get_calls: AtomicUsize,
}

impl FakeGoogleSheetsClient {
    pub fn with_column(values: &[&str]) -> Self {
        let client = Self::default();
        *client.column.lock().expect("column mutex poisoned") = values
            .iter()
            .map(|value| {
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![value.to_string()]
                }
            })
            .collect();
        client
    }

    pub fn push_failure(&self, failure: FakeFailure) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .push_back(failure);
    }

    pub fn read_ranges(&self) -> Vec<String> {
        self.reads.lock().expect("reads mutex poisoned").clone()
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().expect("updates mutex poisoned").clone()
    }
}

#[async_trait]
impl GoogleSheetsClient for FakeGoogleSheetsClient {
    async fn get_values(
        &self,
        _access_token: &str,
        _spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, InfraError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self
            .failures
            .lock()
            .expect("failures mutex poisoned")
            .pop_front()
        {
            return Err(failure.to_error());
        }
        self.reads
            .lock()
            .expect("reads mutex poisoned")
            .push(range.to_string());
        Ok(self.column.lock().expect("column mutex poisoned").clone())
    }

    async fn update_values(
        &self,
        _access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<UpdateValuesResponse, InfraError> {
        let updated_cells = rows.iter().map(Vec::len).sum::<usize>() as u64;
        self.updates.lock().expect("updates mutex poisoned").push((
            spreadsheet_id.to_string(),
            range.to_string(),
            rows,
        ));
        Ok(UpdateValuesResponse {
            updated_range: Some(range.to_string()),
            updated_cells,
        })
    }
}
