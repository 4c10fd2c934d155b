use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::break_lifecycle::{BreakController, BreakLedger, BreakStatus};
use crate::application::oauth::{Rs256AssertionSigner, ServiceAccountAuthenticator};
use crate::application::sheet_export::{ExportTarget, RetryPolicy, SpreadsheetExporter};
use crate::infrastructure::break_state_repository::SqliteBreakStateRepository;
use crate::infrastructure::config::{
    missing_credentials_message, missing_spreadsheet_id_message, AppSettings, EnvSettings,
};
use crate::infrastructure::credential_store::{InMemoryCredentialStore, ServiceAccountKey};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_sheets_client::ReqwestGoogleSheetsClient;
use crate::infrastructure::oauth_client::ReqwestOAuthClient;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

type SheetsAuthenticator = ServiceAccountAuthenticator<InMemoryCredentialStore, ReqwestOAuthClient>;

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    controller: BreakController,
    log_guard: Mutex<()>,
}

impl AppState {
    /// Bootstraps the workspace and wires the spreadsheet exporter from the environment.
    /// Missing or broken credentials leave the exporter unconfigured instead of failing.
    pub fn new(workspace_root: PathBuf, env: &EnvSettings) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let ledger = build_ledger(env, &bootstrap.settings)?;
        Self::assemble(bootstrap, ledger)
    }

    pub fn with_ledger(workspace_root: PathBuf, ledger: Arc<dyn BreakLedger>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::assemble(bootstrap, ledger)
    }

    fn assemble(bootstrap: BootstrapResult, ledger: Arc<dyn BreakLedger>) -> Result<Self, InfraError> {
        let repository = Arc::new(SqliteBreakStateRepository::new(&bootstrap.database_path));
        let controller = BreakController::new(repository, ledger)
            .with_timezone(bootstrap.settings.timezone)
            .with_restart_policy(bootstrap.settings.restart_policy);

        let state = Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            controller,
            log_guard: Mutex::new(()),
        };

        if let Some(lost) = state.controller.recover_on_startup()? {
            state.log_error(
                "startup",
                &format!(
                    "break started {} {} was still active and has been discarded",
                    lost.start_date, lost.start_time
                ),
            );
        }
        Ok(state)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartBreakResponse {
    pub status: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndBreakResponse {
    pub status: String,
    pub message: String,
}

pub async fn start_break_impl(state: &AppState) -> Result<StartBreakResponse, InfraError> {
    let record = state.controller.start().await?;
    state.log_info(
        "start_break",
        &format!("started break date={} time={}", record.start_date, record.start_time),
    );
    Ok(StartBreakResponse {
        status: "success".to_string(),
        date: record.start_date,
        time: record.start_time,
    })
}

pub async fn check_break_status_impl(state: &AppState) -> Result<BreakStatus, InfraError> {
    state.controller.status().await
}

pub async fn end_break_impl(state: &AppState, reason: Option<String>) -> Result<EndBreakResponse, InfraError> {
    let ended = state
        .controller
        .end(reason.as_deref().unwrap_or_default())
        .await?;
    state.log_info(
        "end_break",
        &format!(
            "logged break date={} start={} end={} row={} elapsed={}",
            ended.entry.date,
            ended.entry.start_time,
            ended.entry.end_time,
            ended.row.row_index,
            ended.elapsed()
        ),
    );
    Ok(EndBreakResponse {
        status: "success".to_string(),
        message: format!("Break logged successfully ({})", ended.elapsed()),
    })
}

fn build_ledger(env: &EnvSettings, settings: &AppSettings) -> Result<Arc<dyn BreakLedger>, InfraError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(settings.remote_write.timeout_seconds))
        .build()
        .map_err(|error| InfraError::InvalidConfig(format!("failed to build http client: {error}")))?;

    let target = resolve_export_target(env, http.clone());
    if let Err(reason) = &target {
        warn!(%reason, "spreadsheet export is not configured");
    }

    let exporter = SpreadsheetExporter::new(
        Arc::new(ReqwestGoogleSheetsClient::new(http)),
        target,
        settings.sheet.clone(),
    )
    .with_retry_policy(RetryPolicy::from(&settings.remote_write));
    Ok(Arc::new(exporter))
}

fn resolve_export_target(
    env: &EnvSettings,
    http: Client,
) -> Result<ExportTarget<SheetsAuthenticator>, String> {
    let spreadsheet_id = env
        .spreadsheet_id
        .clone()
        .ok_or_else(missing_spreadsheet_id_message)?;
    let key = ServiceAccountKey::load(
        env.service_account_json.as_deref(),
        env.service_account_file.as_deref().map(Path::new),
    )
    .map_err(|error| error.to_string())?
    .ok_or_else(missing_credentials_message)?;
    let signer = Rs256AssertionSigner::from_key(&key).map_err(|error| error.to_string())?;

    let authenticator = ServiceAccountAuthenticator::new(
        &key,
        Arc::new(signer),
        Arc::new(InMemoryCredentialStore::default()),
        Arc::new(ReqwestOAuthClient::new(http)),
    );
    Ok(ExportTarget {
        spreadsheet_id,
        token_provider: Arc::new(authenticator),
    })
}
