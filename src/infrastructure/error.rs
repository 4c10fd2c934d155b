use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Sheets API error: {0}")]
    SheetsApi(String),
    #[error("Spreadsheet service is not configured: {0}")]
    NotConfigured(String),
    #[error("{0}")]
    Validation(String),
    #[error("no active break")]
    NoActiveBreak,
    #[error("a break is already active")]
    BreakAlreadyActive,
    #[error(
        "failed to write to the spreadsheet; share it with the service account {} and give it editor access ({detail})",
        .service_account.as_deref().unwrap_or("<unknown>")
    )]
    RemoteWrite {
        detail: String,
        service_account: Option<String>,
    },
}
