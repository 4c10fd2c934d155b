use crate::domain::models::RestartPolicy;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_TIME_OFFSET_MINUTES: i64 = 60;
const MAX_TIME_OFFSET_MINUTES: i64 = 24 * 60;
const DEFAULT_MAX_ATTEMPTS: u8 = 1;
const DEFAULT_BASE_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

const SPREADSHEET_ID_KEYS: &[&str] = &["BREAKLOG_SPREADSHEET_ID", "GOOGLE_SHEETS_ID", "SPREADSHEET_ID"];
const SERVICE_ACCOUNT_JSON_KEYS: &[&str] = &[
    "BREAKLOG_SERVICE_ACCOUNT_JSON",
    "GOOGLE_SHEETS_CREDENTIALS",
    "SERVICE_ACCOUNT_JSON",
];
const SERVICE_ACCOUNT_FILE_KEYS: &[&str] =
    &["BREAKLOG_SERVICE_ACCOUNT_FILE", "GOOGLE_APPLICATION_CREDENTIALS"];
const HOST_KEYS: &[&str] = &["BREAKLOG_HOST"];
const PORT_KEYS: &[&str] = &["BREAKLOG_PORT", "PORT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_name: Option<String>,
    pub time_offset_minutes: i64,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            sheet_name: None,
            time_offset_minutes: DEFAULT_TIME_OFFSET_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWriteSettings {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RemoteWriteSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub timezone: Tz,
    pub restart_policy: RestartPolicy,
    pub sheet: SheetLayout,
    pub remote_write: RemoteWriteSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            restart_policy: RestartPolicy::default(),
            sheet: SheetLayout::default(),
            remote_write: RemoteWriteSettings::default(),
        }
    }
}

/// Deployment values that only ever come from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub spreadsheet_id: Option<String>,
    pub service_account_json: Option<String>,
    pub service_account_file: Option<String>,
    pub host: String,
    pub port: u16,
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "Breaklog",
        "timezone": DEFAULT_TIMEZONE,
        "restartPolicy": "reject",
        "sheet": {
            "name": null,
            "timeOffsetMinutes": DEFAULT_TIME_OFFSET_MINUTES
        },
        "remoteWrite": {
            "maxAttempts": DEFAULT_MAX_ATTEMPTS,
            "baseDelayMillis": DEFAULT_BASE_DELAY_MS,
            "timeoutSeconds": DEFAULT_TIMEOUT_SECONDS
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    parse_app_settings(&app)
}

fn parse_app_settings(app: &serde_json::Value) -> Result<AppSettings, InfraError> {
    let timezone_name = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_TIMEZONE);
    let timezone = timezone_name
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{timezone_name}': {error}")))?;

    let restart_policy = match app
        .get("restartPolicy")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
    {
        None | Some("") | Some("reject") => RestartPolicy::Reject,
        Some("overwrite") => RestartPolicy::Overwrite,
        Some(other) => {
            return Err(InfraError::InvalidConfig(format!(
                "restartPolicy must be 'reject' or 'overwrite', got '{other}'"
            )));
        }
    };

    let sheet = app.get("sheet");
    let sheet_name = sheet
        .and_then(|value| value.get("name"))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    let time_offset_minutes = match sheet.and_then(|value| value.get("timeOffsetMinutes")) {
        None | Some(serde_json::Value::Null) => DEFAULT_TIME_OFFSET_MINUTES,
        Some(raw) => raw
            .as_i64()
            .filter(|minutes| (-MAX_TIME_OFFSET_MINUTES..=MAX_TIME_OFFSET_MINUTES).contains(minutes))
            .ok_or_else(|| {
                InfraError::InvalidConfig(format!(
                    "sheet.timeOffsetMinutes must be a whole number between -{MAX_TIME_OFFSET_MINUTES} and {MAX_TIME_OFFSET_MINUTES}, got {raw}"
                ))
            })?,
    };

    let remote_write = app.get("remoteWrite");
    let max_attempts = remote_write
        .and_then(|value| value.get("maxAttempts"))
        .and_then(serde_json::Value::as_u64)
        .map(|value| value.clamp(1, u8::MAX as u64) as u8)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);
    let base_delay_ms = remote_write
        .and_then(|value| value.get("baseDelayMillis"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_BASE_DELAY_MS);
    let timeout_seconds = remote_write
        .and_then(|value| value.get("timeoutSeconds"))
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

    Ok(AppSettings {
        timezone,
        restart_policy,
        sheet: SheetLayout {
            sheet_name,
            time_offset_minutes,
        },
        remote_write: RemoteWriteSettings {
            max_attempts,
            base_delay_ms,
            timeout_seconds,
        },
    })
}

pub fn load_env_settings() -> Result<EnvSettings, InfraError> {
    load_env_settings_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_env_settings_from_lookup<F>(lookup: F) -> Result<EnvSettings, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match optional_lookup_value(&lookup, PORT_KEYS) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|error| InfraError::InvalidConfig(format!("invalid port '{raw}': {error}")))?,
        None => DEFAULT_PORT,
    };

    Ok(EnvSettings {
        spreadsheet_id: optional_lookup_value(&lookup, SPREADSHEET_ID_KEYS),
        service_account_json: optional_lookup_value(&lookup, SERVICE_ACCOUNT_JSON_KEYS),
        service_account_file: optional_lookup_value(&lookup, SERVICE_ACCOUNT_FILE_KEYS),
        host: optional_lookup_value(&lookup, HOST_KEYS).unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port,
    })
}

pub fn missing_spreadsheet_id_message() -> String {
    format!("missing spreadsheet id (set one of: {})", SPREADSHEET_ID_KEYS.join(", "))
}

pub fn missing_credentials_message() -> String {
    format!(
        "missing service account credentials (set one of: {}, {})",
        SERVICE_ACCOUNT_JSON_KEYS.join(", "),
        SERVICE_ACCOUNT_FILE_KEYS.join(", ")
    )
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
