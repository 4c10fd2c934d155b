pub mod application;
pub mod domain;
pub mod infrastructure;

use application::break_lifecycle::BreakStatus;
use application::commands::{
    check_break_status_impl, end_break_impl, start_break_impl, AppState, EndBreakResponse,
    StartBreakResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use infrastructure::config::load_env_settings;
use infrastructure::error::InfraError;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type SharedState = Arc<AppState>;

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn from_command(state: &AppState, command: &str, error: InfraError) -> Self {
        Self {
            status: status_for(&error),
            message: state.command_error(command, &error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

fn status_for(error: &InfraError) -> StatusCode {
    match error {
        InfraError::BreakAlreadyActive => StatusCode::CONFLICT,
        InfraError::NoActiveBreak | InfraError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Deserialize)]
struct EndBreakRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn health() -> &'static str {
    "OK"
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn start_break(State(state): State<SharedState>) -> Result<Json<StartBreakResponse>, ApiError> {
    start_break_impl(&state)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_command(&state, "start_break", error))
}

async fn check_break_status(State(state): State<SharedState>) -> Result<Json<BreakStatus>, ApiError> {
    check_break_status_impl(&state)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_command(&state, "check_break_status", error))
}

async fn end_break(
    State(state): State<SharedState>,
    payload: Result<Json<EndBreakRequest>, JsonRejection>,
) -> Result<Json<EndBreakResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        let error = InfraError::Validation(format!("invalid request body: {}", rejection.body_text()));
        ApiError::from_command(&state, "end_break", error)
    })?;

    end_break_impl(&state, request.reason)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_command(&state, "end_break", error))
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/start-break", post(start_break))
        .route("/check-break-status", get(check_break_status))
        .route("/end-break", post(end_break))
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("breaklog=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn workspace_root() -> Result<PathBuf, InfraError> {
    match std::env::var_os("BREAKLOG_HOME") {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(std::env::current_dir()?),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn run() -> Result<(), InfraError> {
    init_tracing();

    let env = load_env_settings()?;
    let state = Arc::new(AppState::new(workspace_root()?, &env)?);
    info!(config_dir = %state.config_dir().display(), database = %state.database_path().display(), "workspace ready");

    let listener = tokio::net::TcpListener::bind((env.host.as_str(), env.port)).await?;
    info!(address = %listener.local_addr()?, "breaklog listening");
    state.log_info("startup", &format!("listening on {}:{}", env.host, env.port));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
