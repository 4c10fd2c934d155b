use chrono::{DateTime, Utc};
use std::sync::Arc;

pub mod bootstrap;
pub mod break_lifecycle;
pub mod commands;
pub mod oauth;
pub mod sheet_export;
#[cfg(test)]
pub(crate) mod testing;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
