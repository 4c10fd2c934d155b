pub mod break_state_repository;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod google_sheets_client;
pub mod oauth_client;
pub mod row_mapper;
pub mod storage;
