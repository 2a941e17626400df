//! Carlos AI Dashboard API Library
//!
//! Lead tracking backend for the Carlos AI mortgage assistant: leads arrive
//! from a Make automation webhook or a Google Sheets import, are reconciled by
//! phone number, and are aggregated into the dashboard's chart data.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection, schema and store selection.
//! - `db_storage`: PostgreSQL lead store.
//! - `errors`: Error handling types.
//! - `handlers`: Dashboard, metrics and sync HTTP handlers.
//! - `metrics`: Aggregations behind the dashboard endpoints.
//! - `models`: Core data models.
//! - `reconcile`: Find-or-create and merge of leads by phone number.
//! - `routes`: Router and middleware.
//! - `scheduler`: Background sync and daily metric jobs.
//! - `sheets_client`: Google Sheets client.
//! - `store`: Lead store trait and in-memory implementation.
//! - `sync`: Spreadsheet import.
//! - `webhook_handler`: Make webhook handler.
//! - `webhook_models`: Inbound lead payload.

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod scheduler;
pub mod sheets_client;
pub mod store;
pub mod sync;
pub mod webhook_handler;
pub mod webhook_models;
