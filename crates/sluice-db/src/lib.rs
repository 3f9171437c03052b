//! Sluice DB - SQLite document store, ingestion stats and failed-file ledger.

mod database;
mod error;
mod migrations;
mod operations;

pub use database::Database;
pub use error::{DbError, DbResult};
