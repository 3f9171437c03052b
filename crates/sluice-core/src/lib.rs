//! Sluice Core - Core types and domain models for the Sluice ingestion pipeline.

mod classify;
mod error;
mod outcome;
mod types;

pub use classify::{ErrorType, FileClassification};
pub use error::{Error, Result};
pub use outcome::*;
pub use types::*;
