//! Error types for the DataHaus crate
//!
//! This module contains all error types that can be returned by DataHaus operations.

use entity_store::DataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataHausError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl DataHausError {
    /// Whether the operation stopped because its cancellation token fired
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DataHausError::Data(DataError::Cancelled))
    }
}
