use std::fmt;
use thiserror::Error;
use type_mapping::CoercionError;

/// Point of a transaction batch at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Begin,
    /// Index of the statement within the submitted batch
    Statement(usize),
    Commit,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::Begin => f.write_str("BEGIN"),
            BatchStage::Statement(index) => write!(f, "statement {}", index),
            BatchStage::Commit => f.write_str("COMMIT"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Database error: {0}")]
    Execution(#[from] sqlx::Error),

    #[error("Transaction batch failed at {stage}: {source}")]
    Batch {
        stage: BatchStage,
        #[source]
        source: Box<DataError>,
        /// Set when the rollback issued after the failure did not succeed either
        rollback_error: Option<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DataError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DataError::Cancelled)
    }
}
