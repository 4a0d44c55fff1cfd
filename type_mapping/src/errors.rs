//! Error types for value coercion

use crate::types::SqlValue;
use thiserror::Error;

/// A raw column value that cannot be represented in the target type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("cannot convert {from} value '{value}' to {target}")]
    Unsupported {
        target: &'static str,
        from: &'static str,
        value: String,
    },

    #[error("value '{value}' is out of range for {target}")]
    OutOfRange { target: &'static str, value: String },

    #[error("cannot parse '{value}' as {target}")]
    Parse { target: &'static str, value: String },

    #[error("{value} is not a valid {target} discriminant")]
    UnknownDiscriminant { target: &'static str, value: i64 },

    #[error("field '{field}': {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<CoercionError>,
    },
}

impl CoercionError {
    pub fn unsupported(target: &'static str, raw: &SqlValue) -> Self {
        CoercionError::Unsupported {
            target,
            from: raw.kind(),
            value: raw.to_string(),
        }
    }

    pub fn out_of_range(target: &'static str, value: impl ToString) -> Self {
        CoercionError::OutOfRange {
            target,
            value: value.to_string(),
        }
    }

    pub fn parse(target: &'static str, value: &str) -> Self {
        CoercionError::Parse {
            target,
            value: value.to_string(),
        }
    }

    /// Attach the name of the entity field being assigned
    pub fn in_field(self, field: &'static str) -> Self {
        CoercionError::Field {
            field,
            source: Box::new(self),
        }
    }
}
