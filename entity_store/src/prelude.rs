//! Convenience re-exports for common entity-store usage

// Core traits and derives
pub use crate::traits::FieldDescriptor;
pub use crate::{Entity, SqlEnum};

// Connection seam and execution
pub use crate::connection::SqlConnection;
pub use crate::executor::SqlExecutor;
pub use crate::repository::{CascadeDelete, Repository};

// Mapping
pub use crate::mapping::{EntityMapping, MappingRegistry};
pub use crate::record::{map_record, ResultRow};

// Statements
pub use crate::sql_builder::{Parameter, Statement};

// Error types
pub use crate::errors::{BatchStage, DataError};

// Values
pub use type_mapping::{CoercionError, SqlType, SqlValue};

// Common external dependencies that are frequently used
pub use tokio_util::sync::CancellationToken;
pub use uuid::Uuid;
