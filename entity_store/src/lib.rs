//! Entity Store - data access runtime for DataHaus
//!
//! This crate maps result rows onto entities, resolves entity-to-table
//! mappings, generates statements for them and runs those statements over a
//! single lazily opened connection.

extern crate self as entity_store;

pub mod connection;
pub mod errors;
pub mod executor;
pub mod mapping;
pub mod prelude;
pub mod record;
pub mod repository;
pub mod sql_builder;
pub mod traits;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use type_mapping;

pub use connection::SqlConnection;
pub use entity_derive::{Entity, SqlEnum};
pub use errors::{BatchStage, DataError};
pub use executor::SqlExecutor;
pub use mapping::{EntityMapping, MappingRegistry, MappingRegistryBuilder};
pub use record::{map_record, map_rows, ColumnIndex, ResultRow};
pub use repository::{CascadeDelete, Repository};
pub use sql_builder::{
    build_delete_by_id, build_insert, build_select_all, build_select_by_id, build_update,
    BoundStatement, Parameter, Statement,
};
pub use traits::{Entity, FieldDescriptor};
pub use type_mapping::{SqlType, SqlValue};
pub use validation::{ValidatedColumnName, ValidatedTableName, ValidationError};

pub use tokio_util::sync::CancellationToken;
