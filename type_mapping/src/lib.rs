//! Unified value mapping between Rust field types and PostgreSQL column values
//! This crate provides the read-side coercion and write-side normalization used
//! across the datahaus ecosystem
//!
//! ## Null text
//!
//! `Option<String>` counts as a text type when writing and as an optional
//! wrapper when reading. `None` is written as `''`, and a NULL column reads
//! back as `None`, so a stored `None` comes back as `Some("")`. Use
//! [`ToSqlValue::is_missing`] to test absence before normalization.

pub mod coerce;
pub mod errors;
pub mod normalize;
pub mod types;

pub use coerce::{coerce, enum_from_sql_value, FromSqlValue};
pub use errors::CoercionError;
pub use normalize::{enum_to_sql_value, normalize_for_write, SqlEnum, ToSqlValue};
pub use types::{SqlType, SqlValue};
