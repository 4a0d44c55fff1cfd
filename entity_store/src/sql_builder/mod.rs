//! Statement generation
//!
//! Statements are written in the `@name` parameter dialect and rewritten to
//! PostgreSQL's positional placeholders just before execution.

pub mod dynamic;
pub mod placeholders;
pub mod statement;

pub use dynamic::{
    build_delete_by_id, build_insert, build_select_all, build_select_by_id, build_update,
    KEY_PARAMETER, ID_PARAMETER,
};
pub use placeholders::{bind_placeholders, BoundStatement};
pub use statement::{normalize_parameter_name, Parameter, Statement};
