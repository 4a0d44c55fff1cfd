use type_mapping::{CoercionError, SqlValue};

/// Static description of one mapped field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name
    pub name: &'static str,
    /// Column the field is read from and written to
    pub column: &'static str,
    /// Field type as written in the struct, for diagnostics
    pub rust_type: &'static str,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, column: &'static str, rust_type: &'static str) -> Self {
        Self {
            name,
            column,
            rust_type,
        }
    }
}

/// A type whose fields map onto the columns of one table
///
/// Implemented by `#[derive(Entity)]`. Fields are addressed by their index in
/// [`Entity::fields`].
pub trait Entity: Default + Send + 'static {
    /// Stable type name, used as the mapping registry key
    fn type_name() -> &'static str;

    fn fields() -> &'static [FieldDescriptor];

    /// Current value of a field, normalized for writing
    fn field_value(&self, index: usize) -> Option<SqlValue>;

    /// Whether a field holds no value; out-of-range indexes count as empty
    fn field_is_null(&self, index: usize) -> bool;

    /// Assign a raw column value to a field, coercing it to the field type
    fn set_field(&mut self, index: usize, raw: Option<SqlValue>) -> Result<(), CoercionError>;

    /// Index of the field mapped to `column`, compared case-insensitively
    fn field_index(column: &str) -> Option<usize> {
        Self::fields()
            .iter()
            .position(|field| field.column.eq_ignore_ascii_case(column))
    }
}
