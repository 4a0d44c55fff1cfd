//! INSERT/UPDATE/SELECT/DELETE generation from an entity and its mapping

use tracing::trace;
use type_mapping::SqlValue;

use super::statement::Statement;
use crate::errors::DataError;
use crate::mapping::EntityMapping;
use crate::traits::{Entity, FieldDescriptor};

/// Parameter carrying the key value of an UPDATE
pub const KEY_PARAMETER: &str = "@__Key";
/// Parameter carrying the id of a keyed SELECT or DELETE
pub const ID_PARAMETER: &str = "@Id";

fn field_value<T: Entity>(entity: &T, index: usize, field: &FieldDescriptor) -> Result<SqlValue, DataError> {
    entity.field_value(index).ok_or_else(|| {
        DataError::Mapping(format!(
            "{} has no readable value for field '{}'",
            T::type_name(),
            field.name
        ))
    })
}

/// INSERT of every mapped field except the key
pub fn build_insert<T: Entity>(mapping: &EntityMapping, entity: &T) -> Result<Statement, DataError> {
    let fields: Vec<(usize, &FieldDescriptor)> = T::fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !mapping.is_key_column(field.column))
        .collect();

    if fields.is_empty() {
        return Err(DataError::Mapping(format!(
            "{} has no insertable fields",
            T::type_name()
        )));
    }

    let columns: Vec<&str> = fields.iter().map(|(_, field)| field.column).collect();
    let placeholders: Vec<String> = columns.iter().map(|column| format!("@{}", column)).collect();

    let mut statement = Statement::new(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        mapping.table_name(),
        columns.join(", "),
        placeholders.join(", ")
    ));

    for (index, field) in fields {
        statement.add_parameter(field.column, field_value(entity, index, field)?);
    }

    trace!(sql = statement.text(), "built insert");
    Ok(statement)
}

/// UPDATE of every mapped field except the key and the ignored columns
pub fn build_update<T: Entity>(mapping: &EntityMapping, entity: &T) -> Result<Statement, DataError> {
    let key_index = T::field_index(mapping.key_column_name()).ok_or_else(|| {
        DataError::Mapping(format!(
            "{} has no field mapped to key column '{}'",
            T::type_name(),
            mapping.key_column_name()
        ))
    })?;

    let key_value = field_value(entity, key_index, &T::fields()[key_index])?;
    if entity.field_is_null(key_index) || key_value.is_null() {
        return Err(DataError::Validation(format!(
            "{} cannot be updated without a value for '{}'",
            T::type_name(),
            mapping.key_column_name()
        )));
    }

    let fields: Vec<(usize, &FieldDescriptor)> = T::fields()
        .iter()
        .enumerate()
        .filter(|(index, field)| {
            *index != key_index && !mapping.is_ignored_on_update(field.column)
        })
        .collect();

    if fields.is_empty() {
        return Err(DataError::Mapping(format!(
            "{} has no updatable fields",
            T::type_name()
        )));
    }

    let assignments: Vec<String> = fields
        .iter()
        .map(|(_, field)| format!("{}=@{}", field.column, field.column))
        .collect();

    let mut statement = Statement::new(format!(
        "UPDATE {} SET {} WHERE {} = {}",
        mapping.table_name(),
        assignments.join(", "),
        mapping.key_column_name(),
        KEY_PARAMETER
    ));

    for (index, field) in fields {
        statement.add_parameter(field.column, field_value(entity, index, field)?);
    }
    statement.add_parameter(KEY_PARAMETER, key_value);

    trace!(sql = statement.text(), "built update");
    Ok(statement)
}

pub fn build_select_all(mapping: &EntityMapping) -> Statement {
    Statement::new(format!("SELECT * FROM {}", mapping.table_name()))
}

pub fn build_select_by_id(mapping: &EntityMapping, id: SqlValue) -> Result<Statement, DataError> {
    keyed(
        format!(
            "SELECT * FROM {} WHERE {} = {}",
            mapping.table_name(),
            mapping.key_column_name(),
            ID_PARAMETER
        ),
        id,
    )
}

pub fn build_delete_by_id(mapping: &EntityMapping, id: SqlValue) -> Result<Statement, DataError> {
    keyed(
        format!(
            "DELETE FROM {} WHERE {} = {}",
            mapping.table_name(),
            mapping.key_column_name(),
            ID_PARAMETER
        ),
        id,
    )
}

fn keyed(text: String, id: SqlValue) -> Result<Statement, DataError> {
    if id.is_null() {
        return Err(DataError::Validation(
            "A key value is required".to_string(),
        ));
    }
    Ok(Statement::new(text).with_parameter(ID_PARAMETER, id))
}
