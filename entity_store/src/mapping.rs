//! Entity-to-table mapping registry
//!
//! The registry is built once, either in code or from configuration, and is
//! immutable afterwards. Types that were never registered resolve to the
//! default convention: table `dbo.<Type>`, key column `<Type>ID`.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DataError;
use crate::traits::Entity;
use crate::validation::{ValidatedColumnName, ValidatedTableName, ValidationError};

const DEFAULT_SCHEMA: &str = "dbo";
const DEFAULT_KEY_SUFFIX: &str = "ID";

/// Table metadata for one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    table_name: String,
    key_column_name: String,
    ignored_on_update: Vec<String>,
}

impl EntityMapping {
    pub fn new<I, S>(
        table_name: impl Into<String>,
        key_column_name: impl Into<String>,
        ignored_on_update: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table_name: table_name.into(),
            key_column_name: key_column_name.into(),
            ignored_on_update: ignored_on_update.into_iter().map(Into::into).collect(),
        }
    }

    /// Mapping derived from the type name alone
    pub fn default_for(type_name: &str) -> Self {
        Self {
            table_name: format!("{}.{}", DEFAULT_SCHEMA, type_name),
            key_column_name: format!("{}{}", type_name, DEFAULT_KEY_SUFFIX),
            ignored_on_update: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_column_name(&self) -> &str {
        &self.key_column_name
    }

    pub fn ignored_on_update(&self) -> &[String] {
        &self.ignored_on_update
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        self.key_column_name.eq_ignore_ascii_case(column)
    }

    /// Whether `column` is excluded from generated UPDATE statements
    pub fn is_ignored_on_update(&self, column: &str) -> bool {
        self.ignored_on_update
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(column))
    }

    fn validate(&self) -> Result<(), DataError> {
        let invalid = |e: ValidationError| DataError::Registry(e.to_string());
        ValidatedTableName::new(&self.table_name).map_err(invalid)?;
        ValidatedColumnName::new(&self.key_column_name).map_err(invalid)?;
        for column in &self.ignored_on_update {
            ValidatedColumnName::new(column).map_err(invalid)?;
        }
        Ok(())
    }
}

/// Immutable mapping table keyed by entity type name
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: HashMap<String, EntityMapping>,
}

impl MappingRegistry {
    pub fn builder() -> MappingRegistryBuilder {
        MappingRegistryBuilder::default()
    }

    /// Registry without explicit mappings; every type uses the default convention
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn resolve<T: Entity>(&self) -> Cow<'_, EntityMapping> {
        self.resolve_name(T::type_name())
    }

    pub fn resolve_name(&self, type_name: &str) -> Cow<'_, EntityMapping> {
        match self.mappings.get(type_name) {
            Some(mapping) => Cow::Borrowed(mapping),
            None => Cow::Owned(EntityMapping::default_for(type_name)),
        }
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.mappings.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Collects explicit mappings before the registry is frozen
#[derive(Debug, Default)]
pub struct MappingRegistryBuilder {
    mappings: HashMap<String, EntityMapping>,
}

impl MappingRegistryBuilder {
    pub fn register<T: Entity>(self, mapping: EntityMapping) -> Result<Self, DataError> {
        self.register_name(T::type_name(), mapping)
    }

    /// Register a mapping by entity type name, as used by configuration files
    pub fn register_name(
        mut self,
        type_name: impl Into<String>,
        mapping: EntityMapping,
    ) -> Result<Self, DataError> {
        let type_name = type_name.into();
        mapping.validate()?;

        if self.mappings.contains_key(&type_name) {
            return Err(DataError::Registry(format!(
                "Entity '{}' is registered more than once",
                type_name
            )));
        }

        debug!(
            entity = %type_name,
            table = %mapping.table_name,
            key = %mapping.key_column_name,
            "registered entity mapping"
        );
        self.mappings.insert(type_name, mapping);
        Ok(self)
    }

    pub fn build(self) -> MappingRegistry {
        MappingRegistry {
            mappings: self.mappings,
        }
    }
}
