//! Entity-level operations composed from the registry, the statement builder
//! and the executor

use std::borrow::Cow;
use std::sync::Arc;

use sqlx::postgres::PgConnection;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use type_mapping::SqlValue;

use crate::connection::SqlConnection;
use crate::errors::DataError;
use crate::executor::SqlExecutor;
use crate::mapping::{EntityMapping, MappingRegistry};
use crate::sql_builder::{
    build_delete_by_id, build_insert, build_select_all, build_select_by_id, build_update,
    Statement, ID_PARAMETER,
};
use crate::traits::Entity;
use crate::validation::{ValidatedColumnName, ValidatedTableName};

#[derive(Debug, Clone, PartialEq)]
enum CascadeStep {
    /// Rows of `table` whose `column` equals the id
    Column { table: String, column: String },
    /// Rows of `table` matching a predicate that references `@Id`
    Predicate { table: String, predicate: String },
}

/// Dependent tables to clear before deleting an entity
///
/// Steps run in declaration order; the entity's own row is deleted last.
/// All statements share one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeDelete {
    steps: Vec<CascadeStep>,
}

impl CascadeDelete {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete rows of `table` whose `column` holds the id
    pub fn table(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.steps.push(CascadeStep::Column {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Delete rows of `table` matching `predicate`, which may use `@Id`
    pub fn table_where(mut self, table: impl Into<String>, predicate: impl Into<String>) -> Self {
        self.steps.push(CascadeStep::Predicate {
            table: table.into(),
            predicate: predicate.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Statements for the dependent tables followed by the owning table
    pub fn statements(&self, mapping: &EntityMapping, id: SqlValue) -> Result<Vec<Statement>, DataError> {
        let invalid = |e: crate::validation::ValidationError| DataError::Validation(e.to_string());
        let mut statements = Vec::with_capacity(self.steps.len() + 1);

        for step in &self.steps {
            let text = match step {
                CascadeStep::Column { table, column } => {
                    let table = ValidatedTableName::new(table).map_err(invalid)?;
                    let column = ValidatedColumnName::new(column).map_err(invalid)?;
                    format!("DELETE FROM {} WHERE {} = {}", table, column, ID_PARAMETER)
                }
                CascadeStep::Predicate { table, predicate } => {
                    let table = ValidatedTableName::new(table).map_err(invalid)?;
                    format!("DELETE FROM {} WHERE {}", table, predicate)
                }
            };
            statements.push(Statement::new(text).with_parameter(ID_PARAMETER, id.clone()));
        }

        statements.push(build_delete_by_id(mapping, id)?);
        Ok(statements)
    }
}

/// Repository over one executor and a shared mapping registry
pub struct Repository<C: SqlConnection = PgConnection> {
    executor: SqlExecutor<C>,
    registry: Arc<MappingRegistry>,
}

impl<C: SqlConnection> Repository<C> {
    pub fn new(executor: SqlExecutor<C>, registry: Arc<MappingRegistry>) -> Self {
        Self { executor, registry }
    }

    pub fn executor(&self) -> &SqlExecutor<C> {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut SqlExecutor<C> {
        &mut self.executor
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn mapping<T: Entity>(&self) -> Cow<'_, EntityMapping> {
        self.registry.resolve::<T>()
    }

    pub async fn get_all<T: Entity>(&mut self, cancel: &CancellationToken) -> Result<Vec<T>, DataError> {
        let statement = build_select_all(&self.registry.resolve::<T>());
        self.executor.query(&statement, cancel).await
    }

    /// First row with the given key, if any
    pub async fn get_by_id<T: Entity>(
        &mut self,
        id: impl Into<SqlValue>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, DataError> {
        let statement = build_select_by_id(&self.registry.resolve::<T>(), id.into())?;
        let rows = self.executor.query::<T>(&statement, cancel).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<T: Entity>(
        &mut self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let statement = build_insert(&self.registry.resolve::<T>(), entity)?;
        self.executor.execute(&statement, cancel).await
    }

    pub async fn update<T: Entity>(
        &mut self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let statement = build_update(&self.registry.resolve::<T>(), entity)?;
        self.executor.execute(&statement, cancel).await
    }

    pub async fn delete_by_id<T: Entity>(
        &mut self,
        id: impl Into<SqlValue>,
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let statement = build_delete_by_id(&self.registry.resolve::<T>(), id.into())?;
        self.executor.execute(&statement, cancel).await
    }

    /// Delete an entity and its dependent rows in one transaction
    pub async fn delete_cascade<T: Entity>(
        &mut self,
        id: impl Into<SqlValue>,
        cascade: &CascadeDelete,
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let statements = cascade.statements(&self.registry.resolve::<T>(), id.into())?;
        debug!(
            entity = T::type_name(),
            statements = statements.len(),
            "cascading delete"
        );
        self.executor
            .execute_batch_in_transaction(&statements, cancel)
            .await
    }

    pub async fn close(&mut self) -> Result<(), DataError> {
        self.executor.close().await
    }
}
