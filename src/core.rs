//! Core DataHaus functionality
//!
//! This module contains the DataHaus coordinator: it owns the connection
//! string and the mapping registry, and hands out repositories that share
//! the registry.

use std::marker::PhantomData;
use std::sync::Arc;

use config::{AppConfig, MappingConfig};
use entity_store::{
    CancellationToken, EntityMapping, MappingRegistry, MappingRegistryBuilder, Repository,
    SqlConnection, SqlExecutor, Statement,
};
use sqlx::postgres::PgConnection;

use crate::errors::DataHausError;

/// Main DataHaus coordinator
pub struct DataHaus<C: SqlConnection = PgConnection> {
    connection_string: String,
    registry: Arc<MappingRegistry>,
    _connection: PhantomData<fn() -> C>,
}

impl<C: SqlConnection> DataHaus<C> {
    /// Create a coordinator over an already built registry
    pub fn new(
        connection_string: impl Into<String>,
        registry: MappingRegistry,
    ) -> Result<Self, DataHausError> {
        let connection_string = connection_string.into();
        // validates the connection string before any repository exists
        SqlExecutor::<C>::new(connection_string.as_str())?;

        crate::debug_log!(mappings = registry.len(), "DataHaus created");
        Ok(Self {
            connection_string,
            registry: Arc::new(registry),
            _connection: PhantomData,
        })
    }

    /// Create a coordinator from configuration
    ///
    /// `builder` carries the mappings registered in code; the `[[mappings]]`
    /// entries of the configuration are added to it. An entity mapped in both
    /// places is rejected.
    pub fn from_config(
        config: &AppConfig,
        builder: MappingRegistryBuilder,
    ) -> Result<Self, DataHausError> {
        let builder = config
            .mappings
            .iter()
            .try_fold(builder, |builder, mapping| {
                crate::trace_log!(entity = %mapping.entity, "registering configured mapping");
                builder.register_name(mapping.entity.clone(), entity_mapping(mapping))
            })?;

        Self::new(config.database.connection_string(), builder.build())
    }

    /// Load configuration from `DATAHAUS_CONFIG` or `./datahaus.toml`
    pub fn load(builder: MappingRegistryBuilder) -> Result<Self, DataHausError> {
        let config = AppConfig::load()?;
        Self::from_config(&config, builder)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    /// A repository with its own connection, opened on first use
    pub fn repository(&self) -> Result<Repository<C>, DataHausError> {
        let executor = SqlExecutor::new(self.connection_string.as_str())?;
        Ok(Repository::new(executor, Arc::clone(&self.registry)))
    }

    /// Check that the database answers a trivial query
    pub async fn health_check(&self, cancel: &CancellationToken) -> Result<(), DataHausError> {
        let mut executor = SqlExecutor::<C>::new(self.connection_string.as_str())?;
        executor
            .query_rows(&Statement::new("SELECT 1"), cancel)
            .await?;
        executor.close().await?;
        Ok(())
    }
}

fn entity_mapping(config: &MappingConfig) -> EntityMapping {
    EntityMapping::new(
        config.table.as_str(),
        config.key_column.as_str(),
        config.ignored_on_update.iter().cloned(),
    )
}
