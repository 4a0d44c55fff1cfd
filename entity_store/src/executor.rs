//! Statement execution over a single lazily opened connection

use std::future::Future;

use sqlx::postgres::PgConnection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::connection::SqlConnection;
use crate::errors::{BatchStage, DataError};
use crate::record::{map_rows, ResultRow};
use crate::sql_builder::{bind_placeholders, BoundStatement, Statement};
use crate::traits::Entity;

/// Race `future` against cancellation
async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> Result<T, DataError>
where
    F: Future<Output = Result<T, DataError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DataError::Cancelled),
        result = future => result,
    }
}

/// Runs statements over one connection, opened on first use and reused until
/// closed
///
/// Every operation takes `&mut self`, so an executor serves one caller at a
/// time.
pub struct SqlExecutor<C: SqlConnection = PgConnection> {
    connection_string: String,
    connection: Option<C>,
    /// Set while a batch transaction is in flight; still set afterwards if the
    /// batch future was dropped before finishing
    transaction_open: bool,
}

impl<C: SqlConnection> SqlExecutor<C> {
    pub fn new(connection_string: impl Into<String>) -> Result<Self, DataError> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(DataError::Validation(
                "Connection string cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            connection_string,
            connection: None,
            transaction_open: false,
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The open connection, if any
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// Release the connection; the next operation opens a new one
    pub async fn close(&mut self) -> Result<(), DataError> {
        self.transaction_open = false;
        match self.connection.take() {
            Some(connection) => {
                debug!("closing connection");
                connection.close_connection().await
            }
            None => Ok(()),
        }
    }

    /// Run a non-query statement and return the number of rows affected
    pub async fn execute(
        &mut self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let bound = bind_placeholders(statement)?;
        let connection = self.ensure_open(cancel).await?;

        debug!(sql = %bound.sql, parameters = bound.values.len(), "executing statement");
        cancellable(cancel, connection.execute_statement(&bound)).await
    }

    /// Run a query and map every row onto `T`
    pub async fn query<T: Entity>(
        &mut self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, DataError> {
        let rows = self.query_rows(statement, cancel).await?;
        Ok(map_rows(&rows)?)
    }

    /// Run a query and return the raw rows
    pub async fn query_rows(
        &mut self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResultRow>, DataError> {
        let bound = bind_placeholders(statement)?;
        let connection = self.ensure_open(cancel).await?;

        debug!(sql = %bound.sql, parameters = bound.values.len(), "executing query");
        cancellable(cancel, connection.fetch_rows(&bound)).await
    }

    /// Run `statements` in order inside one transaction
    ///
    /// Blank statements are skipped. On success the transaction is committed
    /// and the total number of rows affected is returned. On failure the
    /// transaction is rolled back and nothing done by the batch remains.
    pub async fn execute_batch_in_transaction(
        &mut self,
        statements: &[Statement],
        cancel: &CancellationToken,
    ) -> Result<u64, DataError> {
        let mut bound = Vec::with_capacity(statements.len());
        for (index, statement) in statements.iter().enumerate() {
            if !statement.is_blank() {
                bound.push((index, bind_placeholders(statement)?));
            }
        }

        self.ensure_open(cancel).await?;
        self.transaction_open = true;

        let outcome = match self.connection.as_mut() {
            Some(connection) => run_batch(connection, &bound, cancel).await,
            None => Err((
                BatchStage::Begin,
                DataError::Validation("Connection is not open".to_string()),
            )),
        };

        match outcome {
            Ok(total) => {
                self.transaction_open = false;
                debug!(statements = bound.len(), rows = total, "transaction committed");
                Ok(total)
            }
            Err((stage, DataError::Cancelled)) => {
                debug!(%stage, "transaction batch cancelled");
                self.rollback_open_transaction().await;
                Err(DataError::Cancelled)
            }
            Err((stage, source)) => {
                warn!(%stage, error = %source, "transaction batch failed, rolling back");
                let rollback_error = self.rollback_open_transaction().await;
                Err(DataError::Batch {
                    stage,
                    source: Box::new(source),
                    rollback_error,
                })
            }
        }
    }

    async fn ensure_open(&mut self, cancel: &CancellationToken) -> Result<&mut C, DataError> {
        if self.transaction_open {
            warn!("rolling back a transaction abandoned by an interrupted batch");
            self.rollback_open_transaction().await;
        }

        if self.connection.is_none() {
            let connection = cancellable(cancel, C::open(&self.connection_string)).await?;
            debug!("connection opened");
            self.connection = Some(connection);
        }

        self.connection
            .as_mut()
            .ok_or_else(|| DataError::Validation("Connection is not open".to_string()))
    }

    /// Roll back the current transaction without honoring cancellation
    ///
    /// A failed rollback is logged and returned, and the connection is
    /// discarded so that the next operation starts on a fresh one.
    async fn rollback_open_transaction(&mut self) -> Option<String> {
        let result = match self.connection.as_mut() {
            Some(connection) => connection.rollback_transaction().await,
            None => Ok(()),
        };
        self.transaction_open = false;

        match result {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "rollback failed, discarding connection");
                self.connection = None;
                Some(e.to_string())
            }
        }
    }
}

async fn run_batch<C: SqlConnection>(
    connection: &mut C,
    statements: &[(usize, BoundStatement)],
    cancel: &CancellationToken,
) -> Result<u64, (BatchStage, DataError)> {
    cancellable(cancel, connection.begin_transaction())
        .await
        .map_err(|e| (BatchStage::Begin, e))?;

    let mut total = 0;
    for (index, statement) in statements {
        debug!(index, sql = %statement.sql, parameters = statement.values.len(), "executing batch statement");
        total += cancellable(cancel, connection.execute_statement(statement))
            .await
            .map_err(|e| (BatchStage::Statement(*index), e))?;
    }

    cancellable(cancel, connection.commit_transaction())
        .await
        .map_err(|e| (BatchStage::Commit, e))?;

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConnection, MemoryEvent};
    use crate::{Entity, ResultRow, SqlValue};
    use std::time::Duration;

    #[derive(Debug, Default, PartialEq, Entity)]
    struct Room {
        #[column(name = "RoomID")]
        id: i32,
        room_name: String,
    }

    fn executor(name: &str) -> SqlExecutor<MemoryConnection> {
        SqlExecutor::new(format!("memory://executor/{}", name)).unwrap()
    }

    fn handle(name: &str) -> crate::memory::MemoryHandle {
        MemoryConnection::handle(&format!("memory://executor/{}", name))
    }

    fn statement(text: &str) -> Statement {
        Statement::new(text)
    }

    #[test]
    fn test_blank_connection_string_rejected() {
        let result = SqlExecutor::<MemoryConnection>::new("   ");
        assert!(matches!(result, Err(DataError::Validation(_))));
    }

    #[tokio::test]
    async fn test_connection_opened_lazily_and_reused() {
        let mut executor = executor("lazy");
        let cancel = CancellationToken::new();
        assert!(!executor.is_open());

        executor.execute(&statement("DELETE FROM dbo.Room WHERE 1 = 0"), &cancel).await.unwrap();
        executor.execute(&statement("DELETE FROM dbo.Room WHERE 2 = 0"), &cancel).await.unwrap();

        assert!(executor.is_open());
        assert_eq!(handle("lazy").open_count(), 1);
    }

    #[tokio::test]
    async fn test_execute_binds_parameters() {
        let mut executor = executor("bind");
        let cancel = CancellationToken::new();

        let rows = executor
            .execute(
                &statement("UPDATE dbo.Room SET RoomName=@RoomName WHERE RoomID = @__Key")
                    .with_parameter("__Key", 2)
                    .with_parameter("RoomName", "Lab"),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(rows, 1);
        let committed = handle("bind").committed();
        assert_eq!(committed[0].sql, "UPDATE dbo.Room SET RoomName=$1 WHERE RoomID = $2");
        assert_eq!(
            committed[0].values,
            vec![SqlValue::Text("Lab".into()), SqlValue::Integer(2)]
        );
    }

    #[tokio::test]
    async fn test_query_maps_rows() {
        let mut executor = executor("query");
        let cancel = CancellationToken::new();
        handle("query").add_rows(
            "FROM dbo.Room",
            vec![
                ResultRow::from_pairs([
                    ("RoomID", Some(SqlValue::Integer(1))),
                    ("RoomName", Some(SqlValue::Text("Gym".into()))),
                ]),
                ResultRow::from_pairs([("RoomID", Some(SqlValue::Integer(2)))]),
            ],
        );

        let rooms: Vec<Room> = executor
            .query(&statement("SELECT * FROM dbo.Room"), &cancel)
            .await
            .unwrap();
        assert_eq!(
            rooms,
            vec![
                Room { id: 1, room_name: "Gym".into() },
                Room { id: 2, room_name: String::new() },
            ]
        );

        let empty: Vec<Room> = executor
            .query(&statement("SELECT * FROM dbo.Hall"), &cancel)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_batch_commits_in_order_and_skips_blank() {
        let mut executor = executor("commit");
        let cancel = CancellationToken::new();

        let total = executor
            .execute_batch_in_transaction(
                &[statement("DELETE FROM A"), statement("  "), statement("DELETE FROM B")],
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(handle("commit").committed_sql(), ["DELETE FROM A", "DELETE FROM B"]);
        assert_eq!(
            handle("commit").events(),
            vec![
                MemoryEvent::Open,
                MemoryEvent::Begin,
                MemoryEvent::Execute("DELETE FROM A".into()),
                MemoryEvent::Execute("DELETE FROM B".into()),
                MemoryEvent::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_failure_rolls_back_everything() {
        let mut executor = executor("rollback");
        let cancel = CancellationToken::new();
        handle("rollback").fail_on("FROM B");

        let err = executor
            .execute_batch_in_transaction(
                &[statement("DELETE FROM A"), statement("DELETE FROM B"), statement("DELETE FROM C")],
                &cancel,
            )
            .await
            .unwrap_err();

        match err {
            DataError::Batch { stage, source, rollback_error } => {
                assert_eq!(stage, BatchStage::Statement(1));
                assert!(matches!(*source, DataError::Execution(_)));
                assert!(rollback_error.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let handle = handle("rollback");
        assert!(handle.committed().is_empty());
        assert!(!handle.events().contains(&MemoryEvent::Execute("DELETE FROM C".into())));
        assert_eq!(handle.events().last(), Some(&MemoryEvent::Rollback));
        assert!(executor.is_open());
    }

    #[tokio::test]
    async fn test_batch_validation_happens_before_io() {
        let mut executor = executor("unbound");
        let cancel = CancellationToken::new();

        let err = executor
            .execute_batch_in_transaction(&[statement("DELETE FROM A WHERE Id = @Id")], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DataError::Validation(_)));
        assert!(handle("unbound").events().is_empty());
    }

    #[tokio::test]
    async fn test_batch_cancellation_is_not_wrapped() {
        let mut executor = executor("cancel");
        let cancel = CancellationToken::new();
        handle("cancel").hang_on("FROM B");

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = executor
            .execute_batch_in_transaction(&[statement("DELETE FROM A"), statement("DELETE FROM B")], &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(handle("cancel").committed().is_empty());
        assert_eq!(handle("cancel").events().last(), Some(&MemoryEvent::Rollback));
    }

    #[tokio::test]
    async fn test_cancelled_token_prevents_open() {
        let mut executor = executor("precancelled");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor.execute(&statement("SELECT 1"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!executor.is_open());
        assert_eq!(handle("precancelled").open_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_recorded_and_connection_discarded() {
        let mut executor = executor("bad-rollback");
        let cancel = CancellationToken::new();
        let handle = handle("bad-rollback");
        handle.fail_on("FROM B");
        handle.fail_rollback(true);

        let err = executor
            .execute_batch_in_transaction(&[statement("DELETE FROM A"), statement("DELETE FROM B")], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DataError::Batch { rollback_error: Some(_), .. }));
        assert!(!executor.is_open());
        assert!(handle.committed().is_empty());

        handle.fail_rollback(false);
        executor.execute(&statement("SELECT 1"), &cancel).await.unwrap();
        assert_eq!(handle.open_count(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_transaction_rolled_back_before_reuse() {
        let mut executor = executor("abandoned");
        let cancel = CancellationToken::new();
        let handle = handle("abandoned");
        handle.hang_on("FROM B");

        let statements = [statement("DELETE FROM A"), statement("DELETE FROM B")];
        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            executor.execute_batch_in_transaction(&statements, &cancel),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(handle.in_transaction());

        executor.execute(&statement("DELETE FROM C"), &cancel).await.unwrap();

        assert_eq!(handle.committed_sql(), ["DELETE FROM C"]);
        let events = handle.events();
        let rollback = events.iter().position(|e| *e == MemoryEvent::Rollback).unwrap();
        let execute_c = events
            .iter()
            .position(|e| *e == MemoryEvent::Execute("DELETE FROM C".into()))
            .unwrap();
        assert!(rollback < execute_c);
    }

    #[tokio::test]
    async fn test_close_releases_connection() {
        let mut executor = executor("close");
        let cancel = CancellationToken::new();

        executor.execute(&statement("SELECT 1"), &cancel).await.unwrap();
        executor.close().await.unwrap();

        assert!(!executor.is_open());
        assert_eq!(handle("close").events().last(), Some(&MemoryEvent::Close));
    }
}
