//! In-memory connection for tests
//!
//! Connections opened with the same connection string share one
//! [`MemoryState`], reachable through [`MemoryConnection::handle`]. Statements
//! run inside a transaction stay pending until COMMIT and disappear on
//! ROLLBACK, so tests can observe what a batch left behind.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::connection::SqlConnection;
use crate::errors::DataError;
use crate::record::ResultRow;
use crate::sql_builder::BoundStatement;

static STATES: LazyLock<Mutex<HashMap<String, Arc<Mutex<MemoryState>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Something a connection was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    Open,
    Begin,
    Execute(String),
    Query(String),
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    committed: Vec<BoundStatement>,
    pending: Vec<BoundStatement>,
    in_transaction: bool,
    events: Vec<MemoryEvent>,
    opens: usize,
    fail_markers: Vec<String>,
    hang_markers: Vec<String>,
    fail_rollback: bool,
    rows: Vec<(String, Vec<ResultRow>)>,
}

/// Shared view of the state behind one connection string
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every statement whose text contains `marker`
    pub fn fail_on(&self, marker: impl Into<String>) {
        self.lock().fail_markers.push(marker.into());
    }

    /// Never complete statements whose text contains `marker`
    pub fn hang_on(&self, marker: impl Into<String>) {
        self.lock().hang_markers.push(marker.into());
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.lock().fail_rollback = fail;
    }

    /// Rows returned by queries whose text contains `marker`
    pub fn add_rows(&self, marker: impl Into<String>, rows: Vec<ResultRow>) {
        self.lock().rows.push((marker.into(), rows));
    }

    /// Statements whose effect is visible, in execution order
    pub fn committed(&self) -> Vec<BoundStatement> {
        self.lock().committed.clone()
    }

    pub fn committed_sql(&self) -> Vec<String> {
        self.lock()
            .committed
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }

    pub fn events(&self) -> Vec<MemoryEvent> {
        self.lock().events.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }
}

/// Connection backed by shared in-memory state
#[derive(Debug)]
pub struct MemoryConnection {
    handle: MemoryHandle,
}

impl MemoryConnection {
    /// Handle for the state shared by every connection opened with `connection_string`
    pub fn handle(connection_string: &str) -> MemoryHandle {
        let mut states = STATES.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(connection_string.to_string())
            .or_default()
            .clone();
        MemoryHandle { state }
    }

    fn simulated_failure(sql: &str) -> DataError {
        DataError::Execution(sqlx::Error::Protocol(format!(
            "simulated failure: {}",
            sql
        )))
    }

    async fn run(&mut self, statement: &BoundStatement, event: MemoryEvent) -> Result<(), DataError> {
        let hang = {
            let mut state = self.handle.lock();
            state.events.push(event);

            if state.fail_markers.iter().any(|m| statement.sql.contains(m.as_str())) {
                return Err(Self::simulated_failure(&statement.sql));
            }
            state.hang_markers.iter().any(|m| statement.sql.contains(m.as_str()))
        };

        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl SqlConnection for MemoryConnection {
    async fn open(connection_string: &str) -> Result<Self, DataError> {
        let handle = Self::handle(connection_string);
        {
            let mut state = handle.lock();
            state.opens += 1;
            state.events.push(MemoryEvent::Open);
        }
        Ok(Self { handle })
    }

    async fn execute_statement(&mut self, statement: &BoundStatement) -> Result<u64, DataError> {
        self.run(statement, MemoryEvent::Execute(statement.sql.clone()))
            .await?;

        let mut state = self.handle.lock();
        if state.in_transaction {
            state.pending.push(statement.clone());
        } else {
            state.committed.push(statement.clone());
        }
        Ok(1)
    }

    async fn fetch_rows(&mut self, statement: &BoundStatement) -> Result<Vec<ResultRow>, DataError> {
        self.run(statement, MemoryEvent::Query(statement.sql.clone()))
            .await?;

        let state = self.handle.lock();
        Ok(state
            .rows
            .iter()
            .find(|(marker, _)| statement.sql.contains(marker.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        let mut state = self.handle.lock();
        state.events.push(MemoryEvent::Begin);
        state.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), DataError> {
        let mut state = self.handle.lock();
        state.events.push(MemoryEvent::Commit);
        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);
        state.in_transaction = false;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), DataError> {
        let mut state = self.handle.lock();
        state.events.push(MemoryEvent::Rollback);
        if state.fail_rollback {
            return Err(Self::simulated_failure("ROLLBACK"));
        }
        state.pending.clear();
        state.in_transaction = false;
        Ok(())
    }

    async fn close_connection(self) -> Result<(), DataError> {
        self.handle.lock().events.push(MemoryEvent::Close);
        Ok(())
    }
}

impl Drop for MemoryConnection {
    // an open transaction dies with its connection
    fn drop(&mut self) {
        let mut state = self.handle.lock();
        state.pending.clear();
        state.in_transaction = false;
    }
}
