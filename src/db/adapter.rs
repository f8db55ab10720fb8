//! The adapter contract shared by every engine.
//!
//! Callers hold a `Box<dyn DatabaseAdapter>` and never a concrete engine type.
//! Mutating operations (`connect`, `disconnect`, `use_database`) take
//! `&mut self`, so the borrow checker serializes them against in-flight
//! discovery and execution calls on the same adapter.

use crate::db::connection::{ConnectionParams, Engine, Timeouts};
use crate::db::error::AdapterResult;
use crate::db::mysql::MySqlAdapter;
use crate::db::postgres::PostgresAdapter;
use crate::db::query::{use_target, QueryResult};
use crate::db::schema::ColumnInfo;
use async_trait::async_trait;
use std::time::Instant;

/// Session lifecycle of one adapter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    ConnectedNoDatabase,
    ConnectedWithDatabase(String),
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, SessionState::Unconnected)
    }
}

#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn engine(&self) -> Engine;

    fn state(&self) -> SessionState;

    /// Open a pooled session and verify it with a ping.
    ///
    /// Any previous session is closed first. On failure no session is
    /// retained and the adapter is left unconnected.
    ///
    /// # Errors
    /// `InvalidParameters` for malformed or foreign-engine parameters,
    /// `ConnectionFailed` when the server cannot be reached or rejects the login.
    async fn connect(&mut self, params: &ConnectionParams) -> AdapterResult<()>;

    /// Release the pool. Calling it on an unconnected adapter is a no-op.
    async fn disconnect(&mut self);

    /// Name of the selected database, or an empty string. Never touches the network.
    fn get_current_database(&self) -> String {
        match self.state() {
            SessionState::ConnectedWithDatabase(name) => name,
            _ => String::new(),
        }
    }

    /// User databases on the server, system databases filtered out.
    async fn get_databases(&self) -> AdapterResult<Vec<String>>;

    /// Switch the selected database.
    ///
    /// In-place engines keep the previous selection when the switch fails.
    /// Reconnecting engines are left unconnected after a failed reconnect.
    async fn use_database(&mut self, name: &str) -> AdapterResult<()>;

    /// Tables in the selected database, ordered by name.
    async fn get_tables(&self) -> AdapterResult<Vec<String>>;

    /// Columns of `table` in ordinal order.
    async fn get_table_info(&self, table: &str) -> AdapterResult<Vec<ColumnInfo>>;

    /// Classify and run one statement, normalizing its result.
    async fn execute_query(&self, query: &str) -> AdapterResult<QueryResult>;

    /// Like [`execute_query`](Self::execute_query), but a `USE <db>` statement
    /// goes through [`use_database`](Self::use_database) so the selection
    /// applies to the whole session instead of one pooled connection.
    async fn execute_statement(&mut self, query: &str) -> AdapterResult<QueryResult> {
        match use_target(query) {
            Some(database) => {
                let start = Instant::now();
                self.use_database(&database).await?;
                Ok(QueryResult::status(
                    format!("Database changed to {}", database),
                    start.elapsed(),
                ))
            }
            None => self.execute_query(query).await,
        }
    }
}

/// Build an unconnected adapter for `engine`.
pub fn adapter_for(engine: Engine, timeouts: Timeouts) -> Box<dyn DatabaseAdapter> {
    match engine {
        Engine::Postgres => Box::new(PostgresAdapter::new(timeouts)),
        Engine::MySql => Box::new(MySqlAdapter::new(timeouts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_for_engine() {
        let pg = adapter_for(Engine::Postgres, Timeouts::default());
        assert_eq!(pg.engine(), Engine::Postgres);
        assert_eq!(pg.state(), SessionState::Unconnected);
        assert_eq!(pg.get_current_database(), "");

        let my = adapter_for(Engine::MySql, Timeouts::default());
        assert_eq!(my.engine(), Engine::MySql);
        assert!(!my.state().is_connected());
    }

    #[test]
    fn test_session_state_is_connected() {
        assert!(!SessionState::Unconnected.is_connected());
        assert!(SessionState::ConnectedNoDatabase.is_connected());
        assert!(SessionState::ConnectedWithDatabase("app".into()).is_connected());
    }
}
