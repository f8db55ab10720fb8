//! MySQL adapter.
//!
//! MySQL switches databases in place with `USE`. Because `USE` only affects
//! the physical connection it runs on, the selected database is kept on the
//! session and re-applied to every connection checked out of the pool. A
//! `USE` statement sent through `execute_query` changes that session-level
//! selection too, so no pooled connection ever drifts to another database.

use crate::db::adapter::{DatabaseAdapter, SessionState};
use crate::db::connection::{
    is_plain_identifier, ConnectionParams, Engine, EngineOptions, MySqlOptions, MySqlSslMode,
    Timeouts, IDLE_CONNECTION_TIMEOUT, MAX_CONNECTION_LIFETIME, MAX_OPEN_CONNECTIONS,
    PING_TIMEOUT,
};
use crate::db::error::{AdapterError, AdapterResult, QueryError};
use crate::db::query::{classify, use_target, CellValue, QueryKind, QueryResult};
use crate::db::schema::{derive_type_info, parse_nullable, split_qualified, ColumnInfo};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::mysql::{
    MySql, MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow,
};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Connection, Decode, Executor, Row, Statement, TypeInfo};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Schemas that never hold user data.
const SYSTEM_DATABASES: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

/// `ER_BAD_DB_ERROR`: unknown database.
const ER_BAD_DB_ERROR: u16 = 1049;

pub struct MySqlAdapter {
    timeouts: Timeouts,
    session: Option<MySqlSession>,
}

struct MySqlSession {
    pool: MySqlPool,
    params: ConnectionParams,
    /// Selected database, applied with `USE` on every checkout.
    database: Mutex<Option<String>>,
}

/// A pooled connection with the session's database applied.
struct Checkout {
    conn: PoolConnection<MySql>,
    connection_id: u64,
}

impl MySqlAdapter {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            session: None,
        }
    }

    fn session(&self) -> AdapterResult<&MySqlSession> {
        self.session.as_ref().ok_or(AdapterError::NotConnected)
    }

    /// Session and its selected database, for catalog calls scoped to it.
    fn database_session(&self) -> AdapterResult<(&MySqlSession, String)> {
        let session = self.session()?;
        match session.selected() {
            Some(db) => Ok((session, db)),
            None => Err(AdapterError::NoDatabaseSelected),
        }
    }
}

impl MySqlSession {
    async fn open(
        params: &ConnectionParams,
        opts: &MySqlOptions,
        timeouts: Timeouts,
    ) -> AdapterResult<Self> {
        let mut pool_options = MySqlPoolOptions::new()
            .max_connections(MAX_OPEN_CONNECTIONS as u32)
            .min_connections(0)
            .max_lifetime(MAX_CONNECTION_LIFETIME)
            .idle_timeout(IDLE_CONNECTION_TIMEOUT)
            .acquire_timeout(timeouts.connect);

        if let Some(init_sql) = session_init_sql(opts) {
            pool_options = pool_options.after_connect(move |conn, _meta| {
                let sql = init_sql.clone();
                Box::pin(async move {
                    conn.execute(sqlx::raw_sql(&sql)).await?;
                    Ok(())
                })
            });
        }

        let pool = pool_options.connect_lazy_with(build_connect_options(params, opts));
        let session = MySqlSession {
            pool,
            params: params.clone(),
            database: Mutex::new(params.database.clone()),
        };
        if let Err(err) = session.ping().await {
            session.pool.close().await;
            return Err(err);
        }
        Ok(session)
    }

    /// Round trip on a fresh checkout; also proves the requested database exists.
    async fn ping(&self) -> AdapterResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))?;
        let database = self.params.database.clone();
        let outcome = timeout(PING_TIMEOUT, async {
            conn.ping().await?;
            if let Some(db) = &database {
                apply_use(&mut conn, db).await?;
            }
            Ok::<(), sqlx::Error>(())
        })
        .await;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AdapterError::ConnectionFailed(e.to_string())),
            Err(_) => {
                drop(conn.detach());
                Err(AdapterError::ConnectionFailed(format!(
                    "server did not answer ping within {}s",
                    PING_TIMEOUT.as_secs()
                )))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.database.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn selected(&self) -> Option<String> {
        self.lock().clone()
    }

    fn select(&self, database: Option<String>) {
        *self.lock() = database;
    }

    /// Drop the selection if it still names `database`.
    fn forget(&self, database: &str) {
        let mut selected = self.lock();
        if selected.as_deref() == Some(database) {
            *selected = None;
        }
    }

    /// Check out a connection with the selected database applied, bound by `limit`.
    async fn checkout(&self, limit: Duration) -> AdapterResult<Checkout> {
        for _ in 0..=MAX_OPEN_CONNECTIONS {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))?;
            let selected = self.selected();
            let prepared = timeout(limit, self.prepare(&mut conn, selected.as_deref())).await;
            match prepared {
                Ok(Ok(Some(connection_id))) => {
                    return Ok(Checkout {
                        conn,
                        connection_id,
                    })
                }
                Ok(Ok(None)) => {
                    debug!("MySQL: retiring a connection still on a dropped selection");
                    drop(conn.detach());
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    drop(conn.detach());
                    return Err(AdapterError::Timeout(limit));
                }
            }
        }
        Err(AdapterError::ConnectionFailed(
            "no pooled connection could be reset to the session database".to_string(),
        ))
    }

    /// Apply the selection and capture the connection id used by `KILL QUERY`.
    ///
    /// A selected database that has been dropped is cleared, the same way a
    /// native client falls back to "no database". `None` means the connection
    /// still points at an older database while nothing is selected; a USE
    /// cannot be undone in MySQL, so the caller retires it.
    async fn prepare(
        &self,
        conn: &mut PoolConnection<MySql>,
        selected: Option<&str>,
    ) -> AdapterResult<Option<u64>> {
        let mut selected = selected;
        if let Some(db) = selected {
            if let Err(e) = apply_use(conn, db).await {
                if !is_unknown_database(&e) {
                    return Err(query_failed(&e));
                }
                warn!("MySQL: selected database {} no longer exists, clearing selection", db);
                self.forget(db);
                selected = None;
            }
        }
        let (connection_id, current) = fetch_connection_state(conn)
            .await
            .map_err(|e| query_failed(&e))?;
        if selected.is_none() && current.is_some() {
            return Ok(None);
        }
        Ok(Some(connection_id))
    }

    /// Make `database` the session's selection. The previous selection stays on failure.
    async fn switch(&self, database: &str, limit: Duration) -> AdapterResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))?;
        let outcome = timeout(limit, apply_use(&mut conn, database)).await;
        match outcome {
            Ok(Ok(())) => {
                self.select(Some(database.to_string()));
                info!("MySQL: switched to database {}", database);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("MySQL: switching to database {} failed: {}", database, e);
                Err(query_failed(&e))
            }
            Err(_) => {
                drop(conn.detach());
                Err(AdapterError::Timeout(limit))
            }
        }
    }

    /// Kill the statement running on a timed-out checkout and keep the
    /// connection out of the pool.
    async fn abandon(&self, checkout: Checkout, limit: Duration) -> AdapterError {
        let connection_id = checkout.connection_id;
        let kill = async {
            let mut conn = self.pool.acquire().await?;
            let sql = format!("KILL QUERY {}", connection_id);
            conn.execute(sqlx::raw_sql(&sql)).await
        };
        match timeout(PING_TIMEOUT, kill).await {
            Ok(Ok(_)) => debug!("MySQL: killed query on connection {}", connection_id),
            Ok(Err(e)) => warn!("MySQL: KILL QUERY {} failed: {}", connection_id, e),
            Err(_) => warn!("MySQL: KILL QUERY {} timed out", connection_id),
        }
        drop(checkout.conn.detach());
        AdapterError::Timeout(limit)
    }

    /// Run a catalog query with string binds.
    async fn fetch(&self, sql: &str, binds: &[&str], limit: Duration) -> AdapterResult<Vec<MySqlRow>> {
        let mut checkout = self.checkout(limit).await?;
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let outcome = timeout(limit, query.fetch_all(&mut *checkout.conn)).await;
        match outcome {
            Ok(rows) => rows.map_err(|e| query_failed(&e)),
            Err(_) => Err(self.abandon(checkout, limit).await),
        }
    }
}

async fn apply_use(conn: &mut PoolConnection<MySql>, database: &str) -> Result<(), sqlx::Error> {
    let use_sql = format!("USE {}", quote_ident(database));
    (&mut **conn).execute(sqlx::raw_sql(&use_sql)).await?;
    Ok(())
}

/// Connection id and the connection's current database.
async fn fetch_connection_state(
    conn: &mut PoolConnection<MySql>,
) -> Result<(u64, Option<String>), sqlx::Error> {
    sqlx::query_as("SELECT CONNECTION_ID(), CAST(DATABASE() AS CHAR)")
        .fetch_one(&mut **conn)
        .await
}

fn is_unknown_database(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.try_downcast_ref::<MySqlDatabaseError>())
        .map(|db_err| db_err.number() == ER_BAD_DB_ERROR)
        .unwrap_or(false)
}

fn query_failed(err: &sqlx::Error) -> AdapterError {
    AdapterError::QueryFailed(QueryError::from_sqlx_error(err))
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Unconnected,
            Some(session) => match session.selected() {
                Some(db) => SessionState::ConnectedWithDatabase(db),
                None => SessionState::ConnectedNoDatabase,
            },
        }
    }

    async fn connect(&mut self, params: &ConnectionParams) -> AdapterResult<()> {
        self.disconnect().await;

        let opts = match &params.options {
            EngineOptions::MySql(opts) => opts,
            EngineOptions::Postgres(_) => {
                return Err(AdapterError::invalid(format!(
                    "MySQL adapter cannot use {} parameters",
                    params.engine()
                )))
            }
        };
        params.validate()?;

        match MySqlSession::open(params, opts, self.timeouts).await {
            Ok(session) => {
                info!("MySQL: connected to {}", params.display_string());
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                warn!("MySQL: connection to {} failed: {}", params.display_string(), err);
                Err(err)
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if timeout(PING_TIMEOUT, session.pool.close()).await.is_err() {
                warn!("MySQL: pool did not close cleanly");
            }
            info!("MySQL: disconnected from {}", session.params.display_string());
        }
    }

    async fn get_databases(&self) -> AdapterResult<Vec<String>> {
        let session = self.session()?;
        let rows = session
            .fetch(
                "SELECT CAST(SCHEMA_NAME AS CHAR) FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME",
                &[],
                self.timeouts.query,
            )
            .await?;

        let mut databases = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get(0).map_err(|e| query_failed(&e))?;
            if !SYSTEM_DATABASES.contains(&name.as_str()) {
                databases.push(name);
            }
        }
        Ok(databases)
    }

    async fn use_database(&mut self, name: &str) -> AdapterResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdapterError::invalid("database name must not be empty"));
        }
        self.session()?.switch(name, self.timeouts.query).await
    }

    async fn get_tables(&self) -> AdapterResult<Vec<String>> {
        let (session, database) = self.database_session()?;
        let rows = session
            .fetch(
                "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME",
                &[database.as_str()],
                self.timeouts.query,
            )
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(|e| query_failed(&e)))
            .collect()
    }

    async fn get_table_info(&self, table: &str) -> AdapterResult<Vec<ColumnInfo>> {
        let (session, database) = self.database_session()?;
        let (schema, table) = split_qualified(table.trim());
        let rows = session
            .fetch(
                r#"
                SELECT
                    CAST(COLUMN_NAME AS CHAR),
                    CAST(DATA_TYPE AS CHAR),
                    CAST(IS_NULLABLE AS CHAR),
                    CAST(COLUMN_DEFAULT AS CHAR),
                    CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED),
                    CAST(NUMERIC_PRECISION AS SIGNED),
                    CAST(NUMERIC_SCALE AS SIGNED),
                    CAST(ORDINAL_POSITION AS SIGNED),
                    CAST(COLUMN_KEY = 'PRI' AS SIGNED)
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION
                "#,
                &[schema.unwrap_or(database.as_str()), table],
                self.timeouts.query,
            )
            .await?;

        rows.iter()
            .map(|row| column_info(row).map_err(|e| query_failed(&e)))
            .collect()
    }

    async fn execute_query(&self, query: &str) -> AdapterResult<QueryResult> {
        let session = self.session()?;
        let sql = query.trim();
        if sql.is_empty() {
            return Err(AdapterError::query_failed("empty query"));
        }

        let kind = classify(sql);
        let limit = self.timeouts.query;
        let start = Instant::now();

        if kind == QueryKind::Use {
            let database = use_target(sql)
                .ok_or_else(|| AdapterError::query_failed("USE expects a single database name"))?;
            session.switch(&database, limit).await?;
            return Ok(QueryResult::status(
                format!("Database changed to {}", database),
                start.elapsed(),
            ));
        }

        let mut checkout = session.checkout(limit).await?;
        let outcome = if kind.returns_rows() {
            timeout(limit, fetch_result(&mut checkout.conn, sql, start)).await
        } else {
            timeout(limit, execute_effect(&mut checkout.conn, sql, start)).await
        };

        let result = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(query_failed(&e)),
            Err(_) => {
                warn!("MySQL: {} exceeded {:?}, killing", kind, limit);
                Err(session.abandon(checkout, limit).await)
            }
        };

        match &result {
            Ok(result) => debug!(
                "MySQL: {} finished in {:?}: {}",
                kind, result.execution_time, result.message
            ),
            Err(err) => warn!("MySQL: {} failed: {}", kind, err),
        }
        result
    }
}

async fn fetch_result(
    conn: &mut PoolConnection<MySql>,
    sql: &str,
    start: Instant,
) -> Result<QueryResult, sqlx::Error> {
    let rows = (&mut **conn).fetch_all(sqlx::raw_sql(sql)).await?;
    let columns = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => describe_columns(conn, sql).await,
    };
    Ok(QueryResult::rows(columns, normalize_rows(&rows), start.elapsed()))
}

async fn execute_effect(
    conn: &mut PoolConnection<MySql>,
    sql: &str,
    start: Instant,
) -> Result<QueryResult, sqlx::Error> {
    let done = (&mut **conn).execute(sqlx::raw_sql(sql)).await?;
    Ok(QueryResult::affected(
        done.rows_affected(),
        Some(done.last_insert_id()),
        start.elapsed(),
    ))
}

/// Column names of a statement that returned no rows.
///
/// Falls back to no columns for statements the server will not prepare.
async fn describe_columns(conn: &mut PoolConnection<MySql>, sql: &str) -> Vec<String> {
    match (&mut **conn).prepare(sql).await {
        Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
        Err(e) => {
            debug!("MySQL: could not describe empty result: {}", e);
            Vec::new()
        }
    }
}

fn column_info(row: &MySqlRow) -> Result<ColumnInfo, sqlx::Error> {
    let data_type: String = row.try_get(1)?;
    let is_nullable: Option<String> = row.try_get(2)?;
    let ordinal: i64 = row.try_get(7)?;
    let is_primary: Option<i64> = row.try_get(8)?;
    Ok(ColumnInfo {
        name: row.try_get(0)?,
        type_info: derive_type_info(&data_type, row.try_get(4)?, row.try_get(5)?, row.try_get(6)?),
        data_type,
        is_nullable: parse_nullable(is_nullable.as_deref()),
        default_value: row.try_get(3)?,
        ordinal_position: i32::try_from(ordinal).unwrap_or(i32::MAX),
        is_primary_key: is_primary.unwrap_or(0) != 0,
    })
}

/// The database is not part of the connect options: it is selected with
/// `USE` on checkout, so new connections survive the database being dropped.
fn build_connect_options(params: &ConnectionParams, opts: &MySqlOptions) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .ssl_mode(match opts.ssl_mode {
            MySqlSslMode::Disabled => sqlx::mysql::MySqlSslMode::Disabled,
            MySqlSslMode::Preferred => sqlx::mysql::MySqlSslMode::Preferred,
            MySqlSslMode::Required => sqlx::mysql::MySqlSslMode::Required,
            MySqlSslMode::VerifyCa => sqlx::mysql::MySqlSslMode::VerifyCa,
            MySqlSslMode::VerifyIdentity => sqlx::mysql::MySqlSslMode::VerifyIdentity,
        });
    if !params.password.is_empty() {
        options = options.password(&params.password);
    }
    if let Some(charset) = &opts.charset {
        options = options.charset(charset);
    }
    if let Some(tz) = &opts.timezone {
        options = options.timezone(Some(tz.clone()));
    }
    options
}

/// One `SET SESSION` statement for all configured session variables.
///
/// Names are validated as plain identifiers before a session is opened;
/// finite numbers are sent bare, everything else as a quoted string.
fn session_init_sql(opts: &MySqlOptions) -> Option<String> {
    let assignments: Vec<String> = opts
        .session_variables
        .iter()
        .filter(|(name, _)| is_plain_identifier(name))
        .map(|(name, value)| {
            let literal = if value.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                value.clone()
            } else {
                format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
            };
            format!("{} = {}", name, literal)
        })
        .collect();
    if assignments.is_empty() {
        None
    } else {
        Some(format!("SET SESSION {}", assignments.join(", ")))
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn normalize_rows(rows: &[MySqlRow]) -> Vec<Vec<CellValue>> {
    rows.iter()
        .map(|row| (0..row.columns().len()).map(|i| extract_value(row, i)).collect())
        .collect()
}

/// Numeric columns decode to numbers; everything else arrives from the text
/// protocol as bytes and goes through the binary check.
fn extract_value(row: &MySqlRow, idx: usize) -> CellValue {
    let type_name = row.columns()[idx].type_info().name();
    match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => numeric(row, idx, CellValue::Int),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => numeric(row, idx, CellValue::UInt),
        "FLOAT" | "DOUBLE" => numeric(row, idx, CellValue::Float),
        "DECIMAL" => numeric::<Decimal, _>(row, idx, CellValue::Decimal),
        _ => raw_value(row, idx),
    }
}

fn numeric<'r, T, F>(row: &'r MySqlRow, idx: usize, convert: F) -> CellValue
where
    T: Decode<'r, MySql> + sqlx::Type<MySql>,
    F: FnOnce(T) -> CellValue,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => convert(v),
        Ok(None) => CellValue::Null,
        Err(_) => raw_value(row, idx),
    }
}

fn raw_value(row: &MySqlRow, idx: usize) -> CellValue {
    match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        Ok(bytes) => CellValue::from(bytes),
        Err(e) => CellValue::text(format!("<unreadable value: {}>", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_connect_options_from_params() {
        let mut params = ConnectionParams::mysql("db.local", "shop_app", Some("shop"));
        params.port = 3307;
        let opts = MySqlOptions::default();
        let options = build_connect_options(&params, &opts);
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "shop_app");
        // selected per checkout, never baked into new connections
        assert_eq!(options.get_database(), None);
    }

    #[test]
    fn test_session_init_sql() {
        let mut vars = BTreeMap::new();
        vars.insert("wait_timeout".to_string(), "60".to_string());
        vars.insert("sql_mode".to_string(), "ANSI_QUOTES,STRICT_ALL_TABLES".to_string());
        vars.insert("time_zone".to_string(), "it's".to_string());
        vars.insert("lock_wait_timeout".to_string(), "inf".to_string());
        let opts = MySqlOptions {
            session_variables: vars,
            ..MySqlOptions::default()
        };
        assert_eq!(
            session_init_sql(&opts).as_deref(),
            Some(
                "SET SESSION lock_wait_timeout = 'inf', \
                 sql_mode = 'ANSI_QUOTES,STRICT_ALL_TABLES', \
                 time_zone = 'it''s', wait_timeout = 60"
            )
        );
    }

    #[test]
    fn test_session_init_sql_skips_bad_names() {
        let mut vars = BTreeMap::new();
        vars.insert("x; DROP TABLE t".to_string(), "1".to_string());
        let opts = MySqlOptions {
            session_variables: vars,
            ..MySqlOptions::default()
        };
        assert_eq!(session_init_sql(&opts), None);
        assert_eq!(session_init_sql(&MySqlOptions::default()), None);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("shop"), "`shop`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_non_database_errors_are_not_unknown_database() {
        assert!(!is_unknown_database(&sqlx::Error::PoolTimedOut));
        assert!(!is_unknown_database(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_unconnected_operations() {
        let mut adapter = MySqlAdapter::new(Timeouts::default());
        assert!(matches!(adapter.get_databases().await, Err(AdapterError::NotConnected)));
        assert!(matches!(adapter.get_table_info("t").await, Err(AdapterError::NotConnected)));
        assert!(matches!(adapter.use_database("shop").await, Err(AdapterError::NotConnected)));
        assert!(matches!(
            adapter.execute_query("USE shop").await,
            Err(AdapterError::NotConnected)
        ));
        assert!(matches!(
            adapter.use_database("  ").await,
            Err(AdapterError::InvalidParameters(_))
        ));
        adapter.disconnect().await;
        assert_eq!(adapter.get_current_database(), "");
    }
}
