//! PostgreSQL adapter.
//!
//! A PostgreSQL connection is bound to one database for its whole life, so
//! switching databases closes the pool and reconnects with the retained
//! parameters.

use crate::db::adapter::{DatabaseAdapter, SessionState};
use crate::db::connection::{
    ConnectionParams, Engine, EngineOptions, PgSslMode, PostgresOptions, Timeouts,
    MAX_CONNECTION_LIFETIME, MAX_IDLE_CONNECTIONS, MAX_OPEN_CONNECTIONS, PING_TIMEOUT,
};
use crate::db::error::{AdapterError, AdapterResult, QueryError};
use crate::db::query::{classify, normalize_bytes, CellValue, QueryResult};
use crate::db::schema::{derive_type_info, parse_nullable, split_qualified, ColumnInfo};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use std::cell::Cell;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{NoTls, Row, SimpleQueryMessage};
use tracing::{debug, info, warn};

/// Database used for server-level sessions, when no database was requested.
const MAINTENANCE_DATABASE: &str = "postgres";

/// Databases that never hold user data.
const SYSTEM_DATABASES: &[&str] = &["template0", "template1", "rdsadmin"];

pub struct PostgresAdapter {
    timeouts: Timeouts,
    session: Option<PgSession>,
}

struct PgSession {
    pool: Pool,
    /// Kept verbatim so a database switch can reconnect without re-deriving anything.
    params: ConnectionParams,
    /// Same transport the pool uses, needed to send cancel requests.
    tls: Option<MakeTlsConnector>,
}

impl PostgresAdapter {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            session: None,
        }
    }

    fn session(&self) -> AdapterResult<&PgSession> {
        self.session.as_ref().ok_or(AdapterError::NotConnected)
    }

    /// Session with a selected database, for catalog calls scoped to it.
    fn database_session(&self) -> AdapterResult<&PgSession> {
        let session = self.session()?;
        if session.params.database.is_none() {
            return Err(AdapterError::NoDatabaseSelected);
        }
        Ok(session)
    }
}

impl PgSession {
    async fn open(
        params: &ConnectionParams,
        opts: &PostgresOptions,
        timeouts: Timeouts,
    ) -> AdapterResult<Self> {
        let pg_config = build_pg_config(params, opts, timeouts.connect);
        let tls = match opts.ssl_mode {
            PgSslMode::Disable => None,
            PgSslMode::Prefer | PgSslMode::Require => Some(build_tls_connector(opts, false)?),
            PgSslMode::VerifyCa | PgSslMode::VerifyFull => Some(build_tls_connector(opts, true)?),
        };

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = match &tls {
            None => Manager::from_config(pg_config, NoTls, manager_config),
            Some(tls) => Manager::from_config(pg_config, tls.clone(), manager_config),
        };
        let pool = Pool::builder(manager)
            .max_size(MAX_OPEN_CONNECTIONS)
            .wait_timeout(Some(timeouts.connect))
            .create_timeout(Some(timeouts.connect))
            .recycle_timeout(Some(PING_TIMEOUT))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))?;

        let session = PgSession {
            pool,
            params: params.clone(),
            tls,
        };
        if let Err(err) = session.ping().await {
            session.pool.close();
            return Err(err);
        }
        Ok(session)
    }

    async fn ping(&self) -> AdapterResult<()> {
        let client = self.client().await?;
        let outcome = timeout(PING_TIMEOUT, client.simple_query("SELECT 1")).await;
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AdapterError::ConnectionFailed(e.to_string())),
            Err(_) => {
                drop(Object::take(client));
                Err(AdapterError::ConnectionFailed(format!(
                    "server did not answer ping within {}s",
                    PING_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Check out a connection after dropping expired and surplus idle ones.
    async fn client(&self) -> AdapterResult<Object> {
        self.prune();
        self.pool
            .get()
            .await
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))
    }

    fn prune(&self) {
        let surplus = self
            .pool
            .status()
            .available
            .saturating_sub(MAX_IDLE_CONNECTIONS);
        let dropped = Cell::new(0usize);
        let _ = self.pool.retain(|_, metrics| {
            if metrics.age() >= MAX_CONNECTION_LIFETIME {
                return false;
            }
            if dropped.get() < surplus {
                dropped.set(dropped.get() + 1);
                return false;
            }
            true
        });
    }

    /// Run a catalog query bound by `limit`.
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        limit: Duration,
    ) -> AdapterResult<Vec<Row>> {
        let client = self.client().await?;
        let outcome = timeout(limit, client.query(sql, params)).await;
        match outcome {
            Ok(rows) => rows.map_err(|e| AdapterError::QueryFailed(QueryError::from_pg_error(&e, sql))),
            Err(_) => Err(self.abandon(client, limit).await),
        }
    }

    /// Cancel whatever `client` is running and keep it out of the pool.
    async fn abandon(&self, client: Object, limit: Duration) -> AdapterError {
        let token = client.cancel_token();
        let cancel = async {
            match &self.tls {
                None => token.cancel_query(NoTls).await,
                Some(tls) => token.cancel_query(tls.clone()).await,
            }
        };
        match timeout(PING_TIMEOUT, cancel).await {
            Ok(Ok(())) => debug!("PostgreSQL: cancel request sent"),
            Ok(Err(e)) => warn!("PostgreSQL: cancel request failed: {}", e),
            Err(_) => warn!("PostgreSQL: cancel request timed out"),
        }
        drop(Object::take(client));
        AdapterError::Timeout(limit)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Unconnected,
            Some(session) => match &session.params.database {
                Some(db) => SessionState::ConnectedWithDatabase(db.clone()),
                None => SessionState::ConnectedNoDatabase,
            },
        }
    }

    async fn connect(&mut self, params: &ConnectionParams) -> AdapterResult<()> {
        self.disconnect().await;

        let opts = match &params.options {
            EngineOptions::Postgres(opts) => opts,
            EngineOptions::MySql(_) => {
                return Err(AdapterError::invalid(format!(
                    "PostgreSQL adapter cannot use {} parameters",
                    params.engine()
                )))
            }
        };
        params.validate()?;

        match PgSession::open(params, opts, self.timeouts).await {
            Ok(session) => {
                info!("PostgreSQL: connected to {}", params.display_string());
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                warn!(
                    "PostgreSQL: connection to {} failed: {}",
                    params.display_string(),
                    err
                );
                Err(err)
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.pool.close();
            info!(
                "PostgreSQL: disconnected from {}",
                session.params.display_string()
            );
        }
    }

    async fn get_databases(&self) -> AdapterResult<Vec<String>> {
        let session = self.session()?;
        let rows = session
            .query(
                r#"
                SELECT datname::text
                FROM pg_catalog.pg_database
                WHERE datistemplate = false AND datallowconn
                ORDER BY datname
                "#,
                &[],
                self.timeouts.query,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<_, String>(0))
            .filter(|name| !SYSTEM_DATABASES.contains(&name.as_str()))
            .collect())
    }

    async fn use_database(&mut self, name: &str) -> AdapterResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdapterError::invalid("database name must not be empty"));
        }
        let params = self
            .session()?
            .params
            .with_database(Some(name.to_string()));

        info!("PostgreSQL: switching to database {} (reconnect)", name);
        match self.connect(&params).await {
            Ok(()) => Ok(()),
            Err(err @ AdapterError::ConnectionFailed(_)) => Err(err),
            Err(other) => Err(AdapterError::ConnectionFailed(other.to_string())),
        }
    }

    async fn get_tables(&self) -> AdapterResult<Vec<String>> {
        let session = self.database_session()?;
        let rows = session
            .query(
                r#"
                SELECT table_name::text
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                  AND table_type IN ('BASE TABLE', 'VIEW')
                ORDER BY table_name
                "#,
                &[],
                self.timeouts.query,
            )
            .await?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn get_table_info(&self, table: &str) -> AdapterResult<Vec<ColumnInfo>> {
        let session = self.database_session()?;
        let (schema, table) = split_qualified(table.trim());
        let rows = session
            .query(
                r#"
                SELECT
                    c.column_name::text AS name,
                    c.data_type::text AS data_type,
                    c.is_nullable::text AS is_nullable,
                    c.column_default::text AS default_value,
                    c.character_maximum_length::int8 AS char_length,
                    c.numeric_precision::int8 AS numeric_precision,
                    c.numeric_scale::int8 AS numeric_scale,
                    c.ordinal_position::int4 AS ordinal_position,
                    EXISTS (
                        SELECT 1
                        FROM information_schema.table_constraints tc
                        JOIN information_schema.key_column_usage kcu
                            ON tc.constraint_name = kcu.constraint_name
                            AND tc.table_schema = kcu.table_schema
                            AND tc.table_name = kcu.table_name
                        WHERE tc.constraint_type = 'PRIMARY KEY'
                          AND tc.table_schema = c.table_schema
                          AND tc.table_name = c.table_name
                          AND kcu.column_name = c.column_name
                    ) AS is_primary_key
                FROM information_schema.columns c
                WHERE c.table_schema::text = COALESCE($1::text, current_schema()::text)
                  AND c.table_name::text = $2::text
                ORDER BY c.ordinal_position
                "#,
                &[&schema, &table],
                self.timeouts.query,
            )
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let data_type: String = row.get("data_type");
                let is_nullable: Option<String> = row.get("is_nullable");
                ColumnInfo {
                    name: row.get("name"),
                    type_info: derive_type_info(
                        &data_type,
                        row.get("char_length"),
                        row.get("numeric_precision"),
                        row.get("numeric_scale"),
                    ),
                    data_type,
                    is_nullable: parse_nullable(is_nullable.as_deref()),
                    default_value: row.get("default_value"),
                    ordinal_position: row.get("ordinal_position"),
                    is_primary_key: row.get("is_primary_key"),
                }
            })
            .collect();

        Ok(columns)
    }

    async fn execute_query(&self, query: &str) -> AdapterResult<QueryResult> {
        let session = self.session()?;
        let sql = query.trim();
        if sql.is_empty() {
            return Err(AdapterError::query_failed("empty query"));
        }

        let kind = classify(sql);
        let start = Instant::now();
        let client = session.client().await?;

        let work = async {
            if kind.returns_rows() {
                let stmt = client.prepare(sql).await?;
                let columns = stmt
                    .columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect();
                let types: Vec<Type> = stmt.columns().iter().map(|col| col.type_().clone()).collect();
                let messages = client.simple_query(sql).await?;
                Ok::<_, tokio_postgres::Error>(QueryResult::rows(
                    columns,
                    normalize_rows(&types, &messages),
                    start.elapsed(),
                ))
            } else {
                let affected = client.execute(sql, &[]).await?;
                Ok(QueryResult::affected(affected, None, start.elapsed()))
            }
        };
        let outcome = timeout(self.timeouts.query, work).await;

        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    "PostgreSQL: {} finished in {:?}: {}",
                    kind, result.execution_time, result.message
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                let err = QueryError::from_pg_error(&e, sql);
                warn!("PostgreSQL: {} failed: {}", kind, err);
                Err(AdapterError::QueryFailed(err))
            }
            Err(_) => {
                warn!(
                    "PostgreSQL: {} exceeded {:?}, cancelling",
                    kind, self.timeouts.query
                );
                Err(session.abandon(client, self.timeouts.query).await)
            }
        }
    }
}

/// Typed driver configuration built straight from the structured parameters.
fn build_pg_config(
    params: &ConnectionParams,
    opts: &PostgresOptions,
    connect_timeout: Duration,
) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .user(&params.user)
        .dbname(params.database.as_deref().unwrap_or(MAINTENANCE_DATABASE))
        .connect_timeout(connect_timeout)
        .ssl_mode(match opts.ssl_mode {
            PgSslMode::Disable => tokio_postgres::config::SslMode::Disable,
            PgSslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        });
    if !params.password.is_empty() {
        config.password(&params.password);
    }
    if let Some(search_path) = &opts.search_path {
        config.options(&format!(
            "-c search_path={}",
            search_path.replace('\\', "\\\\").replace(' ', "\\ ")
        ));
    }
    if let Some(name) = &opts.application_name {
        config.application_name(name);
    }
    config
}

/// Build a TLS connector with appropriate certificate configuration.
///
/// `strict_verify` is set for verify-ca / verify-full; `accept_invalid_certs`
/// is ignored there.
fn build_tls_connector(opts: &PostgresOptions, strict_verify: bool) -> AdapterResult<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if opts.accept_invalid_certs && !strict_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else {
        if let Some(ca_path) = &opts.ca_cert_path {
            let pem = std::fs::read(ca_path).map_err(|e| {
                AdapterError::invalid(format!("failed to read CA certificate {}: {}", ca_path, e))
            })?;
            let cert = native_tls::Certificate::from_pem(&pem).map_err(|e| {
                AdapterError::invalid(format!("failed to parse CA certificate {}: {}", ca_path, e))
            })?;
            builder.add_root_certificate(cert);
        }
        if opts.ssl_mode == PgSslMode::VerifyCa {
            builder.danger_accept_invalid_hostnames(true);
        }
    }

    let connector = builder
        .build()
        .map_err(|e| AdapterError::ConnectionFailed(format!("failed to build TLS connector: {}", e)))?;
    Ok(MakeTlsConnector::new(connector))
}

/// Convert the text-protocol rows of one result set, typed by the prepared
/// statement's columns.
fn normalize_rows(types: &[Type], messages: &[SimpleQueryMessage]) -> Vec<Vec<CellValue>> {
    let mut rows = Vec::new();
    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => rows.push(
                (0..row.len())
                    .map(|i| match types.get(i) {
                        Some(pg_type) => text_cell(pg_type, row.get(i)),
                        None => text_cell(&Type::TEXT, row.get(i)),
                    })
                    .collect(),
            ),
            SimpleQueryMessage::CommandComplete(_) => break,
            _ => {}
        }
    }
    rows
}

/// Turn a value in the server's text format into a cell.
///
/// Integers, floats and numerics become numbers when they parse; `bytea`
/// hex output goes through the binary check. Every other type keeps the text
/// the server rendered (`1 day`, `192.168.1.10/24`, `$12.34`, `infinity`).
fn text_cell(pg_type: &Type, value: Option<&str>) -> CellValue {
    let Some(text) = value else {
        return CellValue::Null;
    };
    match *pg_type {
        Type::BOOL => CellValue::text(match text {
            "t" => "true",
            "f" => "false",
            other => other,
        }),
        Type::INT2 | Type::INT4 | Type::INT8 => parsed(text, CellValue::Int),
        Type::OID => parsed(text, CellValue::UInt),
        Type::FLOAT4 | Type::FLOAT8 => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => CellValue::text(text),
        },
        Type::NUMERIC => parsed(text, CellValue::Decimal),
        Type::BYTEA => match text.strip_prefix("\\x").and_then(decode_hex) {
            Some(bytes) => normalize_bytes(&bytes),
            None => CellValue::text(text),
        },
        _ => CellValue::text(text),
    }
}

/// Parse into a number, keeping the text when it does not fit (`NaN`, oversized numerics).
fn parsed<T: FromStr>(text: &str, convert: impl FnOnce(T) -> CellValue) -> CellValue {
    match text.parse() {
        Ok(v) => convert(v),
        Err(_) => CellValue::text(text),
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
