//! Uniform access to PostgreSQL and MySQL servers.
//!
//! Callers pick an engine with [`db::adapter_for`], then drive the returned
//! [`db::DatabaseAdapter`] through connect, discovery and query execution.
//! Results come back engine-neutral as [`db::QueryResult`] and
//! [`db::ColumnInfo`].

pub mod config;
pub mod db;
pub mod export;
