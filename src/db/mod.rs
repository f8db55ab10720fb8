mod adapter;
mod connection;
mod error;
mod mysql;
mod postgres;
mod query;
mod schema;

pub use adapter::*;
pub use connection::*;
pub use error::*;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use query::*;
pub use schema::*;
