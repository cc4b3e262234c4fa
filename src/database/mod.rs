//! PostgreSQL connection pool and schema migrations

pub mod migrations;
mod pool;

pub use pool::Database;
