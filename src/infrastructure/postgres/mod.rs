//! PostgreSQL connection pooling for the message store.

pub mod pool;

pub use pool::PostgresPool;
