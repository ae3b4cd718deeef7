//! Message store factory

use std::sync::Arc;

use crate::config::PersistenceConfig;
use crate::postgres::PostgresPool;

use super::backend::MessageStore;
use super::memory_backend::MemoryMessageStore;
use super::noop_backend::NoopMessageStore;
use super::postgres_backend::PostgresMessageStore;

/// Create the message store selected by configuration.
///
/// - `"postgres"`: connects a pool and prepares the schema; on any failure the relay keeps
///   running with a `NoopMessageStore`
/// - `"memory"`: `MemoryMessageStore`
/// - anything else: `NoopMessageStore`
///
/// The returned pool is `Some` only when the PostgreSQL backend came up, so the caller can
/// close it on shutdown.
pub async fn create_message_store(
    settings: &PersistenceConfig,
) -> (Arc<dyn MessageStore>, Option<PostgresPool>) {
    match settings.backend.as_str() {
        "postgres" => match connect_postgres(settings).await {
            Ok((store, pool)) => {
                tracing::info!(backend = "postgres", "Creating PostgreSQL message store");
                (Arc::new(store), Some(pool))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "PostgreSQL message store unavailable, messages will not be persisted"
                );
                (Arc::new(NoopMessageStore::new()), None)
            }
        },
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory message store");
            (Arc::new(MemoryMessageStore::new()), None)
        }
        other => {
            tracing::info!(backend = %other, "Message persistence disabled");
            (Arc::new(NoopMessageStore::new()), None)
        }
    }
}

async fn connect_postgres(
    settings: &PersistenceConfig,
) -> Result<(PostgresMessageStore, PostgresPool), super::PersistenceError> {
    let pool = PostgresPool::connect(settings).await?;
    let store = PostgresMessageStore::new(pool.pool().clone());
    store.ensure_schema().await?;
    Ok((store, pool))
}
