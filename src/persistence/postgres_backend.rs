//! PostgreSQL-based message store.
//!
//! Table structure:
//! - `messages` - one row per chat message, keyed by an auto-generated `BIGSERIAL` id

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::backend::{MessageStore, PersistenceError, RecordId};

const CREATE_MESSAGES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id BIGSERIAL PRIMARY KEY,
        chat_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        text TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_CHAT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_chat_id_created_at ON messages (chat_id, created_at)";

pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `messages` table and its index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(CREATE_MESSAGES_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_CHAT_INDEX).execute(&self.pool).await?;
        tracing::debug!("Message table schema verified");
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn append(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<RecordId, PersistenceError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (chat_id, sender_id, text, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(text)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(PersistenceError::Postgres)?;

        tracing::trace!(
            record_id = id,
            chat_id = %chat_id,
            sender_id = %sender_id,
            "Message stored in PostgreSQL"
        );

        Ok(id)
    }
}
