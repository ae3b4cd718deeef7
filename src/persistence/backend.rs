//! Backend trait for message storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Identifier assigned by the storage backend to an appended message.
pub type RecordId = i64;

/// Errors that can occur during an append.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No backend is configured or it could not be reached at startup
    #[error("Persistence unavailable")]
    Unavailable,

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Any other backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A message as it was written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only sink for chat messages.
///
/// Every call is a single attempt. Callers treat any error as non-fatal and never retry.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Short backend identifier used in logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Append one message and return the record id the backend assigned.
    async fn append(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<RecordId, PersistenceError>;
}
