use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::backend::{MessageStore, PersistenceError, RecordId};

/// Stand-in used when no storage backend is available.
#[derive(Debug, Default)]
pub struct NoopMessageStore;

impl NoopMessageStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageStore for NoopMessageStore {
    fn backend_name(&self) -> &'static str {
        "none"
    }

    async fn append(
        &self,
        _chat_id: &str,
        _sender_id: &str,
        _text: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<RecordId, PersistenceError> {
        Err(PersistenceError::Unavailable)
    }
}
