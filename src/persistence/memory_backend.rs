//! In-memory message store.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::backend::{MessageStore, PersistenceError, RecordId, StoredRecord};

/// Keeps every appended message in process memory, ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    records: RwLock<Vec<StoredRecord>>,
    next_id: AtomicI64,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored records, in append order.
    pub async fn records(&self) -> Vec<StoredRecord> {
        self.records.read().await.clone()
    }

    /// Records stored for one chat.
    pub async fn records_for(&self, chat_id: &str) -> Vec<StoredRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn append(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<RecordId, PersistenceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        self.records.write().await.push(StoredRecord {
            id,
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            created_at: timestamp,
        });

        tracing::trace!(record_id = id, chat_id = %chat_id, "Message stored in memory");

        Ok(id)
    }
}
