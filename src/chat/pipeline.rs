use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::config::Settings;
use crate::connection_manager::{ConnectionHandle, ConnectionManager};
use crate::metrics::{MessageMetrics, PersistenceMetrics};
use crate::persistence::{MessageStore, PersistenceError, RecordId};
use crate::websocket::ServerMessage;

use super::types::{ChatMessage, OutboundChatMessage};

/// Maximum number of recipient sends in flight for one message
const MAX_CONCURRENT_SENDS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Upper bound for handing the message to one recipient
    pub send_timeout: Duration,
    /// Upper bound for the persistence attempt
    pub write_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            send_timeout: Duration::from_millis(settings.websocket.send_timeout_ms),
            write_timeout: Duration::from_millis(settings.persistence.write_timeout_ms),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(2000),
        }
    }
}

/// Outcome of one `send_message` call. Never sent back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub chat_id: String,
    /// Record id when persistence succeeded
    pub record_id: Option<RecordId>,
    /// Number of connections the message was handed to
    pub delivered: usize,
    /// Number of recipients whose delivery was dropped
    pub failed: usize,
}

impl DeliveryResult {
    pub fn persisted(&self) -> bool {
        self.record_id.is_some()
    }
}

#[derive(Debug, Default)]
struct PipelineStats {
    messages_received: AtomicU64,
    messages_persisted: AtomicU64,
    persistence_failures: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
}

impl PipelineStats {
    fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_persisted: self.messages_persisted.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatsSnapshot {
    pub messages_received: u64,
    pub messages_persisted: u64,
    pub persistence_failures: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
}

/// Persists and fans out chat messages.
///
/// For each message: one persistence attempt, then the sender joins the room, then
/// every current member (the sender included) gets a `new_message` event. Neither a
/// failed append nor a failed recipient affects any other step.
pub struct MessagePipeline {
    connection_manager: Arc<ConnectionManager>,
    store: Arc<dyn MessageStore>,
    config: PipelineConfig,
    stats: PipelineStats,
}

impl MessagePipeline {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        store: Arc<dyn MessageStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            connection_manager,
            store,
            config,
            stats: PipelineStats::default(),
        }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Upper bound for handing one frame to one connection
    pub fn send_timeout(&self) -> Duration {
        self.config.send_timeout
    }

    #[tracing::instrument(
        name = "pipeline.send_message",
        skip(self, sender, message),
        fields(
            connection_id = %sender.id,
            chat_id = %message.chat_id
        )
    )]
    pub async fn send_message(
        &self,
        sender: &Arc<ConnectionHandle>,
        mut message: ChatMessage,
    ) -> DeliveryResult {
        if message.sender_id.is_empty() {
            message.sender_id = sender.user_id.clone();
        }

        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        MessageMetrics::record_received();

        let outbound = match self.persist(&message).await {
            Some((id, timestamp)) => OutboundChatMessage::persisted(message, id, timestamp),
            None => OutboundChatMessage::unpersisted(message),
        };
        let chat_id = outbound.message.chat_id.clone();
        let record_id = outbound.id;

        // Sending always subscribes the sender, whether or not it joined first
        self.connection_manager.join(sender, &chat_id);

        let members = self.connection_manager.room_members(&chat_id);
        let (delivered, failed) = self
            .fan_out(&members, ServerMessage::NewMessage(outbound))
            .await;

        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
        MessageMetrics::record_delivered(delivered as u64);
        MessageMetrics::record_failed(failed as u64);

        tracing::debug!(
            chat_id = %chat_id,
            record_id = ?record_id,
            delivered = delivered,
            failed = failed,
            "Message broadcast to room"
        );

        DeliveryResult {
            chat_id,
            record_id,
            delivered,
            failed,
        }
    }

    /// Single best-effort append. Every failure is logged and swallowed.
    async fn persist(&self, message: &ChatMessage) -> Option<(RecordId, DateTime<Utc>)> {
        let timestamp = Utc::now();
        let start = Instant::now();

        let append = self.store.append(
            &message.chat_id,
            &message.sender_id,
            &message.text,
            timestamp,
        );

        match tokio::time::timeout(self.config.write_timeout, append).await {
            Ok(Ok(id)) => {
                PersistenceMetrics::record_stored(start.elapsed().as_secs_f64());
                self.stats
                    .messages_persisted
                    .fetch_add(1, Ordering::Relaxed);
                Some((id, timestamp))
            }
            Ok(Err(PersistenceError::Unavailable)) => {
                PersistenceMetrics::record_unavailable();
                None
            }
            Ok(Err(e)) => {
                PersistenceMetrics::record_failed(start.elapsed().as_secs_f64());
                self.stats
                    .persistence_failures
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    chat_id = %message.chat_id,
                    backend = self.store.backend_name(),
                    error = %e,
                    "Failed to persist message, broadcasting anyway"
                );
                None
            }
            Err(_) => {
                PersistenceMetrics::record_timeout();
                self.stats
                    .persistence_failures
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    chat_id = %message.chat_id,
                    backend = self.store.backend_name(),
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "Message persistence timed out, broadcasting anyway"
                );
                None
            }
        }
    }

    /// Hand the message to every connection concurrently with bounded parallelism.
    /// A recipient that is closed or stays full past the send timeout is skipped.
    /// Successful delivery counts as activity for stale-connection cleanup.
    async fn fan_out(
        &self,
        connections: &[Arc<ConnectionHandle>],
        message: ServerMessage,
    ) -> (usize, usize) {
        let send_timeout = self.config.send_timeout;
        let mut futures = FuturesUnordered::new();
        let mut delivered = 0;
        let mut failed = 0;

        for conn in connections {
            let conn = conn.clone();
            let msg = message.clone();
            futures.push(async move {
                match conn.send_timeout(msg, send_timeout).await {
                    Ok(()) => {
                        // A recipient that keeps draining its buffer is alive, even if it never writes
                        conn.update_activity();
                        true
                    }
                    Err(SendTimeoutError::Timeout(_)) => {
                        tracing::debug!(connection_id = %conn.id, "Recipient send timed out, dropping message");
                        false
                    }
                    Err(SendTimeoutError::Closed(_)) => {
                        tracing::debug!(connection_id = %conn.id, "Recipient channel closed, dropping message");
                        false
                    }
                }
            });

            // Drain completed sends when we hit the concurrency limit
            while futures.len() >= MAX_CONCURRENT_SENDS {
                match futures.next().await {
                    Some(true) => delivered += 1,
                    Some(false) => failed += 1,
                    None => break,
                }
            }
        }

        while let Some(ok) = futures.next().await {
            if ok {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        (delivered, failed)
    }
}
