use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::connection_manager::ConnectionManager;
use crate::websocket::ServerMessage;

/// Maximum concurrent heartbeat sends to avoid overwhelming the system
const MAX_CONCURRENT_HEARTBEATS: usize = 1000;

/// Background task for heartbeat frames and stale-connection cleanup
pub struct HeartbeatTask {
    config: WebSocketConfig,
    connection_manager: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: WebSocketConfig,
        connection_manager: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            connection_manager,
            shutdown,
        }
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self) {
        let mut heartbeat_timer =
            tokio::time::interval(Duration::from_secs(self.config.heartbeat_interval));
        let mut cleanup_timer =
            tokio::time::interval(Duration::from_secs(self.config.cleanup_interval));

        // Skip immediate first tick
        heartbeat_timer.tick().await;
        cleanup_timer.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            cleanup_interval_secs = self.config.cleanup_interval,
            connection_timeout_secs = self.config.connection_timeout,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = heartbeat_timer.tick() => {
                    self.send_heartbeats().await;
                }
                _ = cleanup_timer.tick() => {
                    self.cleanup_stale_connections();
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    /// Send a heartbeat frame to every connection, in batches
    async fn send_heartbeats(&self) {
        let connections = self.connection_manager.get_all_connections();
        if connections.is_empty() {
            return;
        }

        let start = Instant::now();
        let send_timeout = Duration::from_millis(self.config.send_timeout_ms);
        let mut sent = 0usize;

        for batch in connections.chunks(MAX_CONCURRENT_HEARTBEATS) {
            let results = join_all(batch.iter().map(|handle| async move {
                let result = handle
                    .send_timeout(ServerMessage::Heartbeat, send_timeout)
                    .await;
                if result.is_err() {
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Failed to send heartbeat, connection may be dead"
                    );
                }
                result.is_ok()
            }))
            .await;

            sent += results.into_iter().filter(|ok| *ok).count();
        }

        tracing::debug!(
            total = connections.len(),
            sent = sent,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Heartbeat round completed"
        );
    }

    fn cleanup_stale_connections(&self) {
        let timeout_secs = self.config.connection_timeout;
        let removed = self
            .connection_manager
            .cleanup_stale_connections(timeout_secs);

        if removed > 0 {
            tracing::info!(
                removed = removed,
                timeout_secs = timeout_secs,
                "Cleaned up stale connections"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_heartbeat_task_shutdown() {
        let config = WebSocketConfig::default();
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = HeartbeatTask::new(config, connection_manager, shutdown_rx);
        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_heartbeat_sends_to_connections() {
        let config = WebSocketConfig {
            heartbeat_interval: 1,
            connection_timeout: 60,
            cleanup_interval: 60,
            ..Default::default()
        };
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let (tx, mut rx) = mpsc::channel::<ServerMessage>(10);
        let _handle = connection_manager.register(Some("user1".to_string()), tx);

        let task = HeartbeatTask::new(config, connection_manager, shutdown_rx);
        let task_handle = tokio::spawn(async move {
            task.run().await;
        });

        let msg = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("Should receive heartbeat")
            .expect("Channel should not be closed");

        assert!(matches!(msg, ServerMessage::Heartbeat));

        shutdown_tx.send(()).unwrap();
        let _ = task_handle.await;
    }
}
