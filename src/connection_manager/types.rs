use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// User id assigned when the handshake carries none
pub const ANONYMOUS_USER: &str = "anonymous";

/// Handle for a single WebSocket connection
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: DateTime<Utc>,
    /// Last activity timestamp (Unix seconds) - using AtomicI64 for lock-free updates
    last_activity: AtomicI64,
    /// Rooms this connection belongs to; `None` once the connection is unregistered.
    /// Joins and cleanup both go through this lock so membership never outlives it.
    rooms: Mutex<Option<HashSet<String>>>,
    closed: Notify,
}

impl ConnectionHandle {
    pub fn new(user_id: String, sender: mpsc::Sender<ServerMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
            rooms: Mutex::new(Some(HashSet::new())),
            closed: Notify::new(),
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.sender.send(message).await
    }

    /// Send, giving up when the outbound buffer stays full for `timeout`
    pub async fn send_timeout(
        &self,
        message: ServerMessage,
        timeout: Duration,
    ) -> Result<(), mpsc::error::SendTimeoutError<ServerMessage>> {
        self.sender.send_timeout(message, timeout).await
    }

    /// Rooms currently joined (empty once closed)
    pub fn rooms(&self) -> Vec<String> {
        self.lock_rooms()
            .as_ref()
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_rooms().is_none()
    }

    /// Resolves once the connection has been unregistered
    pub async fn closed(&self) {
        self.closed.notified().await
    }

    pub(crate) fn lock_rooms(&self) -> MutexGuard<'_, Option<HashSet<String>>> {
        // Room sets hold plain strings; a panic mid-update cannot leave them inconsistent
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn notify_closed(&self) {
        // notify_one keeps a permit if the session is not waiting yet
        self.closed.notify_one();
    }
}

/// Result of a room join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// Connection is no longer registered; nothing was changed
    NotConnected,
}

impl JoinOutcome {
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Joined | Self::AlreadyMember)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_open_with_no_rooms() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new("u1".to_string(), tx);

        assert!(!handle.is_closed());
        assert!(handle.rooms().is_empty());
        assert_eq!(handle.user_id, "u1");
    }

    #[tokio::test]
    async fn test_send_timeout_on_full_buffer() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new("u1".to_string(), tx);

        handle.send(ServerMessage::Pong).await.unwrap();
        let result = handle
            .send_timeout(ServerMessage::Pong, Duration::from_millis(10))
            .await;
        assert!(matches!(
            result,
            Err(mpsc::error::SendTimeoutError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_permit_is_kept() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new("u1".to_string(), tx);

        handle.notify_closed();
        tokio::time::timeout(Duration::from_millis(100), handle.closed())
            .await
            .expect("closed() should resolve after notify");
    }

    #[test]
    fn test_join_outcome_membership() {
        assert!(JoinOutcome::Joined.is_member());
        assert!(JoinOutcome::AlreadyMember.is_member());
        assert!(!JoinOutcome::NotConnected.is_member());
    }
}
