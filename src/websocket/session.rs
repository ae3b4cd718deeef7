//! Per-connection session lifecycle.
//!
//! A session is `Connected` from `connect()` until `disconnect()`, which is terminal.
//! Disconnect also runs on drop, so cleanup happens however the socket handler exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::{ChatMessage, DeliveryResult, MessagePipeline};
use crate::connection_manager::{ConnectionHandle, ConnectionManager, JoinOutcome};
use crate::metrics::WsMessageMetrics;

use super::message::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

pub struct Session {
    handle: Arc<ConnectionHandle>,
    connection_manager: Arc<ConnectionManager>,
    pipeline: Arc<MessagePipeline>,
    disconnected: AtomicBool,
}

impl Session {
    /// Register a new connection for `user_id` (anonymous when absent)
    pub fn connect(
        connection_manager: Arc<ConnectionManager>,
        pipeline: Arc<MessagePipeline>,
        user_id: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        let handle = connection_manager.register(user_id, sender);

        Self {
            handle,
            connection_manager,
            pipeline,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn user_id(&self) -> &str {
        &self.handle.user_id
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// `Disconnected` once `disconnect()` ran or the connection was removed elsewhere
    /// (stale-connection cleanup)
    pub fn state(&self) -> SessionState {
        if self.disconnected.load(Ordering::Acquire) || self.handle.is_closed() {
            SessionState::Disconnected
        } else {
            SessionState::Connected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Join a room. Joining a room twice is a no-op.
    pub fn join_chat_room(&self, room_id: &str) -> JoinOutcome {
        let outcome = self.connection_manager.join(&self.handle, room_id);
        if outcome == JoinOutcome::NotConnected {
            tracing::debug!(connection_id = %self.handle.id, room_id = %room_id, "Join after disconnect ignored");
        }
        outcome
    }

    /// Persist (best effort), join the sender to the message's room and broadcast it.
    /// `None` when the session is already disconnected.
    pub async fn send_message(&self, message: ChatMessage) -> Option<DeliveryResult> {
        if !self.is_connected() {
            tracing::debug!(connection_id = %self.handle.id, "Send after disconnect ignored");
            return None;
        }
        Some(self.pipeline.send_message(&self.handle, message).await)
    }

    /// Dispatch one parsed client event
    #[tracing::instrument(
        name = "ws.message",
        skip(self, msg),
        fields(
            connection_id = %self.handle.id,
            user_id = %self.handle.user_id,
            message_type = msg.kind()
        )
    )]
    pub async fn handle_event(&self, msg: ClientMessage) {
        self.handle.update_activity();

        match msg {
            ClientMessage::JoinChatRoom(room_id) => {
                WsMessageMetrics::record_join();
                self.join_chat_room(&room_id);
            }
            ClientMessage::SendMessage(message) => {
                WsMessageMetrics::record_send();
                self.send_message(message).await;
            }
            ClientMessage::Ping => {
                WsMessageMetrics::record_ping();
                self.reply(ServerMessage::Pong).await;
            }
        }
    }

    /// Send a frame to this connection only, bounded by the delivery timeout.
    /// A client that stops reading loses the reply instead of stalling its receive loop.
    pub async fn reply(&self, message: ServerMessage) -> bool {
        match self
            .handle
            .send_timeout(message, self.pipeline.send_timeout())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection_id = %self.handle.id, error = %e, "Reply dropped");
                false
            }
        }
    }

    /// Remove the connection from the registry and every room. Safe to call repeatedly.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection_manager.unregister(self.handle.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}
