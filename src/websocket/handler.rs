use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::metrics::{WsMessageMetrics, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};
use super::session::Session;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query),
    fields(user_id = ?query.user_id)
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let connection_start = std::time::Instant::now();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.settings.websocket.channel_buffer_size);

    let session = Arc::new(Session::connect(
        state.connection_manager.clone(),
        state.pipeline.clone(),
        user_id,
        tx,
    ));
    let connection_id = session.id();
    let user_id = session.user_id().to_string();

    WS_CONNECTIONS_OPENED.inc();

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        "WebSocket connection established"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let frames = match outbound_frames(&msg) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            for frame in frames {
                if ws_sender.send(frame).await.is_err() {
                    return;
                }
            }
        }
    });

    // Task for receiving messages from WebSocket
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &recv_session).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, or for the connection to be removed elsewhere
    let handle = session.handle().clone();
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
        _ = handle.closed() => {
            tracing::debug!(connection_id = %connection_id, "Connection removed by cleanup");
        }
    }

    // Runs regardless of how the tasks ended, including a panic in either
    session.disconnect();
    send_task.abort();
    recv_task.abort();

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    WS_CONNECTION_DURATION.observe(duration);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// WebSocket frames for one outbound event.
///
/// A heartbeat is followed by a protocol ping. Clients answer it automatically, and the
/// pong refreshes activity for connections that never send anything themselves.
fn outbound_frames(msg: &ServerMessage) -> Result<Vec<Message>, serde_json::Error> {
    let mut frames = vec![Message::Text(msg.to_json()?.into())];
    if matches!(msg, ServerMessage::Heartbeat) {
        frames.push(Message::Ping(Default::default()));
    }
    Ok(frames)
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, session: &Session) -> bool {
    match msg {
        Message::Text(text) => {
            let client_msg: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    WsMessageMetrics::record_invalid();
                    tracing::warn!(connection_id = %session.id(), error = %e, "Failed to parse client message");
                    session
                        .reply(ServerMessage::error("INVALID_MESSAGE", e.to_string()))
                        .await;
                    return true;
                }
            };

            session.handle_event(client_msg).await;
            session.is_connected()
        }
        Message::Binary(_) => {
            WsMessageMetrics::record_invalid();
            session
                .reply(ServerMessage::error(
                    "UNSUPPORTED_FORMAT",
                    "Binary messages are not supported",
                ))
                .await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings itself; only record activity
            session.handle().update_activity();
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %session.id(), "Received close frame");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::chat::{MessagePipeline, PipelineConfig};
    use crate::connection_manager::ConnectionManager;
    use crate::persistence::NoopMessageStore;

    fn session_with_buffer(buffer: usize) -> (Session, mpsc::Receiver<ServerMessage>) {
        let manager = Arc::new(ConnectionManager::new());
        let pipeline = Arc::new(MessagePipeline::new(
            manager.clone(),
            Arc::new(NoopMessageStore::new()),
            PipelineConfig {
                send_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        ));
        let (tx, rx) = mpsc::channel(buffer);
        (Session::connect(manager, pipeline, Some("u1".to_string()), tx), rx)
    }

    #[test]
    fn test_heartbeat_is_followed_by_ping() {
        let frames = outbound_frames(&ServerMessage::Heartbeat).unwrap();

        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Message::Text(text) if text.as_str().contains("heartbeat")));
        assert!(matches!(frames[1], Message::Ping(_)));
    }

    #[test]
    fn test_other_events_are_single_text_frames() {
        let frames = outbound_frames(&ServerMessage::Pong).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Message::Text(_)));
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_and_keeps_connection() {
        let (session, mut rx) = session_with_buffer(4);

        let keep_open = process_message(Message::Text("{not json".into()), &session).await;

        assert!(keep_open);
        match rx.recv().await {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "INVALID_MESSAGE"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_reply_to_stalled_client_does_not_block() {
        let (session, _rx) = session_with_buffer(1);
        session.reply(ServerMessage::Heartbeat).await;

        let keep_open = tokio::time::timeout(
            Duration::from_secs(1),
            process_message(Message::Binary(Default::default()), &session),
        )
        .await
        .expect("error reply should give up on a full buffer");

        assert!(keep_open);
    }

    #[tokio::test]
    async fn test_close_frame_ends_connection() {
        let (session, _rx) = session_with_buffer(4);
        assert!(!process_message(Message::Close(None), &session).await);
    }
}
