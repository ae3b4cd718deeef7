//! WebSocket transport: wire messages, the upgrade handler and per-connection sessions.

mod handler;
mod message;
mod session;

pub use handler::{ws_handler, WsQuery};
pub use message::{ClientMessage, ServerMessage};
pub use session::{Session, SessionState};
