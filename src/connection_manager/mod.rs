//! Connection management for WebSocket connections
//!
//! This module provides:
//! - Connection handles and the live-connection registry
//! - The room membership table
//! - `ConnectionManager`, the only entry point handlers use for either
//! - Connection statistics

mod manager;
mod registry;
mod rooms;
mod stats;
mod types;

pub use manager::ConnectionManager;
pub use registry::ConnectionRegistry;
pub use rooms::RoomTable;
pub use stats::{ConnectionStats, RoomInfo};
pub use types::{ConnectionHandle, JoinOutcome, ANONYMOUS_USER};
