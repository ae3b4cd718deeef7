//! Prometheus metrics for the chat relay.
//!
//! - Connection metrics (active connections, rooms, session lifetime)
//! - Message metrics (received, delivered, failed deliveries)
//! - Persistence metrics (append outcomes and latency)

mod helpers;

pub use helpers::{encode_metrics, MessageMetrics, PersistenceMetrics, WsMessageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "chat_relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Total number of active WebSocket connections
    pub static ref CONNECTIONS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_connections_total", METRIC_PREFIX),
        "Total number of active WebSocket connections"
    ).unwrap();

    /// Number of unique connected users
    pub static ref USERS_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_users_connected", METRIC_PREFIX),
        "Number of unique connected users"
    ).unwrap();

    /// Number of room entries in the membership table (including empty ones)
    pub static ref ROOMS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_rooms_total", METRIC_PREFIX),
        "Number of rooms known to the membership table"
    ).unwrap();

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    /// Inbound client frames by event type
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total client frames received by event type",
        &["type"]
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    pub static ref MESSAGES_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_received_total", METRIC_PREFIX),
        "Total chat messages accepted by the pipeline"
    ).unwrap();

    /// Per-recipient deliveries
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total chat messages handed to recipient connections"
    ).unwrap();

    /// Per-recipient drops (closed channel or send timeout)
    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total chat message deliveries dropped"
    ).unwrap();

    // ============================================================================
    // Persistence Metrics
    // ============================================================================

    /// Append outcomes: stored, failed, timeout, unavailable
    pub static ref PERSISTENCE_APPENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_persistence_appends_total", METRIC_PREFIX),
        "Message append attempts by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref PERSISTENCE_LATENCY: Histogram = register_histogram!(
        format!("{}_persistence_latency_seconds", METRIC_PREFIX),
        "Message append latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0]
    ).unwrap();
}
