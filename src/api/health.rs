//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::chat::PipelineStatsSnapshot;
use crate::connection_manager::ConnectionStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub persistence: PersistenceHealthResponse,
    pub connections: ConnectionHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct PersistenceHealthResponse {
    pub backend: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub unique_users: usize,
    pub rooms_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub messages: PipelineStatsSnapshot,
}

/// The relay is healthy without persistence; a missing store only degrades it
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let conn_stats = state.connection_manager.stats();
    let backend = state.pipeline.store_backend();
    let persistence_enabled = backend != "none";

    let status = if persistence_enabled || state.settings.persistence.backend == "none" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        persistence: PersistenceHealthResponse {
            backend: backend.to_string(),
            enabled: persistence_enabled,
        },
        connections: ConnectionHealthResponse {
            total: conn_stats.total_connections,
            unique_users: conn_stats.unique_users,
            rooms_count: conn_stats.rooms.len(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.connection_manager.stats(),
        messages: state.pipeline.stats(),
    })
}
