use axum::{routing::get, Router};

use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::rooms::{get_room, get_user_rooms, list_rooms};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Read-only membership views
        .nest(
            "/api/v1",
            Router::new()
                .route("/rooms", get(list_rooms))
                .route("/rooms/{room_id}", get(get_room))
                .route("/users/{user_id}/rooms", get(get_user_rooms)),
        )
}
