//! Room and user membership endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::connection_manager::RoomInfo;
use crate::error::{AppError, Result};
use crate::server::AppState;

// ============================================================================
// Room Endpoints
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomInfo>,
    pub total_rooms: usize,
}

/// GET /api/v1/rooms - List all rooms with member counts
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    let rooms = state.connection_manager.list_rooms();
    let total = rooms.len();

    Json(RoomListResponse {
        rooms,
        total_rooms: total,
    })
}

/// GET /api/v1/rooms/{room_id} - Room details
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>> {
    state
        .connection_manager
        .room_info(&room_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room '{}' not found", room_id)))
}

// ============================================================================
// User Endpoints
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserRoomsResponse {
    pub user_id: String,
    pub connection_count: usize,
    pub rooms: Vec<String>,
}

/// GET /api/v1/users/{user_id}/rooms - Rooms joined by any of the user's connections
pub async fn get_user_rooms(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserRoomsResponse>> {
    let connections = state.connection_manager.get_user_connections(&user_id);
    if connections.is_empty() {
        return Err(AppError::NotFound(format!(
            "User '{}' has no active connections",
            user_id
        )));
    }

    let mut rooms: Vec<String> = connections.iter().flat_map(|c| c.rooms()).collect();
    rooms.sort();
    rooms.dedup();

    Ok(Json(UserRoomsResponse {
        user_id,
        connection_count: connections.len(),
        rooms,
    }))
}
