use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::ServerMessage;

use super::registry::ConnectionRegistry;
use super::rooms::RoomTable;
use super::stats::{ConnectionStats, RoomInfo};
use super::types::{ConnectionHandle, JoinOutcome, ANONYMOUS_USER};

/// Owns the connection registry and the room membership table.
///
/// Handlers never see either map directly. Every membership change goes through the
/// connection's own room lock first, which keeps the table free of members that are
/// no longer registered.
pub struct ConnectionManager {
    registry: ConnectionRegistry,
    rooms: RoomTable,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_room_table(RoomTable::new())
    }

    pub fn with_room_table(rooms: RoomTable) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms,
        }
    }

    /// Register a new connection. A missing or blank user id becomes `"anonymous"`.
    pub fn register(
        &self,
        user_id: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Arc<ConnectionHandle> {
        let user_id = user_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let handle = self.registry.insert(user_id, sender);

        tracing::info!(connection_id = %handle.id, user_id = %handle.user_id, "Connection registered");

        handle
    }

    /// Unregister a connection and drop it from every room it joined.
    ///
    /// Unknown or already-removed ids are a no-op. Returns whether anything was removed.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let Some(handle) = self.registry.remove(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "Unregister of unknown connection ignored");
            return false;
        };

        let left = {
            let mut rooms = handle.lock_rooms();
            match rooms.take() {
                Some(joined) => self.rooms.leave_all(connection_id, &joined),
                None => 0,
            }
        };

        handle.notify_closed();

        tracing::info!(
            connection_id = %connection_id,
            user_id = %handle.user_id,
            rooms_left = left,
            "Connection unregistered"
        );

        true
    }

    /// Join a connection to a room by id
    pub fn join_room(&self, connection_id: Uuid, room_id: &str) -> JoinOutcome {
        match self.registry.get(connection_id) {
            Some(handle) => self.join(&handle, room_id),
            None => JoinOutcome::NotConnected,
        }
    }

    /// Join a connection to a room. Idempotent; refused once the connection is unregistered.
    pub fn join(&self, handle: &ConnectionHandle, room_id: &str) -> JoinOutcome {
        let mut rooms = handle.lock_rooms();
        let Some(joined) = rooms.as_mut() else {
            return JoinOutcome::NotConnected;
        };

        if !self.rooms.join(handle.id, room_id) {
            return JoinOutcome::AlreadyMember;
        }
        joined.insert(room_id.to_string());
        drop(rooms);

        tracing::debug!(connection_id = %handle.id, room_id = %room_id, "Joined room");

        JoinOutcome::Joined
    }

    /// Live handles of every current member of a room; empty for unknown rooms
    pub fn room_members(&self, room_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.rooms
            .members_of(room_id)
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .collect()
    }

    pub fn room_member_ids(&self, room_id: &str) -> Vec<Uuid> {
        self.rooms.members_of(room_id)
    }

    pub fn is_member(&self, connection_id: Uuid, room_id: &str) -> bool {
        self.rooms.is_member(connection_id, room_id)
    }

    pub fn room_info(&self, room_id: &str) -> Option<RoomInfo> {
        self.rooms.member_count(room_id).map(|count| RoomInfo {
            room_id: room_id.to_string(),
            member_count: count,
        })
    }

    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .snapshot()
            .into_iter()
            .map(|(room_id, member_count)| RoomInfo {
                room_id,
                member_count,
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.registry.get(connection_id)
    }

    pub fn get_user_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.registry.user_connections(user_id)
    }

    pub fn get_all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.registry.all()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.registry.len(),
            unique_users: self.registry.unique_users(),
            rooms: self.rooms.snapshot(),
        }
    }

    /// Find connections that have been inactive for longer than the timeout
    pub fn find_stale_connections(&self, timeout_secs: u64) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.registry
            .all()
            .into_iter()
            .filter(|handle| now.signed_duration_since(handle.last_activity()) > timeout)
            .map(|handle| handle.id)
            .collect()
    }

    /// Remove stale connections and return the count of removed connections
    pub fn cleanup_stale_connections(&self, timeout_secs: u64) -> usize {
        let mut removed = 0;

        for conn_id in self.find_stale_connections(timeout_secs) {
            tracing::info!(connection_id = %conn_id, "Removing stale connection due to timeout");
            if self.unregister(conn_id) {
                removed += 1;
            }
        }

        removed
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_conn(user: &str) -> (ConnectionManager, Arc<ConnectionHandle>) {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(8);
        let handle = manager.register(Some(user.to_string()), tx);
        (manager, handle)
    }

    #[test]
    fn test_missing_user_id_is_anonymous() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(1);

        assert_eq!(manager.register(None, tx.clone()).user_id, ANONYMOUS_USER);
        assert_eq!(manager.register(Some("  ".to_string()), tx).user_id, ANONYMOUS_USER);
    }

    #[test]
    fn test_join_twice_leaves_membership_unchanged() {
        let (manager, handle) = manager_with_conn("u1");

        assert_eq!(manager.join(&handle, "room1"), JoinOutcome::Joined);
        let before = manager.room_member_ids("room1");

        assert_eq!(manager.join(&handle, "room1"), JoinOutcome::AlreadyMember);
        assert_eq!(manager.room_member_ids("room1"), before);
        assert_eq!(handle.rooms(), vec!["room1".to_string()]);
    }

    #[test]
    fn test_unregister_removes_from_all_rooms() {
        let (manager, handle) = manager_with_conn("u1");
        manager.join(&handle, "a");
        manager.join(&handle, "b");

        assert!(manager.unregister(handle.id));

        assert!(!manager.is_member(handle.id, "a"));
        assert!(!manager.is_member(handle.id, "b"));
        assert!(manager.get_connection(handle.id).is_none());
        assert!(handle.is_closed());
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let (manager, handle) = manager_with_conn("u1");
        assert!(manager.unregister(handle.id));
        assert!(!manager.unregister(handle.id));
    }

    #[test]
    fn test_join_after_unregister_is_refused() {
        let (manager, handle) = manager_with_conn("u1");
        manager.unregister(handle.id);

        assert_eq!(manager.join(&handle, "room1"), JoinOutcome::NotConnected);
        assert_eq!(manager.join_room(handle.id, "room1"), JoinOutcome::NotConnected);
        assert!(manager.room_member_ids("room1").is_empty());
    }

    #[test]
    fn test_room_info_and_listing() {
        let (manager, handle) = manager_with_conn("u1");
        manager.join(&handle, "zeta");
        manager.join(&handle, "alpha");

        let rooms = manager.list_rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room_id, "alpha");

        assert_eq!(manager.room_info("zeta").map(|r| r.member_count), Some(1));
        assert!(manager.room_info("missing").is_none());
    }

    #[test]
    fn test_stale_cleanup() {
        let (manager, handle) = manager_with_conn("u1");
        manager.join(&handle, "room1");

        // Nothing is older than an hour
        assert_eq!(manager.cleanup_stale_connections(3600), 0);
        assert!(manager.get_connection(handle.id).is_some());
        assert!(manager.is_member(handle.id, "room1"));
    }

    #[test]
    fn test_stats() {
        let (manager, handle) = manager_with_conn("u1");
        manager.join(&handle, "room1");

        let stats = manager.stats();
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.unique_users, 1);
        assert_eq!(stats.rooms.get("room1"), Some(&1));
    }
}
