//! Room membership table.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// room_id -> Set<connection_id>
///
/// Each room's member set is read and written under its shard lock, so a member
/// snapshot always reflects either the state before or after a concurrent join.
pub struct RoomTable {
    rooms: DashMap<String, HashSet<Uuid>>,
    evict_empty: bool,
}

impl RoomTable {
    /// Empty rooms are kept until process exit
    pub fn new() -> Self {
        Self::with_eviction(false)
    }

    /// With `evict_empty`, a room entry is dropped when its last member leaves
    pub fn with_eviction(evict_empty: bool) -> Self {
        Self {
            rooms: DashMap::new(),
            evict_empty,
        }
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub fn join(&self, connection_id: Uuid, room_id: &str) -> bool {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id)
    }

    /// Remove a connection from one room. Returns false if it was not a member.
    pub fn leave(&self, connection_id: Uuid, room_id: &str) -> bool {
        let removed = match self.rooms.get_mut(room_id) {
            Some(mut members) => members.remove(&connection_id),
            None => false,
        };

        if removed && self.evict_empty {
            // Re-checked under the entry lock; a join that raced in keeps the room
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }

        removed
    }

    /// Remove a connection from every listed room, returning how many it actually left
    pub fn leave_all<'a>(
        &self,
        connection_id: Uuid,
        room_ids: impl IntoIterator<Item = &'a String>,
    ) -> usize {
        room_ids
            .into_iter()
            .filter(|room_id| self.leave(connection_id, room_id))
            .count()
    }

    /// Current members of a room; empty for unknown rooms
    pub fn members_of(&self, room_id: &str) -> Vec<Uuid> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection_id: Uuid, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.contains(&connection_id))
            .unwrap_or(false)
    }

    /// Member count, `None` if the room has never been joined (or was evicted)
    pub fn member_count(&self, room_id: &str) -> Option<usize> {
        self.rooms.get(room_id).map(|members| members.len())
    }

    /// Number of room entries, including empty ones
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// room_id -> member count
    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_is_idempotent() {
        let table = RoomTable::new();
        let conn = Uuid::new_v4();

        assert!(table.join(conn, "room1"));
        assert!(!table.join(conn, "room1"));

        assert_eq!(table.members_of("room1"), vec![conn]);
        assert_eq!(table.member_count("room1"), Some(1));
    }

    #[test]
    fn test_unknown_room_has_no_members() {
        let table = RoomTable::new();
        assert!(table.members_of("nowhere").is_empty());
        assert_eq!(table.member_count("nowhere"), None);
    }

    #[test]
    fn test_leave_all_removes_from_every_room() {
        let table = RoomTable::new();
        let conn = Uuid::new_v4();
        let other = Uuid::new_v4();

        table.join(conn, "a");
        table.join(conn, "b");
        table.join(other, "b");

        let rooms = vec!["a".to_string(), "b".to_string(), "never-joined".to_string()];
        assert_eq!(table.leave_all(conn, &rooms), 2);

        assert!(!table.is_member(conn, "a"));
        assert!(!table.is_member(conn, "b"));
        assert_eq!(table.members_of("b"), vec![other]);
    }

    #[test]
    fn test_empty_rooms_are_kept_by_default() {
        let table = RoomTable::new();
        let conn = Uuid::new_v4();

        table.join(conn, "room1");
        table.leave(conn, "room1");

        assert_eq!(table.member_count("room1"), Some(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_rooms_evicted_when_enabled() {
        let table = RoomTable::with_eviction(true);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        table.join(a, "room1");
        table.join(b, "room1");

        table.leave(a, "room1");
        assert_eq!(table.member_count("room1"), Some(1));

        table.leave(b, "room1");
        assert_eq!(table.member_count("room1"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_counts() {
        let table = RoomTable::new();
        table.join(Uuid::new_v4(), "a");
        table.join(Uuid::new_v4(), "a");
        table.join(Uuid::new_v4(), "b");

        let snapshot = table.snapshot();
        assert_eq!(snapshot.get("a"), Some(&2));
        assert_eq!(snapshot.get("b"), Some(&1));
    }
}
