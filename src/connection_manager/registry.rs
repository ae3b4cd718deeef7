use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::ServerMessage;

use super::types::ConnectionHandle;

/// Live connections and their owning users
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// user_id -> Set<connection_id> (supports multiple tabs/devices)
    user_index: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    pub fn insert(&self, user_id: String, sender: mpsc::Sender<ServerMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(user_id.clone(), sender));
        let conn_id = handle.id;

        self.connections.insert(conn_id, handle.clone());
        self.user_index.entry(user_id).or_default().insert(conn_id);

        handle
    }

    /// Remove a connection; `None` if it was never registered or already removed
    pub fn remove(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.connections.remove(&connection_id)?;

        if let Some(mut user_conns) = self.user_index.get_mut(&handle.user_id) {
            user_conns.remove(&connection_id);
            if user_conns.is_empty() {
                drop(user_conns);
                self.user_index
                    .remove_if(&handle.user_id, |_, conns| conns.is_empty());
            }
        }

        Some(handle)
    }

    pub fn get(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn contains(&self, connection_id: Uuid) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn user_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.user_index
            .get(user_id)
            .map(|conn_ids| {
                conn_ids
                    .iter()
                    .filter_map(|id| self.get(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn unique_users(&self) -> usize {
        self.user_index.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_index_tracks_multiple_connections() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);

        let first = registry.insert("u1".to_string(), tx.clone());
        let second = registry.insert("u1".to_string(), tx);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.unique_users(), 1);
        assert_eq!(registry.user_connections("u1").len(), 2);

        registry.remove(first.id);
        assert_eq!(registry.unique_users(), 1);

        registry.remove(second.id);
        assert_eq!(registry.unique_users(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove(Uuid::new_v4()).is_none());
    }
}
