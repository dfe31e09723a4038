//! Connection registry: room membership and delivery handles.
//!
//! A thin membership store. Validation (the one-topic discipline) lives in
//! the subscription manager, not here.

use dashmap::DashMap;
use relay_types::{ConnectionId, ServerEvent, Topic};
use std::collections::HashSet;
use tokio::sync::mpsc;

/// A handle through which the broker delivers events to one connection.
///
/// The sending half of the transport seam: the external transport layer
/// owns the receiver and writes events to the socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle from a connection id and its outbound channel.
    pub fn new(id: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { id, sender }
    }

    /// The connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Deliver an event to this connection.
    ///
    /// Best effort: a closed receiver (transport already gone) is logged
    /// and dropped, never surfaced to other connections.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(conn = %self.id, "dropping event for closed connection");
                false
            }
        }
    }
}

struct ConnectionEntry {
    handle: ConnectionHandle,
    /// Ordered memberships; index 0 is always the default room.
    rooms: Vec<Topic>,
}

/// Tracks live connections, their ordered room memberships, and the inverse
/// room → member index used for fan-out.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    rooms: DashMap<Topic, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; it joins its implicit default room.
    pub fn register(&self, handle: ConnectionHandle) {
        let id = handle.id();
        let default_room = id.default_room();

        self.connections.insert(
            id,
            ConnectionEntry {
                handle,
                rooms: vec![default_room.clone()],
            },
        );
        self.rooms.entry(default_room).or_default().insert(id);

        tracing::debug!(conn = %id, "connection registered");
    }

    /// Add a connection to a room. No-op for unknown connections or
    /// duplicate memberships.
    pub fn join(&self, conn: ConnectionId, room: Topic) {
        {
            let Some(mut entry) = self.connections.get_mut(&conn) else {
                return;
            };
            if entry.rooms.contains(&room) {
                return;
            }
            entry.rooms.push(room.clone());
        }
        self.rooms.entry(room).or_default().insert(conn);
    }

    /// Add a connection to `room` only if it still holds nothing beyond its
    /// default membership. The check and the push happen under a single
    /// entry guard, so racing calls cannot both pass the membership test.
    ///
    /// Returns whether the connection joined.
    pub fn join_if_unsubscribed(&self, conn: ConnectionId, room: Topic) -> bool {
        {
            let Some(mut entry) = self.connections.get_mut(&conn) else {
                return false;
            };
            if entry.rooms.len() != 1 || entry.rooms.contains(&room) {
                return false;
            }
            entry.rooms.push(room.clone());
        }
        self.rooms.entry(room).or_default().insert(conn);
        true
    }

    /// The connection's memberships in join order, default room first.
    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<Topic> {
        self.connections
            .get(&conn)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    /// The delivery handle for a connection, if it is still registered.
    pub fn handle_of(&self, conn: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.get(&conn).map(|entry| entry.handle.clone())
    }

    /// Delivery handles for every current member of a room.
    pub fn members_of(&self, room: &Topic) -> Vec<ConnectionHandle> {
        // Snapshot the id set first so the two maps are never locked at once.
        let ids: Vec<ConnectionId> = self
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();

        ids.into_iter()
            .filter_map(|id| self.handle_of(id))
            .collect()
    }

    /// Remove a connection and every membership it holds.
    pub fn remove(&self, conn: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&conn) else {
            return;
        };
        for room in entry.rooms {
            if let Some(mut members) = self.rooms.get_mut(&room) {
                members.remove(&conn);
                if members.is_empty() {
                    drop(members);
                    self.rooms.remove_if(&room, |_, m| m.is_empty());
                }
            }
        }
        tracing::debug!(conn = %conn, "connection removed");
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
