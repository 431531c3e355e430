//! Connection registry: live connections grouped into per-note rooms.
//!
//! ## Locking
//!
//! The registry-wide `RwLock` only maps a note id to its room handle and is
//! never held across a room operation. Membership and the sequence counter
//! live behind each room's own mutex, so traffic in one room never waits on
//! another. When the last member leaves, the room is flagged as retired
//! before it is unmapped; a join that finds a retired room drops it and
//! retries on a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notecollab_core::{ConnectionId, EditDelivery, NoteId, PermissionTier};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, RwLock, mpsc};

/// A sequenced edit queued for one receiving connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub note_id: NoteId,
    /// The connection that published the edit.
    pub origin: ConnectionId,
    pub sequence: u64,
    pub payload: Arc<Value>,
}

impl Delivery {
    /// The wire frame sent to the receiving client.
    pub fn to_frame(&self) -> EditDelivery {
        EditDelivery {
            note_id: self.note_id,
            payload: (*self.payload).clone(),
            sequence: self.sequence,
        }
    }
}

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined,
    Closed,
}

/// A resolved connection that has not joined its room yet.
#[derive(Debug, Clone)]
pub struct PendingConnection {
    pub id: ConnectionId,
    pub tier: PermissionTier,
}

impl PendingConnection {
    pub fn new(note_id: NoteId, tier: PermissionTier) -> Self {
        Self {
            id: ConnectionId::new(note_id),
            tier,
        }
    }

    pub fn note_id(&self) -> NoteId {
        self.id.note_id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::Connecting
    }
}

/// Handle to a connection that is a member of its room.
#[derive(Debug, Clone)]
pub struct JoinedConnection {
    pub id: ConnectionId,
    pub tier: PermissionTier,
    pub joined_at: DateTime<Utc>,
}

impl JoinedConnection {
    pub fn note_id(&self) -> NoteId {
        self.id.note_id
    }
}

/// Point-in-time view of one room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub connection_id: String,
    pub permission: PermissionTier,
    pub joined_at: DateTime<Utc>,
}

// ============================================================================
// Rooms
// ============================================================================

pub(crate) struct Member {
    pub(crate) tier: PermissionTier,
    pub(crate) joined_at: DateTime<Utc>,
    pub(crate) outbound: mpsc::Sender<Delivery>,
}

#[derive(Default)]
pub(crate) struct RoomState {
    pub(crate) members: HashMap<ConnectionId, Member>,
    pub(crate) last_sequence: u64,
    pub(crate) retired: bool,
}

pub(crate) struct Room {
    state: Mutex<RoomState>,
}

impl Room {
    fn new() -> Self {
        Self {
            state: Mutex::new(RoomState::default()),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Tracks every joined connection, grouped by note.
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<NoteId, Arc<Room>>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create a registry whose members get outbound queues of `queue_capacity`.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Admit a connection into its note's room, creating the room if needed.
    ///
    /// Returns the joined handle and the receiving end of the connection's
    /// outbound queue.
    pub async fn join(
        &self,
        pending: PendingConnection,
    ) -> (JoinedConnection, mpsc::Receiver<Delivery>) {
        let note_id = pending.note_id();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let joined = JoinedConnection {
            id: pending.id,
            tier: pending.tier,
            joined_at: Utc::now(),
        };

        loop {
            let room = self.room_or_create(note_id).await;
            let mut state = room.lock().await;
            if state.retired {
                drop(state);
                self.unmap_if_current(note_id, &room).await;
                continue;
            }

            state.members.insert(
                joined.id,
                Member {
                    tier: joined.tier,
                    joined_at: joined.joined_at,
                    outbound: tx,
                },
            );
            tracing::debug!(
                note_id = %note_id,
                connection_id = %joined.id,
                members = state.members.len(),
                "Connection joined room"
            );
            return (joined, rx);
        }
    }

    /// Remove a connection from its room. Idempotent; returns whether the
    /// connection was a member. An emptied room is retired and unmapped.
    pub async fn leave(&self, id: &ConnectionId) -> bool {
        let Some(room) = self.room(id.note_id).await else {
            return false;
        };

        let (removed, emptied) = {
            let mut state = room.lock().await;
            let removed = state.members.remove(id).is_some();
            let emptied = removed && state.members.is_empty();
            if emptied {
                state.retired = true;
            }
            (removed, emptied)
        };

        if emptied {
            self.unmap_if_current(id.note_id, &room).await;
            tracing::debug!(note_id = %id.note_id, "Room emptied and removed");
        }
        if removed {
            tracing::debug!(connection_id = %id, "Connection left room");
        }
        removed
    }

    /// Consistent snapshot of a room's members, oldest first.
    pub async fn members_of(&self, note_id: NoteId) -> Vec<MemberSnapshot> {
        let Some(room) = self.room(note_id).await else {
            return Vec::new();
        };

        let state = room.lock().await;
        let mut members: Vec<MemberSnapshot> = state
            .members
            .iter()
            .map(|(id, member)| MemberSnapshot {
                connection_id: id.to_string(),
                permission: member.tier,
                joined_at: member.joined_at,
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        members
    }

    /// `Joined` while the connection is a room member, `Closed` otherwise.
    pub async fn state_of(&self, id: &ConnectionId) -> ConnectionState {
        match self.room(id.note_id).await {
            Some(room) if room.lock().await.members.contains_key(id) => ConnectionState::Joined,
            _ => ConnectionState::Closed,
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Number of joined connections across all rooms.
    pub async fn connection_count(&self) -> usize {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();
        let mut total = 0;
        for room in rooms {
            total += room.lock().await.members.len();
        }
        total
    }

    /// Whether a room currently exists for the note.
    pub async fn has_room(&self, note_id: NoteId) -> bool {
        self.rooms.read().await.contains_key(&note_id)
    }

    pub(crate) async fn room(&self, note_id: NoteId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(&note_id).cloned()
    }

    async fn room_or_create(&self, note_id: NoteId) -> Arc<Room> {
        if let Some(room) = self.room(note_id).await {
            return room;
        }
        self.rooms
            .write()
            .await
            .entry(note_id)
            .or_insert_with(|| Arc::new(Room::new()))
            .clone()
    }

    async fn unmap_if_current(&self, note_id: NoteId, room: &Arc<Room>) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&note_id).is_some_and(|current| Arc::ptr_eq(current, room)) {
            rooms.remove(&note_id);
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(note: i64, tier: PermissionTier) -> PendingConnection {
        PendingConnection::new(NoteId(note), tier)
    }

    #[tokio::test]
    async fn test_join_and_leave_lifecycle() {
        let registry = ConnectionRegistry::new(8);
        let pending = pending(7, PermissionTier::Write);
        assert_eq!(pending.state(), ConnectionState::Connecting);

        let (conn, _rx) = registry.join(pending).await;
        assert_eq!(registry.state_of(&conn.id).await, ConnectionState::Joined);
        assert_eq!(registry.members_of(NoteId(7)).await.len(), 1);
        assert_eq!(registry.room_count().await, 1);

        assert!(registry.leave(&conn.id).await);
        assert!(!registry.leave(&conn.id).await);
        assert_eq!(registry.state_of(&conn.id).await, ConnectionState::Closed);
        assert!(registry.members_of(NoteId(7)).await.is_empty());
        assert!(!registry.has_room(NoteId(7)).await);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let registry = ConnectionRegistry::new(8);
        let (a, _ra) = registry.join(pending(1, PermissionTier::Read)).await;
        let (_b, _rb) = registry.join(pending(2, PermissionTier::Read)).await;
        let (_c, _rc) = registry.join(pending(2, PermissionTier::Full)).await;

        assert_eq!(registry.members_of(NoteId(1)).await.len(), 1);
        assert_eq!(registry.members_of(NoteId(2)).await.len(), 2);
        assert_eq!(registry.connection_count().await, 3);

        registry.leave(&a.id).await;
        assert!(!registry.has_room(NoteId(1)).await);
        assert_eq!(registry.members_of(NoteId(2)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_reports_tier() {
        let registry = ConnectionRegistry::new(8);
        let (conn, _rx) = registry.join(pending(3, PermissionTier::Full)).await;

        let members = registry.members_of(NoteId(3)).await;
        assert_eq!(members[0].connection_id, conn.id.to_string());
        assert_eq!(members[0].permission, PermissionTier::Full);
    }

    #[tokio::test]
    async fn test_rejoin_after_room_retired() {
        let registry = ConnectionRegistry::new(8);
        let (first, _r1) = registry.join(pending(5, PermissionTier::Read)).await;
        registry.leave(&first.id).await;

        let (second, _r2) = registry.join(pending(5, PermissionTier::Read)).await;
        assert_eq!(registry.state_of(&second.id).await, ConnectionState::Joined);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_join_leave_churn() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let (conn, _rx) = registry.join(pending(i % 4, PermissionTier::Read)).await;
                    tokio::task::yield_now().await;
                    assert!(registry.leave(&conn.id).await);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.room_count().await, 0);
    }
}
