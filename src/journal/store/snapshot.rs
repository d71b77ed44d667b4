use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{PersistedSnapshot, SnapshotStore, StoreResult};

#[derive(Debug, Default)]
struct RoomState {
    snapshot: Option<PersistedSnapshot>,
    connections: u32,
}

/// Keeps per-room snapshots and progress counters in process memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rooms: RwLock<HashMap<String, RoomState>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, room_id: &str) -> StoreResult<Option<PersistedSnapshot>> {
        Ok(self
            .rooms
            .read()
            .get(room_id)
            .and_then(|room| room.snapshot.clone()))
    }

    async fn save(&self, room_id: &str, snapshot: PersistedSnapshot) -> StoreResult<()> {
        self.rooms
            .write()
            .entry(room_id.to_string())
            .or_default()
            .snapshot = Some(snapshot);
        Ok(())
    }

    async fn add_connections(&self, room_id: &str, by: u32) -> StoreResult<u32> {
        let mut rooms = self.rooms.write();
        let room = rooms.entry(room_id.to_string()).or_default();
        room.connections += by;
        Ok(room.connections)
    }

    async fn connections(&self, room_id: &str) -> StoreResult<u32> {
        Ok(self
            .rooms
            .read()
            .get(room_id)
            .map(|room| room.connections)
            .unwrap_or(0))
    }
}
