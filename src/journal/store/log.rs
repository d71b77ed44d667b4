use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{ActionLog, EntryId, LogEntry, StoreResult};

#[derive(Debug, Default)]
struct RoomLog {
    next_entry_id: EntryId,
    entries: Vec<LogEntry>,
    action_count: u64,
}

/// Keeps every room's action history in process memory.
#[derive(Debug, Default)]
pub struct InMemoryActionLog {
    rooms: RwLock<HashMap<String, RoomLog>>,
}

impl InMemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionLog for InMemoryActionLog {
    async fn append(&self, room_id: &str, payload: &str) -> StoreResult<EntryId> {
        let mut rooms = self.rooms.write();
        let room = rooms.entry(room_id.to_string()).or_default();
        room.next_entry_id += 1;
        room.entries.push(LogEntry {
            id: room.next_entry_id,
            recorded_at: Utc::now(),
            payload: payload.to_string(),
        });
        Ok(room.next_entry_id)
    }

    async fn entries_after(
        &self,
        room_id: &str,
        after: Option<EntryId>,
    ) -> StoreResult<Vec<LogEntry>> {
        let rooms = self.rooms.read();
        let Some(room) = rooms.get(room_id) else {
            return Ok(Vec::new());
        };
        let entries = match after {
            Some(after) => room
                .entries
                .iter()
                .filter(|entry| entry.id > after)
                .cloned()
                .collect(),
            None => room.entries.clone(),
        };
        Ok(entries)
    }

    async fn payloads(&self, room_id: &str) -> StoreResult<Vec<String>> {
        let rooms = self.rooms.read();
        Ok(rooms
            .get(room_id)
            .map(|room| room.entries.iter().map(|entry| entry.payload.clone()).collect())
            .unwrap_or_default())
    }

    async fn bump_action_count(&self, room_id: &str, threshold: u64) -> StoreResult<u64> {
        let mut rooms = self.rooms.write();
        let room = rooms.entry(room_id.to_string()).or_default();
        room.action_count += 1;
        let count = room.action_count;
        if count >= threshold {
            room.action_count = 0;
        }
        Ok(count)
    }
}
