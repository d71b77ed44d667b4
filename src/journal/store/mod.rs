pub mod log;
pub mod snapshot;

pub use log::InMemoryActionLog;
pub use snapshot::InMemorySnapshotStore;

use std::num::ParseIntError;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of an entry in a room's history. Ids start at 1 and grow by
/// one per append, so they double as a history length.
pub type EntryId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl StoreError {
    pub fn unavailable(source: impl Into<anyhow::Error>) -> Self {
        Self::Unavailable(source.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One recorded action with its position in the room's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: EntryId,
    pub recorded_at: DateTime<Utc>,
    pub payload: String,
}

/// Snapshot document persisted per room. The covered entry id is stored
/// in string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub last_message_id: String,
    /// Encoded [`SnapshotState`](crate::journal::state::SnapshotState).
    pub snapshot_data: String,
}

impl PersistedSnapshot {
    pub fn new(last_entry_id: EntryId, snapshot_data: String) -> Self {
        Self {
            last_message_id: last_entry_id.to_string(),
            snapshot_data,
        }
    }

    /// Id of the last entry folded into the snapshot.
    pub fn last_entry_id(&self) -> Result<EntryId, ParseIntError> {
        self.last_message_id.parse()
    }
}

/// Append-only per-room action history.
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// Appends an action payload to the room's history and returns the id
    /// it was assigned.
    async fn append(&self, room_id: &str, payload: &str) -> StoreResult<EntryId>;

    /// Entries strictly after `after`, oldest first. `None` reads from the
    /// start of the history.
    async fn entries_after(
        &self,
        room_id: &str,
        after: Option<EntryId>,
    ) -> StoreResult<Vec<LogEntry>>;

    /// Raw payloads of the whole history, oldest first.
    async fn payloads(&self, room_id: &str) -> StoreResult<Vec<String>>;

    /// Bumps the room's action counter, wrapping it back to zero once it
    /// reaches `threshold`. Returns the count the bump landed on.
    async fn bump_action_count(&self, room_id: &str, threshold: u64) -> StoreResult<u64>;
}

pub type SharedActionLog = Arc<dyn ActionLog>;

/// Per-room snapshot documents and the progress counter.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, room_id: &str) -> StoreResult<Option<PersistedSnapshot>>;

    async fn save(&self, room_id: &str, snapshot: PersistedSnapshot) -> StoreResult<()>;

    /// Adds to the room's connection counter and returns the new total.
    async fn add_connections(&self, room_id: &str, by: u32) -> StoreResult<u32>;

    async fn connections(&self, room_id: &str) -> StoreResult<u32>;
}

pub type SharedSnapshotStore = Arc<dyn SnapshotStore>;
