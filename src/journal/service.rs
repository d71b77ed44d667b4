use std::num::ParseIntError;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::action::{Action, ActionDecodeError};
use super::state::{ApplyError, SnapshotState};
use super::store::{
    EntryId, PersistedSnapshot, SharedActionLog, SharedSnapshotStore, StoreError,
};

const LOG_TARGET: &str = "journal::service";

#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("snapshot document is not valid JSON")]
    SnapshotCodec(#[source] serde_json::Error),
    #[error("snapshot entry id {text:?} is not a number")]
    SnapshotEntryId {
        text: String,
        #[source]
        source: ParseIntError,
    },
    #[error("entry {entry_id} failed to decode")]
    EntryDecode {
        entry_id: EntryId,
        #[source]
        source: ActionDecodeError,
    },
    #[error("entry {entry_id} could not be applied")]
    EntryApply {
        entry_id: EntryId,
        #[source]
        source: ApplyError,
    },
}

pub type ReconstructionResult<T> = Result<T, ReconstructionError>;

/// Outcome of journaling one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub entry_id: EntryId,
    /// Set when this record rolled the history into a fresh snapshot.
    pub compacted: bool,
}

/// Folded state a joining session starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestState {
    pub state: SnapshotState,
    pub last_entry_id: EntryId,
}

/// Durable history keeping for every room.
///
/// Every action is appended to the room's log; each time the room's counter
/// reaches `snapshot_threshold` the history is folded into a snapshot
/// document, so reconstruction cost stays bounded no matter how long a
/// puzzle has been played.
#[derive(Clone)]
pub struct Journal {
    log: SharedActionLog,
    snapshots: SharedSnapshotStore,
    snapshot_threshold: u64,
}

impl Journal {
    pub fn new(
        log: SharedActionLog,
        snapshots: SharedSnapshotStore,
        snapshot_threshold: u64,
    ) -> Self {
        Self {
            log,
            snapshots,
            snapshot_threshold,
        }
    }

    /// Appends one action, compacting the history when the room's counter
    /// rolls over. A failed compaction is logged and retried at the next
    /// rollover instead of failing the record.
    pub async fn record(&self, room_id: &str, action: &Action) -> Result<RecordOutcome, StoreError> {
        let payload = action.to_string();
        let entry_id = self.log.append(room_id, &payload).await?;
        let count = self
            .log
            .bump_action_count(room_id, self.snapshot_threshold)
            .await?;
        debug!(target: LOG_TARGET, room_id, entry_id, count, "recorded action");

        let mut compacted = false;
        if count >= self.snapshot_threshold {
            match self.create_snapshot(room_id).await {
                Ok(Some(last_entry_id)) => {
                    compacted = true;
                    info!(
                        target: LOG_TARGET,
                        room_id,
                        last_entry_id,
                        "compacted history into snapshot"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(target: LOG_TARGET, room_id, error = %error, "snapshot compaction failed");
                }
            }
        }
        Ok(RecordOutcome {
            entry_id,
            compacted,
        })
    }

    /// Rebuilds the room's current state: the decoded snapshot plus every
    /// entry recorded after it. `None` when the room has no history at all.
    pub async fn latest_state(&self, room_id: &str) -> ReconstructionResult<Option<LatestState>> {
        let snapshot = self.snapshots.load(room_id).await?;
        let (mut state, after) = match &snapshot {
            Some(snapshot) => {
                let state = serde_json::from_str(&snapshot.snapshot_data)
                    .map_err(ReconstructionError::SnapshotCodec)?;
                let covered = snapshot.last_entry_id().map_err(|source| {
                    ReconstructionError::SnapshotEntryId {
                        text: snapshot.last_message_id.clone(),
                        source,
                    }
                })?;
                (state, Some(covered))
            }
            None => (SnapshotState::default(), None),
        };

        let entries = self.log.entries_after(room_id, after).await?;
        if snapshot.is_none() && entries.is_empty() {
            return Ok(None);
        }

        let mut last_entry_id = after.unwrap_or(0);
        for entry in entries {
            let action = entry
                .payload
                .parse::<Action>()
                .map_err(|source| ReconstructionError::EntryDecode {
                    entry_id: entry.id,
                    source,
                })?;
            state
                .apply(&action)
                .map_err(|source| ReconstructionError::EntryApply {
                    entry_id: entry.id,
                    source,
                })?;
            last_entry_id = entry.id;
        }
        Ok(Some(LatestState {
            state,
            last_entry_id,
        }))
    }

    /// Folds the room's history into a fresh snapshot document. Returns the
    /// entry id the snapshot covers, `None` for a room with no history.
    pub async fn create_snapshot(&self, room_id: &str) -> ReconstructionResult<Option<EntryId>> {
        let Some(latest) = self.latest_state(room_id).await? else {
            return Ok(None);
        };
        let snapshot_data =
            serde_json::to_string(&latest.state).map_err(ReconstructionError::SnapshotCodec)?;
        self.snapshots
            .save(
                room_id,
                PersistedSnapshot::new(latest.last_entry_id, snapshot_data),
            )
            .await?;
        Ok(Some(latest.last_entry_id))
    }

    /// Raw action history, oldest first.
    pub async fn history(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        self.log.payloads(room_id).await
    }

    pub async fn add_connections(&self, room_id: &str, by: u32) -> Result<u32, StoreError> {
        self.snapshots.add_connections(room_id, by).await
    }

    pub async fn connections(&self, room_id: &str) -> Result<u32, StoreError> {
        self.snapshots.connections(room_id).await
    }
}
