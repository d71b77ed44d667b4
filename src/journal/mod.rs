pub mod action;
pub mod service;
pub mod state;
pub mod store;

pub use action::{Action, ActionDecodeError};
pub use service::{
    Journal, LatestState, ReconstructionError, ReconstructionResult, RecordOutcome,
};
pub use state::{ApplyError, GroupPlacement, PiecePlacement, SnapshotState};
pub use store::{
    ActionLog, EntryId, InMemoryActionLog, InMemorySnapshotStore, LogEntry, PersistedSnapshot,
    SharedActionLog, SharedSnapshotStore, SnapshotStore, StoreError, StoreResult,
};
