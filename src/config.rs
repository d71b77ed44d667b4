use std::time::Duration;

/// Actions recorded per room before its journal is folded into a snapshot.
pub const DEFAULT_SNAPSHOT_THRESHOLD: u64 = 50;

/// Relay messages buffered per room before slow sessions start lagging.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Pause between replayed actions, slow enough to watch the assembly.
pub const DEFAULT_REPLAY_STEP_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub snapshot_threshold: u64,
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    pub step_delay: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            step_delay: DEFAULT_REPLAY_STEP_DELAY,
        }
    }
}
