use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Private,
    Public,
    InviteOnly,
}

/// Room document the directory serves: who may enter and how the grid is
/// shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub title: String,
    pub owner: String,
    pub visibility: Visibility,
    pub collaborators: Vec<String>,
    pub rows: u32,
    pub columns: u32,
    pub piece_size: i32,
}

impl RoomInfo {
    pub fn total_pieces(&self) -> u32 {
        self.rows * self.columns
    }

    /// Collaborator standing only counts while the room is invite-only, so
    /// flipping visibility to private and back keeps the list intact.
    pub fn allows(&self, user_id: &str) -> bool {
        let collaborator = self.visibility == Visibility::InviteOnly
            && self.collaborators.iter().any(|c| c == user_id);
        self.owner == user_id || self.visibility == Visibility::Public || collaborator
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unknown puzzle {0:?}")]
    UnknownPuzzle(String),
    #[error("room directory unavailable")]
    Lookup(#[source] anyhow::Error),
}

/// Source of room documents, normally backed by the puzzle catalog.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn room(&self, room_id: &str) -> Result<RoomInfo, AccessError>;
}

pub type SharedRoomDirectory = Arc<dyn RoomDirectory>;

/// Directory backed by process memory, used for tests and standalone runs.
#[derive(Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<HashMap<String, RoomInfo>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room_id: impl Into<String>, info: RoomInfo) {
        self.rooms.write().insert(room_id.into(), info);
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn room(&self, room_id: &str) -> Result<RoomInfo, AccessError> {
        self.rooms
            .read()
            .get(room_id)
            .cloned()
            .ok_or_else(|| AccessError::UnknownPuzzle(room_id.to_string()))
    }
}
