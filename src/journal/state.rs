use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::puzzle::{GroupId, PieceId};

use super::action::Action;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("unknown piece {0}")]
    UnknownPiece(PieceId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
}

/// Folded placement of one piece. `gid` is the group it last joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecePlacement {
    pub x: i32,
    pub y: i32,
    pub gid: Option<GroupId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlacement {
    pub x: i32,
    pub y: i32,
}

/// Board state folded out of an action history.
///
/// Ordered maps keep the encoded document stable across runs, so two
/// snapshots of the same history compare equal byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    pub pieces: BTreeMap<PieceId, PiecePlacement>,
    pub groups: BTreeMap<GroupId, GroupPlacement>,
}

impl SnapshotState {
    /// Folds one action into the state. Creations insert, everything else
    /// must land on something already seen.
    pub fn apply(&mut self, action: &Action) -> Result<(), ApplyError> {
        match *action {
            Action::PieceCreate { id, x, y } => {
                self.pieces.insert(id, PiecePlacement { x, y, gid: None });
            }
            Action::PieceMove { id, x, y } => {
                let piece = self
                    .pieces
                    .get_mut(&id)
                    .ok_or(ApplyError::UnknownPiece(id))?;
                piece.x = x;
                piece.y = y;
            }
            Action::PieceJoinGroup { id, x, y, group } => {
                if !self.groups.contains_key(&group) {
                    return Err(ApplyError::UnknownGroup(group));
                }
                let piece = self
                    .pieces
                    .get_mut(&id)
                    .ok_or(ApplyError::UnknownPiece(id))?;
                piece.x = x;
                piece.y = y;
                piece.gid = Some(group);
            }
            Action::GroupMove { id, x, y } => {
                let group = self
                    .groups
                    .get_mut(&id)
                    .ok_or(ApplyError::UnknownGroup(id))?;
                group.x = x;
                group.y = y;
            }
            Action::GroupCreate { id, x, y } => {
                self.groups.insert(id, GroupPlacement { x, y });
            }
        }
        Ok(())
    }

    pub fn fold<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Result<Self, ApplyError> {
        let mut state = Self::default();
        for action in actions {
            state.apply(action)?;
        }
        Ok(state)
    }
}
