use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::journal::state::SnapshotState;
use crate::puzzle::{GroupId, PieceId};

/// Identity of one live socket in a room.
pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecePayload {
    pub id: PieceId,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPayload {
    pub id: GroupId,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub id: PieceId,
    pub x: i32,
    pub y: i32,
    pub gid: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPayload {
    pub id: PieceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Connections made by the release this progress reports.
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceLockedPayload {
    pub id: PieceId,
    pub username: String,
}

/// Room state handed to a session right after it joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleStatePayload {
    pub solved: bool,
    pub connections_made: u32,
    /// `None` for a room nobody has acted in yet.
    pub state: Option<SnapshotState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedPayload {
    pub connections_made: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistoryPayload {
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Everything a client can send over the room socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "client:createPiece")]
    CreatePiece(PiecePayload),
    #[serde(rename = "client:movePiece")]
    MovePiece(PiecePayload),
    #[serde(rename = "client:moveGroup")]
    MoveGroup(GroupPayload),
    #[serde(rename = "client:createGroup")]
    CreateGroup(GroupPayload),
    #[serde(rename = "client:joinPiece")]
    JoinPiece(JoinPayload),
    #[serde(rename = "client:lockPiece")]
    LockPiece(LockPayload),
    #[serde(rename = "client:unlockPiece")]
    UnlockPiece(LockPayload),
    #[serde(rename = "client:progress")]
    Progress(ProgressPayload),
    #[serde(rename = "client:request:actions")]
    RequestActions,
}

/// Everything the room can push back to its sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "server:pieceMoved")]
    PieceMoved(PiecePayload),
    #[serde(rename = "server:groupMoved")]
    GroupMoved(GroupPayload),
    #[serde(rename = "server:groupCreated")]
    GroupCreated(GroupPayload),
    #[serde(rename = "server:pieceJoined")]
    PieceJoined(JoinPayload),
    #[serde(rename = "server:pieceLocked")]
    PieceLocked(PieceLockedPayload),
    #[serde(rename = "server:pieceUnlocked")]
    PieceUnlocked(LockPayload),
    #[serde(rename = "server:puzzleState")]
    PuzzleState(PuzzleStatePayload),
    #[serde(rename = "server:puzzleSolved")]
    PuzzleSolved(SolvedPayload),
    #[serde(rename = "server:response:actions")]
    ResponseActions(ActionHistoryPayload),
    #[serde(rename = "server:error")]
    Error(ErrorPayload),
}

/// Which sessions a room message is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    /// Everyone except the acting session, which already applied the change
    /// locally.
    Exclude(SessionId),
    Only(SessionId),
}

impl Audience {
    pub fn delivers_to(&self, session: SessionId) -> bool {
        match *self {
            Audience::Everyone => true,
            Audience::Exclude(excluded) => session != excluded,
            Audience::Only(only) => session == only,
        }
    }
}

/// One fanned-out event with its audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// Work item handed from a session to its room worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomTask {
    Client {
        session: SessionId,
        username: String,
        event: ClientEvent,
    },
    Leave {
        session: SessionId,
    },
}
