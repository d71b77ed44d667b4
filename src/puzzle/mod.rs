use serde::{Deserialize, Serialize};

pub mod board;
pub mod collider;
pub mod replay;
pub mod side;

pub use board::{Board, BoardError, PieceSpec, ReleaseOutcome};
pub use collider::{SideZones, Zone};
pub use replay::{Replay, ReplayError, ReplayStep};
pub use side::{grid_layouts, Side, SideLayout, SideShape};

/// Identifier of a piece, equal to its slot index in row-major order.
pub type PieceId = u32;

/// Identifier of a piece group. Ids are assigned monotonically and never
/// reused, even after a merge retires a group.
pub type GroupId = u32;

/// A point in screen coordinates. `y` grows downward, so the piece below
/// slot `i` lives at slot `i + columns`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
