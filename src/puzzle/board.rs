use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::journal::action::Action;
use crate::journal::state::{GroupPlacement, PiecePlacement, SnapshotState};

use super::collider::SideZones;
use super::side::{Side, SideLayout};
use super::{GroupId, PieceId, Position};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("unknown piece {0}")]
    UnknownPiece(PieceId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("expected {expected} side layouts, found {found}")]
    LayoutMismatch { expected: usize, found: usize },
}

/// Immutable description of one grid slot.
#[derive(Debug, Clone)]
pub struct PieceSpec {
    pub row: u32,
    pub column: u32,
    pub layout: SideLayout,
}

#[derive(Debug, Clone, Default)]
struct PieceBody {
    /// Absolute while ungrouped, relative to the group anchor once grouped.
    position: Position,
    group: Option<GroupId>,
}

#[derive(Debug, Clone)]
struct GroupBody {
    position: Position,
    members: BTreeSet<PieceId>,
}

/// Emission produced by releasing a piece: the leading move plus any
/// grouping that snapped into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub actions: Vec<Action>,
    pub connections: u32,
}

/// The live placement model: an arena of pieces plus the groups formed so
/// far.
///
/// Grouped pieces store positions relative to their group anchor, so moving
/// a group touches only the anchor. All mutating operations return the
/// actions a peer needs to mirror the change.
#[derive(Debug, Clone)]
pub struct Board {
    rows: u32,
    columns: u32,
    piece_size: i32,
    zones: SideZones,
    specs: Vec<PieceSpec>,
    pieces: Vec<PieceBody>,
    groups: HashMap<GroupId, GroupBody>,
    next_group_id: GroupId,
}

impl Board {
    pub fn new(
        rows: u32,
        columns: u32,
        piece_size: i32,
        layouts: Vec<SideLayout>,
    ) -> Result<Self, BoardError> {
        let expected = (rows * columns) as usize;
        if layouts.len() != expected {
            return Err(BoardError::LayoutMismatch {
                expected,
                found: layouts.len(),
            });
        }
        let specs = layouts
            .into_iter()
            .enumerate()
            .map(|(idx, layout)| {
                let idx = idx as u32;
                PieceSpec {
                    row: idx / columns,
                    column: idx % columns,
                    layout,
                }
            })
            .collect();
        Ok(Self {
            rows,
            columns,
            piece_size,
            zones: SideZones::new(piece_size),
            specs,
            pieces: vec![PieceBody::default(); expected],
            groups: HashMap::new(),
            next_group_id: 0,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn piece_size(&self) -> i32 {
        self.piece_size
    }

    pub fn total_pieces(&self) -> u32 {
        self.pieces.len() as u32
    }

    pub fn spec(&self, id: PieceId) -> Result<&PieceSpec, BoardError> {
        self.specs
            .get(id as usize)
            .ok_or(BoardError::UnknownPiece(id))
    }

    /// Position relative to the group anchor, or absolute while ungrouped.
    pub fn piece_position(&self, id: PieceId) -> Result<Position, BoardError> {
        Ok(self.body(id)?.position)
    }

    pub fn absolute_position(&self, id: PieceId) -> Result<Position, BoardError> {
        self.body(id)?;
        Ok(self.absolute(id))
    }

    pub fn piece_group(&self, id: PieceId) -> Result<Option<GroupId>, BoardError> {
        Ok(self.body(id)?.group)
    }

    pub fn group_position(&self, id: GroupId) -> Result<Position, BoardError> {
        Ok(self.group(id)?.position)
    }

    pub fn group_members(&self, id: GroupId) -> Result<&BTreeSet<PieceId>, BoardError> {
        Ok(&self.group(id)?.members)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn next_group_id(&self) -> GroupId {
        self.next_group_id
    }

    /// Places a piece at its initial scatter position and returns the action
    /// announcing it.
    pub fn create_piece(&mut self, id: PieceId, x: i32, y: i32) -> Result<Action, BoardError> {
        self.body_mut(id)?.position = Position::new(x, y);
        Ok(Action::PieceCreate { id, x, y })
    }

    /// Drags a piece to `(x, y)`. For a grouped piece the whole group moves:
    /// only the anchor changes, member offsets stay put.
    pub fn move_piece(&mut self, id: PieceId, x: i32, y: i32) -> Result<(), BoardError> {
        match self.body(id)?.group {
            Some(gid) => self.group_mut(gid)?.position = Position::new(x, y),
            None => self.pieces[id as usize].position = Position::new(x, y),
        }
        Ok(())
    }

    /// Drops a piece where it currently sits.
    ///
    /// Emits the move first, then checks the four grid neighbors for a
    /// mating side resting inside the capture tolerance and connects every
    /// hit in turn. `connections` counts the successful connects, ready to
    /// feed the room's progress counter.
    pub fn release(&mut self, id: PieceId) -> Result<ReleaseOutcome, BoardError> {
        let body = self.body(id)?;
        let mut actions = Vec::new();
        match body.group {
            Some(gid) => {
                let position = self.group(gid)?.position;
                actions.push(Action::GroupMove {
                    id: gid,
                    x: position.x,
                    y: position.y,
                });
            }
            None => {
                let position = body.position;
                actions.push(Action::PieceMove {
                    id,
                    x: position.x,
                    y: position.y,
                });
            }
        }
        let connections = self.match_and_connect(id, &mut actions);
        Ok(ReleaseOutcome {
            actions,
            connections,
        })
    }

    /// Mirrors a peer's piece move.
    pub fn apply_piece_moved(&mut self, id: PieceId, x: i32, y: i32) -> Result<(), BoardError> {
        self.body_mut(id)?.position = Position::new(x, y);
        Ok(())
    }

    /// Mirrors a peer's group move.
    pub fn apply_group_moved(&mut self, id: GroupId, x: i32, y: i32) -> Result<(), BoardError> {
        self.group_mut(id)?.position = Position::new(x, y);
        Ok(())
    }

    /// Mirrors a peer's group creation. Keeps local id assignment ahead of
    /// every id seen on the wire so ids are never reused.
    pub fn apply_group_created(&mut self, id: GroupId, x: i32, y: i32) -> Result<(), BoardError> {
        self.groups.insert(
            id,
            GroupBody {
                position: Position::new(x, y),
                members: BTreeSet::new(),
            },
        );
        if self.next_group_id <= id {
            self.next_group_id = id + 1;
        }
        Ok(())
    }

    /// Mirrors a peer's join: the piece moves to `(x, y)` relative to the
    /// group anchor and switches membership.
    pub fn apply_piece_joined(
        &mut self,
        id: PieceId,
        x: i32,
        y: i32,
        gid: GroupId,
    ) -> Result<(), BoardError> {
        self.body(id)?;
        if !self.groups.contains_key(&gid) {
            return Err(BoardError::UnknownGroup(gid));
        }
        self.detach(id);
        let body = &mut self.pieces[id as usize];
        body.position = Position::new(x, y);
        body.group = Some(gid);
        if let Some(group) = self.groups.get_mut(&gid) {
            group.members.insert(id);
        }
        Ok(())
    }

    /// Drops every grouping, leaving piece positions untouched.
    pub fn reset_groups(&mut self) {
        for body in &mut self.pieces {
            body.group = None;
        }
        self.groups.clear();
        self.next_group_id = 0;
    }

    /// Rebuilds the board from a folded state. Pieces absent from the state
    /// keep their current position and stay ungrouped.
    pub fn restore(&mut self, state: &SnapshotState) -> Result<(), BoardError> {
        self.reset_groups();
        for (&gid, placement) in &state.groups {
            self.groups.insert(
                gid,
                GroupBody {
                    position: Position::new(placement.x, placement.y),
                    members: BTreeSet::new(),
                },
            );
        }
        self.next_group_id = state.groups.keys().max().map_or(0, |max| max + 1);
        for (&id, placement) in &state.pieces {
            self.body(id)?;
            self.pieces[id as usize].position = Position::new(placement.x, placement.y);
            if let Some(gid) = placement.gid {
                if !self.groups.contains_key(&gid) {
                    return Err(BoardError::UnknownGroup(gid));
                }
                self.pieces[id as usize].group = Some(gid);
                if let Some(group) = self.groups.get_mut(&gid) {
                    group.members.insert(id);
                }
            }
        }
        Ok(())
    }

    /// The fold-shaped view of the whole board.
    pub fn snapshot(&self) -> SnapshotState {
        let mut state = SnapshotState::default();
        for (idx, body) in self.pieces.iter().enumerate() {
            state.pieces.insert(
                idx as PieceId,
                PiecePlacement {
                    x: body.position.x,
                    y: body.position.y,
                    gid: body.group,
                },
            );
        }
        for (&gid, group) in &self.groups {
            state.groups.insert(
                gid,
                GroupPlacement {
                    x: group.position.x,
                    y: group.position.y,
                },
            );
        }
        state
    }

    fn body(&self, id: PieceId) -> Result<&PieceBody, BoardError> {
        self.pieces
            .get(id as usize)
            .ok_or(BoardError::UnknownPiece(id))
    }

    fn body_mut(&mut self, id: PieceId) -> Result<&mut PieceBody, BoardError> {
        self.pieces
            .get_mut(id as usize)
            .ok_or(BoardError::UnknownPiece(id))
    }

    fn group(&self, id: GroupId) -> Result<&GroupBody, BoardError> {
        self.groups.get(&id).ok_or(BoardError::UnknownGroup(id))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut GroupBody, BoardError> {
        self.groups.get_mut(&id).ok_or(BoardError::UnknownGroup(id))
    }

    /// Removes a piece from its current group, if any. The group itself
    /// survives even when emptied, matching what peers saw on the wire.
    fn detach(&mut self, id: PieceId) {
        if let Some(gid) = self.pieces[id as usize].group.take() {
            if let Some(group) = self.groups.get_mut(&gid) {
                group.members.remove(&id);
            }
        }
    }

    fn absolute(&self, id: PieceId) -> Position {
        let body = &self.pieces[id as usize];
        match body.group.and_then(|gid| self.groups.get(&gid)) {
            Some(group) => Position::new(
                group.position.x + body.position.x,
                group.position.y + body.position.y,
            ),
            None => body.position,
        }
    }

    /// Where the released piece lands relative to a candidate whose side
    /// `at` faces it.
    const fn join_offset(at: Side, size: i32) -> Position {
        match at {
            Side::Left => Position::new(-size, 0),
            Side::Right => Position::new(size, 0),
            Side::Top => Position::new(0, -size),
            Side::Bottom => Position::new(0, size),
        }
    }

    fn match_and_connect(&mut self, released: PieceId, actions: &mut Vec<Action>) -> u32 {
        let idx = i64::from(released);
        let columns = i64::from(self.columns);
        let total = self.pieces.len() as i64;
        // each entry names the candidate side facing the released piece
        let candidates = [
            (Side::Left, idx + 1),
            (Side::Right, idx - 1),
            (Side::Top, idx + columns),
            (Side::Bottom, idx - columns),
        ];

        let mut connections = 0;
        for (side, candidate) in candidates {
            if candidate < 0 || candidate >= total {
                continue;
            }
            let candidate = candidate as PieceId;
            let candidate_group = self.pieces[candidate as usize].group;
            let released_group = self.pieces[released as usize].group;
            if let (Some(a), Some(b)) = (candidate_group, released_group) {
                if a == b {
                    continue;
                }
            }
            if !self.sides_mate(candidate, side, released) {
                continue;
            }
            if !self.zones_touch(candidate, side, released) {
                continue;
            }
            self.connect(candidate, released, side, actions);
            connections += 1;
        }
        connections
    }

    /// A border side never connects, which also discards the false grid
    /// neighbors produced by index arithmetic wrapping across rows.
    fn sides_mate(&self, candidate: PieceId, side: Side, released: PieceId) -> bool {
        let candidate_shape = self.specs[candidate as usize].layout.shape(side);
        let released_shape = self.specs[released as usize].layout.shape(side.opposite());
        candidate_shape.mates(released_shape)
    }

    fn zones_touch(&self, candidate: PieceId, side: Side, released: PieceId) -> bool {
        let a = self.zones.zone(side, self.absolute(candidate));
        let b = self.zones.zone(side.opposite(), self.absolute(released));
        self.zones.overlap(a, b)
    }

    /// Connects `released` to the stationary `candidate` whose side `at`
    /// faces it, forming, extending or merging groups as placement demands.
    fn connect(
        &mut self,
        candidate: PieceId,
        released: PieceId,
        at: Side,
        actions: &mut Vec<Action>,
    ) {
        let candidate_group = self.pieces[candidate as usize].group;
        let released_group = self.pieces[released as usize].group;
        let offset = Self::join_offset(at, self.piece_size);

        match (candidate_group, released_group) {
            (None, None) => {
                let anchor = self.pieces[candidate as usize].position;
                let gid = self.create_group(anchor);
                actions.push(Action::GroupCreate {
                    id: gid,
                    x: anchor.x,
                    y: anchor.y,
                });
                self.join_group(candidate, gid, Position::new(0, 0), actions);
                self.join_group(released, gid, offset, actions);
            }
            (Some(gid), None) => {
                let base = self.pieces[candidate as usize].position;
                self.join_group(
                    released,
                    gid,
                    Position::new(base.x + offset.x, base.y + offset.y),
                    actions,
                );
            }
            (None, Some(gid)) => {
                let base = self.pieces[released as usize].position;
                self.join_group(
                    candidate,
                    gid,
                    Position::new(base.x - offset.x, base.y - offset.y),
                    actions,
                );
            }
            (Some(surviving), Some(absorbed)) => {
                // seed the released piece in the surviving group's space,
                // then pull the rest of its old group across
                let base = self.pieces[candidate as usize].position;
                self.pieces[released as usize].position =
                    Position::new(base.x + offset.x, base.y + offset.y);
                self.merge(surviving, absorbed, released, actions);
            }
        }
    }

    fn create_group(&mut self, at: Position) -> GroupId {
        let id = self.next_group_id;
        self.next_group_id += 1;
        self.groups.insert(
            id,
            GroupBody {
                position: at,
                members: BTreeSet::new(),
            },
        );
        id
    }

    fn join_group(
        &mut self,
        piece: PieceId,
        gid: GroupId,
        position: Position,
        actions: &mut Vec<Action>,
    ) {
        let body = &mut self.pieces[piece as usize];
        body.position = position;
        body.group = Some(gid);
        if let Some(group) = self.groups.get_mut(&gid) {
            group.members.insert(piece);
        }
        actions.push(Action::PieceJoinGroup {
            id: piece,
            x: position.x,
            y: position.y,
            group: gid,
        });
    }

    /// Folds `absorbed` into `surviving` starting from `seed`, which already
    /// carries a position in the surviving group's space.
    ///
    /// Walks the absorbed members outward from the seed, realigning each one
    /// off the neighbor it was reached through. Positions are recomputed
    /// from grid adjacency, so any drift the absorbed group accumulated is
    /// squared away here. Every absorbed member, seed included, is then
    /// reannounced as a join into the surviving group.
    fn merge(
        &mut self,
        surviving: GroupId,
        absorbed: GroupId,
        seed: PieceId,
        actions: &mut Vec<Action>,
    ) {
        let mut exclude: HashSet<PieceId> = HashSet::from([seed]);
        let mut queue: VecDeque<(PieceId, Side)> = VecDeque::new();
        for side in Side::ALL {
            if let Some(neighbor) = self.neighbor_in_group(seed, side) {
                exclude.insert(neighbor);
                queue.push_back((neighbor, side));
            }
        }

        while let Some((piece, reached_at)) = queue.pop_front() {
            // the piece sits at its parent's `reached_at` side, so the
            // parent is its opposite-side neighbor
            if let Some(parent) = self.neighbor_in_group(piece, reached_at.opposite()) {
                let anchor = self.pieces[parent as usize].position;
                let offset = Self::join_offset(reached_at, self.piece_size);
                self.pieces[piece as usize].position =
                    Position::new(anchor.x + offset.x, anchor.y + offset.y);
            }
            for side in Side::ALL {
                if let Some(next) = self.neighbor_in_group(piece, side) {
                    if exclude.insert(next) {
                        queue.push_back((next, side));
                    }
                }
            }
        }

        let members: Vec<PieceId> = match self.groups.remove(&absorbed) {
            Some(group) => group.members.into_iter().collect(),
            None => Vec::new(),
        };
        for member in members {
            let position = self.pieces[member as usize].position;
            self.pieces[member as usize].group = Some(surviving);
            if let Some(group) = self.groups.get_mut(&surviving) {
                group.members.insert(member);
            }
            actions.push(Action::PieceJoinGroup {
                id: member,
                x: position.x,
                y: position.y,
                group: surviving,
            });
        }
    }

    /// Grid neighbor of `piece` at `side` from the piece's own perspective,
    /// counted only when it belongs to the same group.
    fn neighbor_in_group(&self, piece: PieceId, side: Side) -> Option<PieceId> {
        if self.specs[piece as usize].layout.is_border(side) {
            return None;
        }
        let idx = i64::from(piece);
        let columns = i64::from(self.columns);
        let neighbor = match side {
            Side::Left => idx - 1,
            Side::Right => idx + 1,
            Side::Top => idx - columns,
            Side::Bottom => idx + columns,
        };
        if neighbor < 0 || neighbor >= self.pieces.len() as i64 {
            return None;
        }
        let neighbor = neighbor as PieceId;
        let group = self.pieces[piece as usize].group?;
        (self.pieces[neighbor as usize].group == Some(group)).then_some(neighbor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::side::grid_layouts;

    const SIZE: i32 = 120;

    fn board_2x2() -> Board {
        Board::new(2, 2, SIZE, grid_layouts(2, 2)).unwrap()
    }

    #[test]
    fn release_without_neighbors_only_moves() {
        let mut board = board_2x2();
        board.create_piece(0, 500, 500).unwrap();
        let outcome = board.release(0).unwrap();
        assert_eq!(
            outcome.actions,
            vec![Action::PieceMove {
                id: 0,
                x: 500,
                y: 500
            }]
        );
        assert_eq!(outcome.connections, 0);
        assert_eq!(board.group_count(), 0);
    }

    #[test]
    fn releasing_into_a_neighbor_forms_a_group() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        // park the bottom row out of capture range
        board.create_piece(2, 600, 600).unwrap();
        board.create_piece(3, 900, 900).unwrap();

        let outcome = board.release(1).unwrap();
        assert_eq!(outcome.connections, 1);
        assert_eq!(
            outcome.actions,
            vec![
                Action::PieceMove { id: 1, x: 121, y: 2 },
                Action::GroupCreate { id: 0, x: 0, y: 0 },
                Action::PieceJoinGroup {
                    id: 0,
                    x: 0,
                    y: 0,
                    group: 0
                },
                Action::PieceJoinGroup {
                    id: 1,
                    x: SIZE,
                    y: 0,
                    group: 0
                },
            ]
        );
        assert_eq!(board.piece_group(0).unwrap(), Some(0));
        assert_eq!(board.piece_group(1).unwrap(), Some(0));
        // snapped flush in the group's space
        assert_eq!(board.absolute_position(0).unwrap(), Position::new(0, 0));
        assert_eq!(board.absolute_position(1).unwrap(), Position::new(SIZE, 0));
    }

    #[test]
    fn grouped_candidate_absorbs_released_piece() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        board.create_piece(2, 600, 600).unwrap();
        board.create_piece(3, 900, 900).unwrap();
        board.release(1).unwrap();

        board.move_piece(2, 1, 119).unwrap();
        let outcome = board.release(2).unwrap();
        assert_eq!(outcome.connections, 1);
        assert_eq!(
            outcome.actions,
            vec![
                Action::PieceMove { id: 2, x: 1, y: 119 },
                Action::PieceJoinGroup {
                    id: 2,
                    x: 0,
                    y: SIZE,
                    group: 0
                },
            ]
        );
        assert_eq!(board.piece_group(2).unwrap(), Some(0));
        assert_eq!(board.absolute_position(2).unwrap(), Position::new(0, SIZE));
    }

    #[test]
    fn released_group_pulls_in_a_lone_candidate() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        board.create_piece(2, 5, 125).unwrap();
        board.create_piece(3, 900, 900).unwrap();
        board.release(1).unwrap();

        // drop the group right above the lone piece 2 and release a member
        let outcome = board.release(0).unwrap();
        assert_eq!(outcome.connections, 1);
        assert_eq!(outcome.actions[0], Action::GroupMove { id: 0, x: 0, y: 0 });
        assert_eq!(
            outcome.actions[1],
            Action::PieceJoinGroup {
                id: 2,
                x: 0,
                y: SIZE,
                group: 0
            }
        );
        assert_eq!(board.piece_group(2).unwrap(), Some(0));
        assert_eq!(board.piece_position(2).unwrap(), Position::new(0, SIZE));
    }

    #[test]
    fn merging_two_groups_rebases_the_absorbed_side() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        board.create_piece(2, 10, 300).unwrap();
        board.create_piece(3, 131, 302).unwrap();
        board.release(1).unwrap();
        board.release(3).unwrap();
        assert_eq!(board.group_count(), 2);

        // drag the bottom group (anchored at piece 2) under the top one
        board.move_piece(2, 1, 121).unwrap();
        let outcome = board.release(2).unwrap();
        assert_eq!(outcome.connections, 1);
        assert_eq!(outcome.actions[0], Action::GroupMove { id: 1, x: 1, y: 121 });
        assert_eq!(
            &outcome.actions[1..],
            &[
                Action::PieceJoinGroup {
                    id: 2,
                    x: 0,
                    y: SIZE,
                    group: 0
                },
                Action::PieceJoinGroup {
                    id: 3,
                    x: SIZE,
                    y: SIZE,
                    group: 0
                },
            ]
        );
        assert_eq!(board.group_count(), 1);
        for id in 0..4 {
            assert_eq!(board.piece_group(id).unwrap(), Some(0));
        }
        assert_eq!(board.piece_position(2).unwrap(), Position::new(0, SIZE));
        assert_eq!(board.piece_position(3).unwrap(), Position::new(SIZE, SIZE));
    }

    #[test]
    fn merge_realigns_drifted_members() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        board.release(1).unwrap();

        // a remote group whose second member drifted off the grid
        board.apply_group_created(7, 10, 300).unwrap();
        board.apply_piece_joined(2, 0, 0, 7).unwrap();
        board.apply_piece_joined(3, 127, 3, 7).unwrap();

        board.move_piece(2, 1, 121).unwrap();
        let outcome = board.release(2).unwrap();
        assert_eq!(outcome.connections, 1);
        assert_eq!(board.piece_position(2).unwrap(), Position::new(0, SIZE));
        assert_eq!(board.piece_position(3).unwrap(), Position::new(SIZE, SIZE));
        assert_eq!(board.group_count(), 1);
        assert_eq!(
            board.group_members(0).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn full_assembly_counts_one_less_than_the_piece_count() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 2).unwrap();
        board.create_piece(2, 600, 600).unwrap();
        board.create_piece(3, 900, 900).unwrap();

        let mut connections = 0;
        connections += board.release(1).unwrap().connections;
        board.move_piece(2, 1, 119).unwrap();
        connections += board.release(2).unwrap().connections;
        board.move_piece(3, 122, 121).unwrap();
        let last = board.release(3).unwrap();
        // the second mating side is already in the same group, so the
        // release counts a single connection
        assert_eq!(last.connections, 1);
        connections += last.connections;

        assert_eq!(connections, board.total_pieces() - 1);
        assert_eq!(board.group_count(), 1);
        assert_eq!(board.absolute_position(0).unwrap(), Position::new(0, 0));
        assert_eq!(board.absolute_position(1).unwrap(), Position::new(SIZE, 0));
        assert_eq!(board.absolute_position(2).unwrap(), Position::new(0, SIZE));
        assert_eq!(
            board.absolute_position(3).unwrap(),
            Position::new(SIZE, SIZE)
        );
    }

    #[test]
    fn one_release_can_connect_to_two_clusters() {
        let mut board = board_2x2();
        board.create_piece(0, 0, 0).unwrap();
        board.create_piece(1, 121, 1).unwrap();
        board.create_piece(2, 1, 121).unwrap();
        board.create_piece(3, 122, 122).unwrap();

        let outcome = board.release(3).unwrap();
        assert_eq!(outcome.connections, 2);
        assert_eq!(board.piece_group(1).unwrap(), board.piece_group(3).unwrap());
        assert_eq!(board.piece_group(2).unwrap(), board.piece_group(3).unwrap());

        let final_release = board.release(0).unwrap();
        assert_eq!(final_release.connections, 1);
        assert_eq!(board.group_count(), 1);
        // three connections for four pieces in total
        assert_eq!(outcome.connections + final_release.connections, 3);
    }

    #[test]
    fn border_sides_block_index_wraparound() {
        let mut board = board_2x2();
        board.create_piece(0, 500, 0).unwrap();
        board.create_piece(1, 0, 0).unwrap();
        board.create_piece(3, 700, 700).unwrap();
        // piece 2 (next row) parked exactly where a right-hand neighbor of
        // piece 1 would rest
        board.create_piece(2, 121, 1).unwrap();

        let outcome = board.release(2).unwrap();
        assert_eq!(outcome.connections, 0);
        assert_eq!(board.group_count(), 0);
    }

    #[test]
    fn apply_piece_joined_switches_groups() {
        let mut board = board_2x2();
        board.apply_group_created(0, 0, 0).unwrap();
        board.apply_group_created(1, 400, 400).unwrap();
        board.apply_piece_joined(3, 10, 10, 0).unwrap();
        assert!(board.group_members(0).unwrap().contains(&3));

        board.apply_piece_joined(3, 20, 20, 1).unwrap();
        assert!(!board.group_members(0).unwrap().contains(&3));
        assert!(board.group_members(1).unwrap().contains(&3));
        assert_eq!(board.piece_position(3).unwrap(), Position::new(20, 20));
    }

    #[test]
    fn apply_rejects_unknown_targets() {
        let mut board = board_2x2();
        assert_eq!(
            board.apply_piece_moved(9, 0, 0),
            Err(BoardError::UnknownPiece(9))
        );
        assert_eq!(
            board.apply_group_moved(5, 0, 0),
            Err(BoardError::UnknownGroup(5))
        );
        assert_eq!(
            board.apply_piece_joined(0, 0, 0, 5),
            Err(BoardError::UnknownGroup(5))
        );
    }

    #[test]
    fn remote_group_ids_keep_local_assignment_ahead() {
        let mut board = board_2x2();
        board.apply_group_created(6, 0, 0).unwrap();
        assert_eq!(board.next_group_id(), 7);
        board.apply_group_created(2, 50, 50).unwrap();
        assert_eq!(board.next_group_id(), 7);
    }

    #[test]
    fn restore_rebuilds_groups_and_id_counter() {
        let mut board = board_2x2();
        let mut state = SnapshotState::default();
        state.groups.insert(4, GroupPlacement { x: 50, y: 60 });
        state.pieces.insert(
            0,
            PiecePlacement {
                x: 0,
                y: 0,
                gid: Some(4),
            },
        );
        state.pieces.insert(
            1,
            PiecePlacement {
                x: SIZE,
                y: 0,
                gid: Some(4),
            },
        );
        state.pieces.insert(
            2,
            PiecePlacement {
                x: 7,
                y: 300,
                gid: None,
            },
        );

        board.restore(&state).unwrap();
        assert_eq!(board.next_group_id(), 5);
        assert_eq!(board.group_position(4).unwrap(), Position::new(50, 60));
        assert_eq!(board.piece_group(0).unwrap(), Some(4));
        assert_eq!(board.piece_group(1).unwrap(), Some(4));
        assert_eq!(board.absolute_position(1).unwrap(), Position::new(170, 60));
        assert_eq!(board.piece_position(2).unwrap(), Position::new(7, 300));
        // piece 3 never appeared in the history
        assert_eq!(board.piece_group(3).unwrap(), None);
        assert_eq!(board.piece_position(3).unwrap(), Position::new(0, 0));
    }

    #[test]
    fn restore_rejects_membership_in_an_unknown_group() {
        let mut board = board_2x2();
        let mut state = SnapshotState::default();
        state.pieces.insert(
            0,
            PiecePlacement {
                x: 0,
                y: 0,
                gid: Some(9),
            },
        );
        assert_eq!(board.restore(&state), Err(BoardError::UnknownGroup(9)));
    }
}
