use std::vec::IntoIter;

use futures::stream::{self, Stream};
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::config::ReplayConfig;
use crate::journal::action::{Action, ActionDecodeError};

use super::board::{Board, BoardError};

const LOG_TARGET: &str = "puzzle::replay";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("action {index} failed to decode")]
    Decode {
        index: usize,
        #[source]
        source: ActionDecodeError,
    },
    #[error("action {index} could not be applied")]
    Apply {
        index: usize,
        #[source]
        source: BoardError,
    },
}

/// One applied history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    pub index: usize,
    pub action: Action,
}

/// Paced playback of a recorded action history onto a board.
///
/// The board starts from scattered pieces with no groups, exactly like a
/// room before anyone acted, and each step re-applies one recorded action
/// followed by the configured delay. Consuming the history makes a replay
/// single-shot.
pub struct Replay {
    board: Board,
    actions: IntoIter<String>,
    next_index: usize,
    config: ReplayConfig,
}

impl Replay {
    pub fn new(mut board: Board, actions: Vec<String>, config: ReplayConfig) -> Self {
        board.reset_groups();
        Self {
            board,
            actions: actions.into_iter(),
            next_index: 0,
            config,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn remaining(&self) -> usize {
        self.actions.len()
    }

    /// Applies the next recorded action, then waits out the step delay.
    /// Returns `None` once the history is exhausted.
    pub async fn step(&mut self) -> Option<Result<ReplayStep, ReplayError>> {
        let line = self.actions.next()?;
        let index = self.next_index;
        self.next_index += 1;

        let action = match line.parse::<Action>() {
            Ok(action) => action,
            Err(source) => return Some(Err(ReplayError::Decode { index, source })),
        };
        if let Err(source) = self.apply(&action) {
            return Some(Err(ReplayError::Apply { index, source }));
        }
        debug!(target = LOG_TARGET, index, action = %line, "replayed action");
        sleep(self.config.step_delay).await;
        Some(Ok(ReplayStep { index, action }))
    }

    /// Plays the whole history and hands back the finished board.
    pub async fn run(mut self) -> Result<(Board, Vec<ReplayStep>), ReplayError> {
        let mut steps = Vec::new();
        while let Some(step) = self.step().await {
            steps.push(step?);
        }
        Ok((self.board, steps))
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<ReplayStep, ReplayError>> {
        stream::unfold(self, |mut replay| async move {
            let step = replay.step().await?;
            Some((step, replay))
        })
    }

    fn apply(&mut self, action: &Action) -> Result<(), BoardError> {
        match *action {
            Action::PieceCreate { id, x, y } | Action::PieceMove { id, x, y } => {
                self.board.apply_piece_moved(id, x, y)
            }
            Action::PieceJoinGroup { id, x, y, group } => {
                self.board.apply_piece_joined(id, x, y, group)
            }
            Action::GroupMove { id, x, y } => self.board.apply_group_moved(id, x, y),
            Action::GroupCreate { id, x, y } => self.board.apply_group_created(id, x, y),
        }
    }
}
