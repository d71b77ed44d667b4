use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

use crate::puzzle::{GroupId, PieceId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionDecodeError {
    #[error("empty action")]
    Empty,
    #[error("unknown action kind {0:?}")]
    UnknownKind(String),
    #[error("expected {expected} fields after the kind, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field {text:?} is not a number")]
    Number {
        text: String,
        #[source]
        source: ParseIntError,
    },
}

/// A journaled board mutation in its wire form `kind,id,x,y[,gid]`.
///
/// The numeric kind prefix keeps entries compact enough to journal on
/// every drag update: `0` create, `1` move, `2` join, `3` group move,
/// `4` group create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PieceCreate { id: PieceId, x: i32, y: i32 },
    PieceMove { id: PieceId, x: i32, y: i32 },
    PieceJoinGroup { id: PieceId, x: i32, y: i32, group: GroupId },
    GroupMove { id: GroupId, x: i32, y: i32 },
    GroupCreate { id: GroupId, x: i32, y: i32 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Action::PieceCreate { id, x, y } => write!(f, "0,{id},{x},{y}"),
            Action::PieceMove { id, x, y } => write!(f, "1,{id},{x},{y}"),
            Action::PieceJoinGroup { id, x, y, group } => write!(f, "2,{id},{x},{y},{group}"),
            Action::GroupMove { id, x, y } => write!(f, "3,{id},{x},{y}"),
            Action::GroupCreate { id, x, y } => write!(f, "4,{id},{x},{y}"),
        }
    }
}

impl FromStr for Action {
    type Err = ActionDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let kind = match parts.next() {
            Some(kind) if !kind.is_empty() => kind,
            _ => return Err(ActionDecodeError::Empty),
        };
        let fields: Vec<&str> = parts.collect();
        let expected = match kind {
            "2" => 4,
            "0" | "1" | "3" | "4" => 3,
            other => return Err(ActionDecodeError::UnknownKind(other.to_string())),
        };
        if fields.len() != expected {
            return Err(ActionDecodeError::FieldCount {
                expected,
                found: fields.len(),
            });
        }

        let id = number(fields[0])?;
        let x = number(fields[1])?;
        let y = number(fields[2])?;
        Ok(match kind {
            "0" => Action::PieceCreate { id, x, y },
            "1" => Action::PieceMove { id, x, y },
            "2" => Action::PieceJoinGroup {
                id,
                x,
                y,
                group: number(fields[3])?,
            },
            "3" => Action::GroupMove { id, x, y },
            _ => Action::GroupCreate { id, x, y },
        })
    }
}

fn number<T>(text: &str) -> Result<T, ActionDecodeError>
where
    T: FromStr<Err = ParseIntError>,
{
    text.parse().map_err(|source| ActionDecodeError::Number {
        text: text.to_string(),
        source,
    })
}
