use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One of the four sides of a piece, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    /// Position of this side in a piece's layout string.
    pub const fn index(self) -> usize {
        match self {
            Side::Top => 0,
            Side::Right => 1,
            Side::Bottom => 2,
            Side::Left => 3,
        }
    }

    pub const fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        };
        f.write_str(name)
    }
}

/// Physical form of one side of a piece.
///
/// `Edge` is a flat border side and can never connect. A `Key` protrusion
/// only mates with a `Socket` indentation and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideShape {
    Edge,
    Socket,
    Key,
}

impl SideShape {
    pub const fn mates(self, other: SideShape) -> bool {
        matches!(
            (self, other),
            (SideShape::Key, SideShape::Socket) | (SideShape::Socket, SideShape::Key)
        )
    }

    pub const fn as_char(self) -> char {
        match self {
            SideShape::Edge => 'e',
            SideShape::Socket => 's',
            SideShape::Key => 'k',
        }
    }

    pub const fn from_char(c: char) -> Option<SideShape> {
        match c {
            'e' => Some(SideShape::Edge),
            's' => Some(SideShape::Socket),
            'k' => Some(SideShape::Key),
            _ => None,
        }
    }
}

/// The four side shapes of a piece, ordered top, right, bottom, left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideLayout([SideShape; 4]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SideLayoutError {
    #[error("side layout must have 4 shapes, found {0}")]
    Length(usize),
    #[error("unknown side shape '{0}'")]
    Shape(char),
}

impl SideLayout {
    pub const fn new(shapes: [SideShape; 4]) -> Self {
        Self(shapes)
    }

    pub const fn shape(self, side: Side) -> SideShape {
        self.0[side.index()]
    }

    /// Whether `side` is a flat border side.
    pub fn is_border(self, side: Side) -> bool {
        self.shape(side) == SideShape::Edge
    }
}

impl FromStr for SideLayout {
    type Err = SideLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut shapes = [SideShape::Edge; 4];
        let mut count = 0;
        for c in s.chars() {
            if count == 4 {
                return Err(SideLayoutError::Length(s.chars().count()));
            }
            shapes[count] = SideShape::from_char(c).ok_or(SideLayoutError::Shape(c))?;
            count += 1;
        }
        if count != 4 {
            return Err(SideLayoutError::Length(count));
        }
        Ok(Self(shapes))
    }
}

impl fmt::Display for SideLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for shape in self.0 {
            write!(f, "{}", shape.as_char())?;
        }
        Ok(())
    }
}

/// Generates a consistent set of layouts for a `rows` by `columns` grid, in
/// row-major order.
///
/// Border sides are flat. Interior boundaries alternate key and socket by
/// the parity of the slot above or to the left, so every pair of facing
/// sides mates.
pub fn grid_layouts(rows: u32, columns: u32) -> Vec<SideLayout> {
    let mut layouts = Vec::with_capacity((rows * columns) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let top = if row == 0 {
                SideShape::Edge
            } else if (row + column) % 2 == 0 {
                SideShape::Socket
            } else {
                SideShape::Key
            };
            let bottom = if row == rows - 1 {
                SideShape::Edge
            } else if (row + 1 + column) % 2 == 0 {
                SideShape::Key
            } else {
                SideShape::Socket
            };
            let left = if column == 0 {
                SideShape::Edge
            } else if (row + column) % 2 == 0 {
                SideShape::Socket
            } else {
                SideShape::Key
            };
            let right = if column == columns - 1 {
                SideShape::Edge
            } else if (row + column + 1) % 2 == 0 {
                SideShape::Key
            } else {
                SideShape::Socket
            };
            layouts.push(SideLayout::new([top, right, bottom, left]));
        }
    }
    layouts
}
