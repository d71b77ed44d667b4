use super::side::Side;
use super::Position;

/// Top-left corner of a square capture zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub x: f64,
    pub y: f64,
}

/// Precomputed capture zones for the four sides of a piece.
///
/// Each zone is a square of a third of the piece size, centered along its
/// side and flush with the piece border, so the overlap test tolerates a
/// near-miss of strictly less than one zone in either axis.
#[derive(Debug, Clone, Copy)]
pub struct SideZones {
    zone_size: f64,
    offsets: [(f64, f64); 4],
}

impl SideZones {
    pub fn new(piece_size: i32) -> Self {
        let size = f64::from(piece_size);
        let zone_size = size / 3.0;
        let centered = size / 3.0 + zone_size / 2.0;
        Self {
            zone_size,
            // indexed by Side::index(): top, right, bottom, left
            offsets: [
                (centered, 0.0),
                (size, centered),
                (centered, size),
                (0.0, centered),
            ],
        }
    }

    pub fn zone_size(&self) -> f64 {
        self.zone_size
    }

    /// Capture zone of `side` for a piece whose top-left corner is at `at`.
    pub fn zone(&self, side: Side, at: Position) -> Zone {
        let (dx, dy) = self.offsets[side.index()];
        Zone {
            x: f64::from(at.x) + dx,
            y: f64::from(at.y) + dy,
        }
    }

    /// Whether two capture zones of this size overlap.
    pub fn overlap(&self, a: Zone, b: Zone) -> bool {
        a.x < b.x + self.zone_size
            && a.x + self.zone_size > b.x
            && a.y < b.y + self.zone_size
            && a.y + self.zone_size > b.y
    }
}
