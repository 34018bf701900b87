use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const PIXELS_PER_TILE: i32 = 32;
pub const PIXELS_PER_WALK: i32 = 8;
pub const WALKS_PER_TILE: i32 = 4;

macro_rules! position_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            pub x: i32,
            pub y: i32,
        }

        impl $name {
            #[inline]
            pub const fn new(x: i32, y: i32) -> Self {
                Self { x, y }
            }
        }

        impl Add for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self {
                Self::new(self.x + rhs.x, self.y + rhs.y)
            }
        }

        impl Sub for $name {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                Self::new(self.x - rhs.x, self.y - rhs.y)
            }
        }

        impl Add<i32> for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: i32) -> Self {
                Self::new(self.x + rhs, self.y + rhs)
            }
        }

        impl Sub<i32> for $name {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: i32) -> Self {
                Self::new(self.x - rhs, self.y - rhs)
            }
        }

        impl Mul<i32> for $name {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: i32) -> Self {
                Self::new(self.x * rhs, self.y * rhs)
            }
        }

        impl Div<i32> for $name {
            type Output = Self;
            #[inline]
            fn div(self, rhs: i32) -> Self {
                Self::new(self.x.div_euclid(rhs), self.y.div_euclid(rhs))
            }
        }

        impl From<(i32, i32)> for $name {
            fn from((x, y): (i32, i32)) -> Self {
                Self::new(x, y)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "({}, {})", self.x, self.y)
            }
        }
    };
}

position_type!(
    /// A position in pixels.
    Position
);
position_type!(
    /// A position in minitiles (8x8 pixels).
    WalkPosition
);
position_type!(
    /// A position in tiles (32x32 pixels).
    TilePosition
);

impl From<WalkPosition> for Position {
    fn from(w: WalkPosition) -> Self {
        Position::new(w.x * PIXELS_PER_WALK, w.y * PIXELS_PER_WALK)
    }
}

impl From<TilePosition> for Position {
    fn from(t: TilePosition) -> Self {
        Position::new(t.x * PIXELS_PER_TILE, t.y * PIXELS_PER_TILE)
    }
}

impl From<Position> for WalkPosition {
    fn from(p: Position) -> Self {
        WalkPosition::new(p.x.div_euclid(PIXELS_PER_WALK), p.y.div_euclid(PIXELS_PER_WALK))
    }
}

impl From<TilePosition> for WalkPosition {
    fn from(t: TilePosition) -> Self {
        WalkPosition::new(t.x * WALKS_PER_TILE, t.y * WALKS_PER_TILE)
    }
}

impl From<Position> for TilePosition {
    fn from(p: Position) -> Self {
        TilePosition::new(p.x.div_euclid(PIXELS_PER_TILE), p.y.div_euclid(PIXELS_PER_TILE))
    }
}

impl From<WalkPosition> for TilePosition {
    fn from(w: WalkPosition) -> Self {
        TilePosition::new(w.x.div_euclid(WALKS_PER_TILE), w.y.div_euclid(WALKS_PER_TILE))
    }
}

impl WalkPosition {
    /// Pixel centre of this minitile.
    #[inline]
    pub fn center(self) -> Position {
        Position::from(self) + PIXELS_PER_WALK / 2
    }
}

impl TilePosition {
    /// Pixel centre of this tile.
    #[inline]
    pub fn center(self) -> Position {
        Position::from(self) + PIXELS_PER_TILE / 2
    }
}

pub const ORTHOGONAL_WALK_DELTAS: [WalkPosition; 4] = [
    WalkPosition::new(0, -1),
    WalkPosition::new(-1, 0),
    WalkPosition::new(1, 0),
    WalkPosition::new(0, 1),
];

pub const SURROUNDING_WALK_DELTAS: [WalkPosition; 8] = [
    WalkPosition::new(-1, -1),
    WalkPosition::new(0, -1),
    WalkPosition::new(1, -1),
    WalkPosition::new(-1, 0),
    WalkPosition::new(1, 0),
    WalkPosition::new(-1, 1),
    WalkPosition::new(0, 1),
    WalkPosition::new(1, 1),
];

pub const SURROUNDING_TILE_DELTAS: [TilePosition; 8] = [
    TilePosition::new(-1, -1),
    TilePosition::new(0, -1),
    TilePosition::new(1, -1),
    TilePosition::new(-1, 0),
    TilePosition::new(1, 0),
    TilePosition::new(-1, 1),
    TilePosition::new(0, 1),
    TilePosition::new(1, 1),
];

/// Chessboard distance.
#[inline]
pub fn queen_wise_dist(a: impl Into<(i32, i32)>, b: impl Into<(i32, i32)>) -> i32 {
    let (ax, ay) = a.into();
    let (bx, by) = b.into();
    (ax - bx).abs().max((ay - by).abs())
}

#[inline]
pub fn squared_norm(dx: i32, dy: i32) -> i32 {
    dx * dx + dy * dy
}

#[inline]
pub fn norm(dx: i32, dy: i32) -> f64 {
    f64::from(squared_norm(dx, dy)).sqrt()
}

#[inline]
pub fn rounded_dist(a: Position, b: Position) -> u32 {
    (0.5 + norm(a.x - b.x, a.y - b.y)) as u32
}

/// Distance in pixels from `p` to the rectangle of tiles starting at
/// `top_left` with the given tile `size`.
pub fn dist_to_rectangle(p: Position, top_left: TilePosition, size: TilePosition) -> i32 {
    let tl = Position::from(top_left);
    let br = Position::from(top_left + size) - 1;

    let dx = if p.x < tl.x {
        tl.x - p.x
    } else if p.x > br.x {
        p.x - br.x
    } else {
        0
    };
    let dy = if p.y < tl.y {
        tl.y - p.y
    } else if p.y > br.y {
        p.y - br.y
    } else {
        0
    };

    (0.5 + norm(dx, dy)) as i32
}

/// True if segment `a1-a2` and segment `b1-b2` intersect.
pub fn segments_intersect(a1: Position, a2: Position, b1: Position, b2: Position) -> bool {
    fn orientation(p: Position, q: Position, r: Position) -> i64 {
        let v = i64::from(q.y - p.y) * i64::from(r.x - q.x) - i64::from(q.x - p.x) * i64::from(r.y - q.y);
        v.signum()
    }

    fn on_segment(p: Position, q: Position, r: Position) -> bool {
        q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
    }

    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(a1, b1, a2))
        || (o2 == 0 && on_segment(a1, b2, a2))
        || (o3 == 0 && on_segment(b1, a1, b2))
        || (o4 == 0 && on_segment(b1, a2, b2))
}

impl From<Position> for (i32, i32) {
    fn from(p: Position) -> Self {
        (p.x, p.y)
    }
}

impl From<WalkPosition> for (i32, i32) {
    fn from(p: WalkPosition) -> Self {
        (p.x, p.y)
    }
}

impl From<TilePosition> for (i32, i32) {
    fn from(p: TilePosition) -> Self {
        (p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_round_down() {
        let p = Position::new(70, 33);
        assert_eq!(WalkPosition::from(p), WalkPosition::new(8, 4));
        assert_eq!(TilePosition::from(p), TilePosition::new(2, 1));
        assert_eq!(TilePosition::from(WalkPosition::new(7, 4)), TilePosition::new(1, 1));
        assert_eq!(WalkPosition::from(Position::new(-1, 0)), WalkPosition::new(-1, 0));
    }

    #[test]
    fn queen_distance_is_chebyshev() {
        assert_eq!(queen_wise_dist(TilePosition::new(0, 0), TilePosition::new(3, -5)), 5);
        assert_eq!(queen_wise_dist(WalkPosition::new(2, 2), WalkPosition::new(2, 2)), 0);
    }

    #[test]
    fn distance_to_rectangle_inside_is_zero() {
        let tl = TilePosition::new(2, 2);
        let size = TilePosition::new(2, 1);
        assert_eq!(dist_to_rectangle(Position::new(70, 70), tl, size), 0);
        assert_eq!(dist_to_rectangle(Position::new(64, 32), tl, size), 32);
    }

    #[test]
    fn crossing_segments_intersect() {
        let a1 = Position::new(0, 0);
        let a2 = Position::new(10, 10);
        assert!(segments_intersect(a1, a2, Position::new(0, 10), Position::new(10, 0)));
        assert!(!segments_intersect(a1, a2, Position::new(20, 0), Position::new(30, 0)));
    }
}
