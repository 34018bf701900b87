#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::position::{Position, TilePosition, WalkPosition, PIXELS_PER_TILE, WALKS_PER_TILE};

/// Highest raw ground height: very high ground with a doodad.
pub const MAX_GROUND_HEIGHT: u8 = 5;

/// Identity of a unit in the host simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeutralKind {
    Mineral,
    Geyser,
    StaticBuilding,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeutralSnapshot {
    pub id: UnitId,
    pub kind: NeutralKind,
    pub center: Position,
    pub top_left: TilePosition,
    /// Footprint in tiles.
    pub size: TilePosition,
    pub initial_amount: u32,
}

impl NeutralSnapshot {
    /// Standard 2x1 mineral field.
    pub fn mineral(id: u32, top_left: TilePosition, amount: u32) -> Self {
        Self::with_footprint(UnitId(id), NeutralKind::Mineral, top_left, TilePosition::new(2, 1), amount)
    }

    /// Standard 4x2 vespene geyser.
    pub fn geyser(id: u32, top_left: TilePosition, amount: u32) -> Self {
        Self::with_footprint(UnitId(id), NeutralKind::Geyser, top_left, TilePosition::new(4, 2), amount)
    }

    pub fn static_building(id: u32, top_left: TilePosition, size: TilePosition) -> Self {
        Self::with_footprint(UnitId(id), NeutralKind::StaticBuilding, top_left, size, 0)
    }

    fn with_footprint(id: UnitId, kind: NeutralKind, top_left: TilePosition, size: TilePosition, initial_amount: u32) -> Self {
        let center = Position::from(top_left) + Position::new(size.x * PIXELS_PER_TILE / 2, size.y * PIXELS_PER_TILE / 2);
        Self { id, kind, center, top_left, size, initial_amount }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapSnapshot {
    pub width_tiles: i32,
    pub height_tiles: i32,
    /// One entry per minitile, row-major.
    pub walkable: Vec<bool>,
    /// One entry per tile, row-major.
    pub buildable: Vec<bool>,
    /// Raw ground height per tile. Odd values carry a doodad.
    pub ground_height: Vec<u8>,
    pub starting_locations: Vec<TilePosition>,
    pub neutrals: Vec<NeutralSnapshot>,
}

impl MapSnapshot {
    /// A fully walkable, buildable, flat map with no neutrals.
    pub fn new(width_tiles: i32, height_tiles: i32) -> Self {
        let tiles = width_tiles.max(0) as usize * height_tiles.max(0) as usize;
        let walks = tiles * (WALKS_PER_TILE * WALKS_PER_TILE) as usize;
        Self {
            width_tiles,
            height_tiles,
            walkable: vec![true; walks],
            buildable: vec![true; tiles],
            ground_height: vec![0; tiles],
            starting_locations: Vec::new(),
            neutrals: Vec::new(),
        }
    }

    #[inline]
    pub fn width_walks(&self) -> i32 {
        self.width_tiles * WALKS_PER_TILE
    }

    #[inline]
    pub fn height_walks(&self) -> i32 {
        self.height_tiles * WALKS_PER_TILE
    }

    pub fn set_walkable(&mut self, w: WalkPosition, walkable: bool) {
        let idx = (w.y * self.width_walks() + w.x) as usize;
        self.walkable[idx] = walkable;
    }

    pub fn set_buildable(&mut self, t: TilePosition, buildable: bool) {
        let idx = (t.y * self.width_tiles + t.x) as usize;
        self.buildable[idx] = buildable;
    }

    pub fn set_ground_height(&mut self, t: TilePosition, height: u8) {
        let idx = (t.y * self.width_tiles + t.x) as usize;
        self.ground_height[idx] = height;
    }

    /// Makes a rectangle of tiles unwalkable and unbuildable.
    pub fn block_tiles(&mut self, top_left: TilePosition, size: TilePosition) {
        for ty in top_left.y..top_left.y + size.y {
            for tx in top_left.x..top_left.x + size.x {
                let t = TilePosition::new(tx, ty);
                self.set_buildable(t, false);
                let origin = WalkPosition::from(t);
                for dy in 0..WALKS_PER_TILE {
                    for dx in 0..WALKS_PER_TILE {
                        self.set_walkable(origin + WalkPosition::new(dx, dy), false);
                    }
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width_tiles <= 0 || self.height_tiles <= 0 {
            return Err(MapError::InvalidSnapshot(format!(
                "map dimensions must be positive, got {}x{}",
                self.width_tiles, self.height_tiles
            )));
        }

        let too_large = || {
            MapError::InvalidSnapshot(format!("map of {}x{} tiles is too large", self.width_tiles, self.height_tiles))
        };
        let tiles = self.width_tiles.checked_mul(self.height_tiles).ok_or_else(too_large)? as usize;
        let walks = self
            .width_tiles
            .checked_mul(WALKS_PER_TILE)
            .zip(self.height_tiles.checked_mul(WALKS_PER_TILE))
            .and_then(|(w, h)| w.checked_mul(h))
            .ok_or_else(too_large)? as usize;
        if self.walkable.len() != walks {
            return Err(MapError::InvalidSnapshot(format!(
                "expected {walks} walkability entries, got {}",
                self.walkable.len()
            )));
        }
        if self.buildable.len() != tiles || self.ground_height.len() != tiles {
            return Err(MapError::InvalidSnapshot(format!(
                "expected {tiles} buildability and ground height entries, got {} and {}",
                self.buildable.len(),
                self.ground_height.len()
            )));
        }

        if let Some(height) = self.ground_height.iter().find(|h| **h > MAX_GROUND_HEIGHT) {
            return Err(MapError::InvalidSnapshot(format!(
                "ground height {height} is above {MAX_GROUND_HEIGHT}"
            )));
        }

        let in_map = |t: TilePosition| t.x >= 0 && t.y >= 0 && t.x < self.width_tiles && t.y < self.height_tiles;

        for start in &self.starting_locations {
            if !in_map(*start) {
                return Err(MapError::OutOfBounds { what: "starting location", x: start.x, y: start.y });
            }
        }

        for neutral in &self.neutrals {
            if neutral.size.x <= 0 || neutral.size.y <= 0 {
                return Err(MapError::InvalidSnapshot(format!("neutral {:?} has an empty footprint", neutral.id)));
            }
            let (t, size) = (neutral.top_left, neutral.size);
            if !in_map(t) || size.x > self.width_tiles - t.x || size.y > self.height_tiles - t.y {
                return Err(MapError::OutOfBounds { what: "neutral footprint", x: neutral.top_left.x, y: neutral.top_left.y });
            }
        }

        let mut ids: Vec<UnitId> = self.neutrals.iter().map(|n| n.id).collect();
        ids.sort();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(MapError::InvalidSnapshot("duplicate neutral unit id".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_validates() {
        let snapshot = MapSnapshot::new(4, 3);
        assert_eq!(snapshot.walkable.len(), 16 * 12);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let mut snapshot = MapSnapshot::new(4, 4);
        snapshot.walkable.pop();
        assert!(matches!(snapshot.validate(), Err(MapError::InvalidSnapshot(_))));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let snapshot = MapSnapshot {
            width_tiles: i32::MAX / 2,
            height_tiles: 3,
            walkable: Vec::new(),
            buildable: Vec::new(),
            ground_height: Vec::new(),
            starting_locations: Vec::new(),
            neutrals: Vec::new(),
        };
        assert!(matches!(snapshot.validate(), Err(MapError::InvalidSnapshot(_))));

        let wide = MapSnapshot { width_tiles: 1 << 20, height_tiles: 1 << 12, ..snapshot };
        assert!(matches!(wide.validate(), Err(MapError::InvalidSnapshot(_))));
    }

    #[test]
    fn unknown_ground_height_is_rejected() {
        let mut snapshot = MapSnapshot::new(4, 4);
        snapshot.set_ground_height(TilePosition::new(1, 2), MAX_GROUND_HEIGHT);
        assert!(snapshot.validate().is_ok());

        snapshot.set_ground_height(TilePosition::new(1, 2), MAX_GROUND_HEIGHT + 1);
        assert!(matches!(snapshot.validate(), Err(MapError::InvalidSnapshot(_))));
    }

    #[test]
    fn huge_neutral_footprint_is_rejected() {
        let mut snapshot = MapSnapshot::new(4, 4);
        snapshot.neutrals.push(NeutralSnapshot {
            size: TilePosition::new(i32::MAX, 1),
            ..NeutralSnapshot::static_building(1, TilePosition::new(2, 2), TilePosition::new(1, 1))
        });
        assert!(matches!(snapshot.validate(), Err(MapError::OutOfBounds { .. })));
    }

    #[test]
    fn neutral_outside_map_is_rejected() {
        let mut snapshot = MapSnapshot::new(4, 4);
        snapshot.neutrals.push(NeutralSnapshot::geyser(1, TilePosition::new(2, 3), 5000));
        assert!(matches!(snapshot.validate(), Err(MapError::OutOfBounds { .. })));
    }

    #[test]
    fn mineral_center_is_middle_of_footprint() {
        let m = NeutralSnapshot::mineral(7, TilePosition::new(3, 5), 1500);
        assert_eq!(m.center, Position::new(3 * 32 + 32, 5 * 32 + 16));
    }
}
