// Original under MIT license from: https://github.com/einargs/rust-screeps-code/blob/main/src/rooms/dist_transform.rs

use std::fmt;

use log::info;

use crate::position::{norm, WalkPosition, ORTHOGONAL_WALK_DELTAS};
use crate::terrain::{MiniTile, TerrainGrid};
use crate::tile_map::TileMap;

/// Minitiles are 8 pixels wide, so scaling minitile distances by 8 gives
/// altitudes in pixels.
pub const ALTITUDE_SCALE: f64 = 8.0;

const MISSING: u16 = u16::MAX;

/// Stores altitude data for every minitile of a map: an approximation of
/// the distance in pixels to the nearest sea, or to the map edge.
#[derive(Debug, Clone)]
pub struct AltitudeField {
    values: TileMap<u16>,
    max_altitude: u16,
}

impl AltitudeField {
    /// Seeds every sea minitile bordering non-sea ground (and the ring just
    /// outside the map) at altitude 0, then settles the other minitiles by
    /// trying offsets in ascending length, so each one gets the altitude of
    /// its nearest seed.
    ///
    /// Lakes are not seeds: they receive altitudes like walkable ground.
    pub fn compute(mini_tiles: &TileMap<MiniTile>) -> AltitudeField {
        let width = mini_tiles.width();
        let height = mini_tiles.height();

        let mut values = TileMap::new(width, height, MISSING);
        for idx in 0..mini_tiles.len() {
            if mini_tiles[idx].sea() {
                values[idx] = 0;
            }
        }

        let deltas = deltas_by_ascending_altitude(width.max(height) / 2 + 3);

        struct ActiveSeaSide {
            origin: WalkPosition,
            last_altitude_generated: i32,
        }

        let is_sea_side = |w: WalkPosition| -> bool {
            let Some(mini_tile) = mini_tiles.get(w.x, w.y) else {
                return true;
            };
            mini_tile.sea()
                && ORTHOGONAL_WALK_DELTAS.iter().any(|delta| {
                    let n = w + *delta;
                    mini_tiles.get(n.x, n.y).is_some_and(|adj| !adj.sea())
                })
        };

        let mut active: Vec<ActiveSeaSide> = Vec::new();
        for y in -1..=height {
            for x in -1..=width {
                let w = WalkPosition::new(x, y);
                if is_sea_side(w) {
                    active.push(ActiveSeaSide { origin: w, last_altitude_generated: 0 });
                }
            }
        }

        let mut max_altitude: u16 = 0;
        for (d, altitude) in deltas {
            let altitude_i32 = i32::from(altitude);
            let mut i = 0;
            while i < active.len() {
                // A seaside minitile that has produced nothing for a while
                // can no longer produce a minimum.
                if altitude_i32 - active[i].last_altitude_generated >= 2 * ALTITUDE_SCALE as i32 {
                    active.swap_remove(i);
                    continue;
                }

                let current = &mut active[i];
                for delta in symmetric_deltas(d) {
                    let w = current.origin + delta;
                    if let Some(value) = values.get_mut(w.x, w.y) {
                        if *value == MISSING {
                            *value = altitude;
                            current.last_altitude_generated = altitude_i32;
                            max_altitude = max_altitude.max(altitude);
                        }
                    }
                }
                i += 1;
            }
        }

        // Only reachable on degenerate inputs; keep the field total.
        for value in values.iter_mut() {
            if *value == MISSING {
                *value = max_altitude;
            }
        }

        info!("altitude field computed, highest altitude {max_altitude}");

        AltitudeField { values, max_altitude }
    }

    #[inline]
    pub fn get(&self, w: WalkPosition) -> u16 {
        self.values[w]
    }

    #[inline]
    pub fn get_index(&self, idx: usize) -> u16 {
        self.values[idx]
    }

    #[inline]
    pub fn max_altitude(&self) -> u16 {
        self.max_altitude
    }

    /// Writes the altitudes into the minitiles and the per-tile minimums.
    pub fn apply_to(&self, grid: &mut TerrainGrid) {
        let mini_tiles = grid.mini_tiles_mut();
        for idx in 0..mini_tiles.len() {
            mini_tiles[idx].set_altitude(self.values[idx]);
        }
        grid.resolve_all_tiles();
    }
}

/// All offsets with `0 <= dy <= dx <= range` (the others follow by
/// symmetry), paired with their altitude and sorted by it.
fn deltas_by_ascending_altitude(range: i32) -> Vec<(WalkPosition, u16)> {
    let mut deltas = Vec::new();
    for dy in 0..=range {
        for dx in dy..=range {
            if dx != 0 || dy != 0 {
                let altitude = (0.5 + norm(dx, dy) * ALTITUDE_SCALE) as u16;
                deltas.push((WalkPosition::new(dx, dy), altitude));
            }
        }
    }
    deltas.sort_by_key(|(_, altitude)| *altitude);
    deltas
}

#[inline]
fn symmetric_deltas(d: WalkPosition) -> [WalkPosition; 8] {
    [
        WalkPosition::new(d.x, d.y),
        WalkPosition::new(-d.x, d.y),
        WalkPosition::new(d.x, -d.y),
        WalkPosition::new(-d.x, -d.y),
        WalkPosition::new(d.y, d.x),
        WalkPosition::new(-d.y, d.x),
        WalkPosition::new(d.y, -d.x),
        WalkPosition::new(-d.y, -d.x),
    ]
}

impl fmt::Display for AltitudeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.values.height() {
            write!(f, "{:3}", self.get(WalkPosition::new(0, y)))?;
            for x in 1..self.values.width() {
                write!(f, " {:3}", self.get(WalkPosition::new(x, y)))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::position::{TilePosition, SURROUNDING_WALK_DELTAS};
    use crate::snapshot::MapSnapshot;

    fn field_for(snapshot: &MapSnapshot) -> (TerrainGrid, AltitudeField) {
        let grid = TerrainGrid::load(snapshot, &AnalysisConfig::default()).unwrap();
        let field = AltitudeField::compute(grid.mini_tiles());
        (grid, field)
    }

    #[test]
    fn deltas_are_sorted_and_start_with_unit_step() {
        let deltas = deltas_by_ascending_altitude(5);
        assert_eq!(deltas[0], (WalkPosition::new(1, 0), 8));
        assert_eq!(deltas[1], (WalkPosition::new(1, 1), 11));
        assert!(deltas.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn open_map_altitude_grows_away_from_edges() {
        let (_, field) = field_for(&MapSnapshot::new(4, 4));
        // The ring outside the map seeds altitude 0.
        assert_eq!(field.get(WalkPosition::new(0, 0)), 8);
        assert_eq!(field.get(WalkPosition::new(0, 8)), 8);
        assert_eq!(field.get(WalkPosition::new(3, 8)), 32);
        assert_eq!(field.max_altitude(), 64);
    }

    #[test]
    fn sea_is_zero_and_walkable_is_positive() {
        let mut snapshot = MapSnapshot::new(8, 8);
        snapshot.block_tiles(TilePosition::new(0, 0), TilePosition::new(8, 2));
        let (grid, field) = field_for(&snapshot);

        for idx in 0..grid.mini_tiles().len() {
            let mini_tile = grid.mini_tiles()[idx];
            if mini_tile.sea() {
                assert_eq!(field.get_index(idx), 0);
            } else {
                assert!(field.get_index(idx) > 0);
            }
        }
    }

    #[test]
    fn seaside_minitiles_are_lower_than_what_they_propagate_to() {
        let mut snapshot = MapSnapshot::new(16, 16);
        snapshot.block_tiles(TilePosition::new(5, 5), TilePosition::new(6, 6));
        snapshot.buildable.iter_mut().for_each(|b| *b = false);
        let (grid, field) = field_for(&snapshot);
        let mini_tiles = grid.mini_tiles();
        let mut highest_boundary = 0;
        let mut lowest_inland = u16::MAX;

        for idx in 0..mini_tiles.len() {
            if !mini_tiles[idx].walkable() {
                continue;
            }
            let (x, y) = mini_tiles.xy(idx);
            let w = WalkPosition::new(x, y);
            let is_boundary = SURROUNDING_WALK_DELTAS.iter().any(|d| {
                let n = w + *d;
                mini_tiles.get(n.x, n.y).map_or(true, |m| m.sea())
            });
            if is_boundary {
                assert!(field.get(w) <= 11, "boundary minitile {w} has altitude {}", field.get(w));
                highest_boundary = highest_boundary.max(field.get(w));
            } else {
                assert!(field.get(w) >= 16, "inland minitile {w} has altitude {}", field.get(w));
                lowest_inland = lowest_inland.min(field.get(w));
            }
        }
        assert!(highest_boundary > 0);
        assert!(highest_boundary < lowest_inland);
    }
}
