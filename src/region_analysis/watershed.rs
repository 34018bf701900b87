// Original under MIT license from: https://github.com/einargs/rust-screeps-code/blob/main/src/rooms/room_cut.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::disjoint_set::DisjointSet;
use crate::error::{MapError, Result};
use crate::position::{norm, TilePosition, WalkPosition, ORTHOGONAL_WALK_DELTAS};
use crate::terrain::{MiniTile, TerrainGrid};
use crate::tile_map::TileMap;

use super::frontier::Frontiers;
use super::structs::AreaId;

const UNLABELED: u32 = u32::MAX;

/// An area while it is still growing. Labels index into the disjoint set,
/// so a merged-away area keeps its slot but is no longer valid.
#[derive(Debug, Clone)]
struct TempArea {
    top: WalkPosition,
    highest_altitude: u16,
    size: usize,
    valid: bool,
}

/// Picks alternately one side then the other when a minitile touches two
/// areas that do not merge, so that a frontier does not drift to one side.
#[derive(Debug, Default)]
struct FrontierTieBreak {
    counters: HashMap<(u32, u32), u32>,
}

impl FrontierTieBreak {
    fn choose(&mut self, a: u32, b: u32) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        let counter = self.counters.entry(key).or_insert(0);
        let chosen = if *counter % 2 == 0 { key.0 } else { key.1 };
        *counter += 1;
        chosen
    }
}

/// A final area as produced by the watershed.
#[derive(Debug, Clone)]
pub struct AreaSeed {
    pub id: AreaId,
    pub top: WalkPosition,
    pub max_altitude: u16,
    pub mini_tiles: usize,
}

/// Result of [`segment_areas`].
#[derive(Debug)]
pub struct Segmentation {
    pub areas: Vec<AreaSeed>,
    pub frontiers: Frontiers,
}

/// Stores the state of a watershed flood grown from altitude peaks.
struct Watershed<'a> {
    mini_tiles: &'a TileMap<MiniTile>,
    config: &'a AnalysisConfig,
    starting_locations: &'a [TilePosition],
    labels: Vec<u32>,
    sets: DisjointSet,
    temp_areas: Vec<TempArea>,
    raw_frontier: Vec<((u32, u32), WalkPosition)>,
    tie_break: FrontierTieBreak,
}

/// Partitions the walkable, unblocked minitiles of `grid` into areas and
/// writes their ids into the minitiles.
///
/// Minitiles are settled by descending altitude. A minitile touching no
/// area starts a new one, a minitile touching one area joins it, and a
/// minitile touching two areas either merges them or becomes part of their
/// frontier. Areas smaller than `area_min_minitiles` are then merged into
/// the neighbour they share the longest contact with.
pub fn segment_areas(grid: &mut TerrainGrid, config: &AnalysisConfig, starting_locations: &[TilePosition]) -> Result<Segmentation> {
    let (assignment, segmentation) = {
        let mut watershed = Watershed::new(grid.mini_tiles(), config, starting_locations);
        watershed.grow();
        let temp_count = watershed.temp_areas.len();
        let merged = watershed.merge_tiny_areas();
        let result = watershed.finalize()?;
        info!(
            "segmented {} areas from {} temporary areas ({} tiny areas merged), {} frontiers",
            result.1.areas.len(),
            temp_count,
            merged,
            result.1.frontiers.len()
        );
        result
    };

    let mini_tiles = grid.mini_tiles_mut();
    for (idx, area_id) in assignment.into_iter().enumerate() {
        mini_tiles[idx].set_area_id(area_id);
    }
    grid.resolve_all_tiles();

    Ok(segmentation)
}

impl<'a> Watershed<'a> {
    fn new(mini_tiles: &'a TileMap<MiniTile>, config: &'a AnalysisConfig, starting_locations: &'a [TilePosition]) -> Self {
        Self {
            mini_tiles,
            config,
            starting_locations,
            labels: vec![UNLABELED; mini_tiles.len()],
            sets: DisjointSet::new(),
            temp_areas: Vec::new(),
            raw_frontier: Vec::new(),
            tie_break: FrontierTieBreak::default(),
        }
    }

    /// Walkable, unblocked minitiles, highest first. Ties keep row-major
    /// order so that the flood is deterministic.
    fn by_descending_altitude(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.mini_tiles.len())
            .filter(|idx| {
                let mini_tile = &self.mini_tiles[*idx];
                mini_tile.walkable() && !mini_tile.blocked()
            })
            .collect();
        order.sort_unstable_by_key(|idx| (Reverse(self.mini_tiles[*idx].altitude()), *idx));
        order
    }

    fn grow(&mut self) {
        for idx in self.by_descending_altitude() {
            let (x, y) = self.mini_tiles.xy(idx);
            let w = WalkPosition::new(x, y);
            let altitude = self.mini_tiles[idx].altitude();

            match self.neighboring_areas(w) {
                (None, _) => {
                    let label = self.sets.push();
                    self.temp_areas.push(TempArea { top: w, highest_altitude: altitude, size: 1, valid: true });
                    self.labels[idx] = label;
                }
                (Some(area), None) => self.add(area, idx),
                (Some(first), Some(second)) => {
                    let (mut smaller, mut bigger) = (first, second);
                    if self.temp_areas[smaller as usize].size > self.temp_areas[bigger as usize].size {
                        std::mem::swap(&mut smaller, &mut bigger);
                    }

                    if self.should_merge(smaller, bigger, w, altitude) {
                        self.add(bigger, idx);
                        self.merge(smaller, bigger);
                    } else {
                        let chosen = self.tie_break.choose(smaller, bigger);
                        self.add(chosen, idx);
                        self.raw_frontier.push(((first, second), w));
                    }
                }
            }
        }
    }

    /// The first labelled 4-neighbour's area, and the lowest other area
    /// among the remaining 4-neighbours.
    fn neighboring_areas(&mut self, w: WalkPosition) -> (Option<u32>, Option<u32>) {
        let mut first: Option<u32> = None;
        let mut second: Option<u32> = None;

        for delta in ORTHOGONAL_WALK_DELTAS {
            let n = w + delta;
            if !self.mini_tiles.contains(n.x, n.y) {
                continue;
            }
            let label = self.labels[self.mini_tiles.linear_index(n.x, n.y)];
            if label == UNLABELED {
                continue;
            }
            let area = self.sets.find(label);
            match first {
                None => first = Some(area),
                Some(f) if f != area => {
                    if second.map_or(true, |s| area < s) {
                        second = Some(area);
                    }
                }
                _ => {}
            }
        }

        (first, second)
    }

    fn should_merge(&self, smaller: u32, bigger: u32, w: WalkPosition, altitude: u16) -> bool {
        let small = &self.temp_areas[smaller as usize];
        let big = &self.temp_areas[bigger as usize];
        let ratio = self.config.merge_altitude_ratio;
        let altitude = f64::from(altitude);

        if small.size < self.config.merge_size_threshold
            || small.highest_altitude < self.config.merge_altitude_threshold
            || altitude / f64::from(big.highest_altitude) >= ratio
            || altitude / f64::from(small.highest_altitude) >= ratio
        {
            return true;
        }

        // Never split the ground right around a starting location.
        let t = TilePosition::from(w);
        self.starting_locations.iter().any(|start| {
            let c = *start + TilePosition::new(2, 1);
            norm(t.x - c.x, t.y - c.y) <= f64::from(self.config.start_location_merge_radius)
        })
    }

    #[inline]
    fn add(&mut self, area: u32, idx: usize) {
        self.temp_areas[area as usize].size += 1;
        self.labels[idx] = area;
    }

    fn merge(&mut self, absorbed: u32, absorbing: u32) {
        self.sets.attach(absorbed, absorbing);
        let size = self.temp_areas[absorbed as usize].size;
        self.temp_areas[absorbing as usize].size += size;
        self.temp_areas[absorbed as usize].valid = false;
    }

    /// Folds each undersized area into the neighbour it touches the most.
    /// Isolated undersized areas are kept as they are. Returns the number
    /// of merges.
    fn merge_tiny_areas(&mut self) -> usize {
        let width = self.mini_tiles.width();
        let height = self.mini_tiles.height();

        let mut contacts: BTreeMap<u32, BTreeMap<u32, usize>> = BTreeMap::new();
        for idx in 0..self.labels.len() {
            if self.labels[idx] == UNLABELED {
                continue;
            }
            let a = self.sets.find(self.labels[idx]);
            let (x, y) = self.mini_tiles.xy(idx);
            for (nx, ny) in [(x + 1, y), (x, y + 1)] {
                if nx >= width || ny >= height {
                    continue;
                }
                let n_label = self.labels[self.mini_tiles.linear_index(nx, ny)];
                if n_label == UNLABELED {
                    continue;
                }
                let b = self.sets.find(n_label);
                if a != b {
                    *contacts.entry(a).or_default().entry(b).or_insert(0) += 1;
                    *contacts.entry(b).or_default().entry(a).or_insert(0) += 1;
                }
            }
        }

        let mut merges = 0;
        loop {
            let tiny = self
                .temp_areas
                .iter()
                .enumerate()
                .filter(|(label, area)| {
                    area.valid
                        && area.size < self.config.area_min_minitiles
                        && contacts.get(&(*label as u32)).is_some_and(|row| !row.is_empty())
                })
                .min_by_key(|(label, area)| (area.size, *label))
                .map(|(label, _)| label as u32);

            let Some(tiny) = tiny else {
                break;
            };

            let tiny_contacts = contacts.remove(&tiny).unwrap_or_default();
            let Some(target) = tiny_contacts
                .iter()
                .max_by_key(|(label, count)| (**count, Reverse(**label)))
                .map(|(label, _)| *label)
            else {
                break;
            };

            debug!("merging tiny area {} ({} minitiles) into {}", tiny, self.temp_areas[tiny as usize].size, target);
            self.merge(tiny, target);
            merges += 1;

            for (other, count) in tiny_contacts {
                if let Some(row) = contacts.get_mut(&other) {
                    row.remove(&tiny);
                }
                if other == target {
                    continue;
                }
                *contacts.entry(target).or_default().entry(other).or_insert(0) += count;
                *contacts.entry(other).or_default().entry(target).or_insert(0) += count;
            }
        }

        merges
    }

    /// Numbers the surviving areas 1..N in creation order, resolves every
    /// label and the raw frontier to those ids.
    fn finalize(mut self) -> Result<(Vec<Option<AreaId>>, Segmentation)> {
        let mut area_ids: HashMap<u32, AreaId> = HashMap::new();
        let mut areas = Vec::new();
        for (label, temp) in self.temp_areas.iter().enumerate() {
            if !temp.valid {
                continue;
            }
            let id = AreaId::from_index(areas.len());
            area_ids.insert(label as u32, id);
            areas.push(AreaSeed {
                id,
                top: temp.top,
                max_altitude: temp.highest_altitude,
                mini_tiles: temp.size,
            });
        }

        if areas.len() > usize::from(u16::MAX) {
            return Err(MapError::Invariant(format!("too many areas: {}", areas.len())));
        }

        let mut assignment = vec![None; self.labels.len()];
        for idx in 0..self.labels.len() {
            if self.labels[idx] == UNLABELED {
                continue;
            }
            let root = self.sets.find(self.labels[idx]);
            let id = area_ids
                .get(&root)
                .copied()
                .ok_or_else(|| MapError::Invariant(format!("minitile {idx} belongs to a merged-away area")))?;
            assignment[idx] = Some(id);
        }

        let mut frontiers = Frontiers::new();
        for ((a, b), w) in std::mem::take(&mut self.raw_frontier) {
            let (ra, rb) = (self.sets.find(a), self.sets.find(b));
            if ra == rb {
                continue;
            }
            if let (Some(ia), Some(ib)) = (area_ids.get(&ra), area_ids.get(&rb)) {
                frontiers.add(*ia, *ib, w);
            }
        }

        Ok((assignment, Segmentation { areas, frontiers }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::AltitudeField;
    use crate::snapshot::MapSnapshot;

    fn segmented(snapshot: &MapSnapshot, config: &AnalysisConfig) -> (TerrainGrid, Segmentation) {
        let mut grid = TerrainGrid::load(snapshot, config).unwrap();
        AltitudeField::compute(grid.mini_tiles()).apply_to(&mut grid);
        let segmentation = segment_areas(&mut grid, config, &snapshot.starting_locations).unwrap();
        (grid, segmentation)
    }

    /// Two 20x24 tile rooms joined by a 2-tile-high corridor.
    fn two_rooms() -> MapSnapshot {
        let mut snapshot = MapSnapshot::new(44, 24);
        snapshot.block_tiles(TilePosition::new(20, 0), TilePosition::new(4, 11));
        snapshot.block_tiles(TilePosition::new(20, 13), TilePosition::new(4, 11));
        snapshot
    }

    #[test]
    fn tie_break_alternates_per_pair() {
        let mut tie_break = FrontierTieBreak::default();
        assert_eq!(tie_break.choose(3, 1), 1);
        assert_eq!(tie_break.choose(1, 3), 3);
        assert_eq!(tie_break.choose(1, 3), 1);
        assert_eq!(tie_break.choose(2, 5), 2);
    }

    #[test]
    fn open_map_is_one_area() {
        let config = AnalysisConfig::default();
        let (grid, segmentation) = segmented(&MapSnapshot::new(16, 16), &config);
        assert_eq!(segmentation.areas.len(), 1);
        assert!(segmentation.frontiers.is_empty());
        assert!(grid.mini_tiles().iter().all(|m| m.area_id() == Some(AreaId(1))));
    }

    #[test]
    fn every_walkable_minitile_gets_exactly_one_area() {
        let config = AnalysisConfig::default();
        let (grid, segmentation) = segmented(&two_rooms(), &config);

        let total: usize = segmentation.areas.iter().map(|a| a.mini_tiles).sum();
        let walkable = grid.mini_tiles().iter().filter(|m| m.walkable()).count();
        assert_eq!(total, walkable);

        for m in grid.mini_tiles().iter() {
            assert_eq!(m.walkable(), m.area_id().is_some());
        }
    }

    #[test]
    fn corridor_separates_two_areas() {
        let config = AnalysisConfig::default();
        let (grid, segmentation) = segmented(&two_rooms(), &config);

        assert_eq!(segmentation.areas.len(), 2);
        let left = grid.mini_tile_at(WalkPosition::new(20, 48)).area_id().unwrap();
        let right = grid.mini_tile_at(WalkPosition::new(150, 48)).area_id().unwrap();
        assert_ne!(left, right);

        let frontier = segmentation.frontiers.get(left, right).unwrap();
        assert!(!frontier.is_empty());
        for w in frontier.positions() {
            assert!((72..104).contains(&w.x) && (44..52).contains(&w.y), "frontier minitile {w} outside the corridor");
        }
    }

    #[test]
    fn frontier_is_ordered_by_descending_altitude() {
        let config = AnalysisConfig::default();
        let (grid, segmentation) = segmented(&two_rooms(), &config);

        for (_, _, frontier) in segmentation.frontiers.iter() {
            let altitudes: Vec<u16> = frontier.positions().map(|w| grid.mini_tile_at(w).altitude()).collect();
            assert!(altitudes.windows(2).all(|p| p[0] >= p[1]));
        }
    }

    #[test]
    fn no_connected_area_is_left_below_the_minimum_size() {
        // Two chambers joined by a narrow gap.
        let mut snapshot = MapSnapshot::new(32, 32);
        snapshot.block_tiles(TilePosition::new(0, 10), TilePosition::new(14, 1));
        snapshot.block_tiles(TilePosition::new(16, 10), TilePosition::new(16, 1));

        let config = AnalysisConfig { area_min_minitiles: 64, ..AnalysisConfig::default() };
        let (_, segmentation) = segmented(&snapshot, &config);

        assert!(segmentation.areas.iter().all(|a| a.mini_tiles >= config.area_min_minitiles));
    }
}
