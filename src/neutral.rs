use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::{MapError, Result};
use crate::position::{Position, TilePosition, WalkPosition, ORTHOGONAL_WALK_DELTAS, SURROUNDING_WALK_DELTAS};
use crate::region_analysis::AreaId;
use crate::snapshot::{NeutralKind, NeutralSnapshot, UnitId};
use crate::terrain::TerrainGrid;

/// Reach a door must have before a static building counts as blocking.
const STATIC_BUILDING_DOOR_REACH: usize = 10;
/// Reach a door must have before a mineral counts as blocking.
const MINERAL_DOOR_REACH: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeutralId(pub u32);

#[derive(Debug, Clone)]
pub struct Neutral {
    id: NeutralId,
    unit: UnitId,
    kind: NeutralKind,
    pos: Position,
    top_left: TilePosition,
    size: TilePosition,
    initial_amount: u32,
    next_stacked: Option<NeutralId>,
    blocking_doors: Vec<WalkPosition>,
}

impl Neutral {
    #[inline]
    pub fn id(&self) -> NeutralId {
        self.id
    }

    #[inline]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    #[inline]
    pub fn kind(&self) -> NeutralKind {
        self.kind
    }

    #[inline]
    pub fn is_mineral(&self) -> bool {
        self.kind == NeutralKind::Mineral
    }

    #[inline]
    pub fn is_geyser(&self) -> bool {
        self.kind == NeutralKind::Geyser
    }

    #[inline]
    pub fn is_static_building(&self) -> bool {
        self.kind == NeutralKind::StaticBuilding
    }

    /// Centre in pixels.
    #[inline]
    pub fn pos(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn top_left(&self) -> TilePosition {
        self.top_left
    }

    /// Footprint in tiles.
    #[inline]
    pub fn size(&self) -> TilePosition {
        self.size
    }

    #[inline]
    pub fn bottom_right(&self) -> TilePosition {
        self.top_left + self.size - 1
    }

    #[inline]
    pub fn initial_amount(&self) -> u32 {
        self.initial_amount
    }

    /// The neutral stacked right above this one, if any.
    #[inline]
    pub fn next_stacked(&self) -> Option<NeutralId> {
        self.next_stacked
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        !self.blocking_doors.is_empty()
    }

    /// One walkable minitile per side this neutral cuts off.
    #[inline]
    pub fn blocking_doors(&self) -> &[WalkPosition] {
        &self.blocking_doors
    }

    pub fn tiles(&self) -> impl Iterator<Item = TilePosition> {
        let (top_left, size) = (self.top_left, self.size);
        (0..size.y).flat_map(move |dy| (0..size.x).map(move |dx| top_left + TilePosition::new(dx, dy)))
    }

    pub fn mini_tiles(&self) -> impl Iterator<Item = WalkPosition> {
        let origin = WalkPosition::from(self.top_left);
        let size = WalkPosition::from(self.size);
        (0..size.y).flat_map(move |dy| (0..size.x).map(move |dx| origin + WalkPosition::new(dx, dy)))
    }

    fn same_footprint(&self, other: &Neutral) -> bool {
        self.top_left == other.top_left && self.size == other.size
    }
}

#[derive(Debug, Clone, Default)]
pub struct NeutralRegistry {
    neutrals: Vec<Option<Neutral>>,
    by_unit: HashMap<UnitId, NeutralId>,
}

impl NeutralRegistry {
    /// Creates one neutral per snapshot entry and puts it on its tiles.
    pub fn ingest(snapshots: &[NeutralSnapshot], grid: &mut TerrainGrid) -> Self {
        let mut registry = Self::default();
        for snapshot in snapshots {
            let id = NeutralId(registry.neutrals.len() as u32);
            registry.neutrals.push(Some(Neutral {
                id,
                unit: snapshot.id,
                kind: snapshot.kind,
                pos: snapshot.center,
                top_left: snapshot.top_left,
                size: snapshot.size,
                initial_amount: snapshot.initial_amount,
                next_stacked: None,
                blocking_doors: Vec::new(),
            }));
            registry.by_unit.insert(snapshot.id, id);
            registry.put_on_tiles(id, grid);
        }
        registry
    }

    fn put_on_tiles(&mut self, id: NeutralId, grid: &mut TerrainGrid) {
        let Some(neutral) = self.get(id).cloned() else {
            return;
        };

        for t in neutral.tiles() {
            let Some(bottom) = grid.tile_at(t).neutral() else {
                grid.tile_at_mut(t).set_neutral(Some(id));
                continue;
            };

            let top = self.last_stacked(bottom);
            if top == id {
                continue;
            }
            match self.neutrals[top.0 as usize].as_mut() {
                Some(top_neutral) if top_neutral.same_footprint(&neutral) => {
                    if top_neutral.next_stacked.is_none() {
                        debug!("{:?} stacked on {:?} at {}", neutral.unit, top_neutral.unit, neutral.top_left);
                        top_neutral.next_stacked = Some(id);
                    }
                }
                Some(top_neutral) => {
                    warn!(
                        "{:?} partially overlaps {:?} at {}, keeping the older one on that tile",
                        neutral.unit, top_neutral.unit, t
                    );
                }
                None => {}
            }
        }
    }

    /// Detaches a neutral from its tiles. The next stacked neutral, if any,
    /// becomes the bottom of the stack.
    fn remove_from_tiles(&mut self, id: NeutralId, grid: &mut TerrainGrid) {
        let Some(neutral) = self.get(id).cloned() else {
            return;
        };

        for t in neutral.tiles() {
            let Some(bottom) = grid.tile_at(t).neutral() else {
                continue;
            };

            if bottom == id {
                grid.tile_at_mut(t).set_neutral(neutral.next_stacked);
                continue;
            }

            let mut prev = bottom;
            while let Some(next) = self.get(prev).and_then(|n| n.next_stacked) {
                if next == id {
                    if let Some(prev_neutral) = self.neutrals[prev.0 as usize].as_mut() {
                        prev_neutral.next_stacked = neutral.next_stacked;
                    }
                    break;
                }
                prev = next;
            }
        }

        if let Some(n) = self.neutrals[id.0 as usize].as_mut() {
            n.next_stacked = None;
        }
    }

    /// Removes the neutral of `unit` from the map and hands it back.
    pub fn remove(&mut self, unit: UnitId, grid: &mut TerrainGrid) -> Result<Neutral> {
        let id = self.by_unit.get(&unit).copied().ok_or(MapError::UnknownUnit(unit))?;
        self.remove_from_tiles(id, grid);
        self.by_unit.remove(&unit);
        self.neutrals[id.0 as usize].take().ok_or(MapError::UnknownUnit(unit))
    }

    fn last_stacked(&self, mut id: NeutralId) -> NeutralId {
        while let Some(next) = self.get(id).and_then(|n| n.next_stacked) {
            id = next;
        }
        id
    }

    #[inline]
    pub fn get(&self, id: NeutralId) -> Option<&Neutral> {
        self.neutrals.get(id.0 as usize).and_then(|n| n.as_ref())
    }

    pub fn by_unit(&self, unit: UnitId) -> Option<&Neutral> {
        self.by_unit.get(&unit).and_then(|id| self.get(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neutral> {
        self.neutrals.iter().flatten()
    }

    pub fn of_kind(&self, kind: NeutralKind) -> impl Iterator<Item = &Neutral> {
        self.iter().filter(move |n| n.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.by_unit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_unit.is_empty()
    }

    /// Ids of the stack starting at `bottom`, bottom first.
    pub fn stack(&self, bottom: NeutralId) -> Vec<NeutralId> {
        let mut stack = vec![bottom];
        let mut current = bottom;
        while let Some(next) = self.get(current).and_then(|n| n.next_stacked) {
            stack.push(next);
            current = next;
        }
        stack
    }

    /// Distinct areas the doors of a blocking neutral open onto.
    pub fn blocked_areas(&self, id: NeutralId, grid: &TerrainGrid) -> Vec<AreaId> {
        let Some(neutral) = self.get(id) else {
            return Vec::new();
        };
        let mut areas: Vec<AreaId> = neutral
            .blocking_doors
            .iter()
            .filter_map(|w| grid.mini_tile_at(*w).area_id())
            .collect();
        areas.sort();
        areas.dedup();
        areas
    }

    /// Finds the static buildings and minerals that cut the walkable ground
    /// in two or more sizeable parts, records their doors and marks their
    /// footprint as blocked so that no area grows through them.
    pub fn detect_blocking(&mut self, grid: &mut TerrainGrid) {
        let candidates: Vec<NeutralId> = self
            .of_kind(NeutralKind::StaticBuilding)
            .chain(self.of_kind(NeutralKind::Mineral))
            .filter(|n| n.next_stacked.is_none())
            .map(|n| n.id)
            .collect();

        for candidate in candidates {
            let Some(neutral) = self.get(candidate) else {
                continue;
            };

            let true_doors = find_true_doors(neutral, grid);
            if true_doors.len() < 2 {
                continue;
            }

            debug!("{:?} at {} blocks {} doors", neutral.unit, neutral.top_left, true_doors.len());

            let footprint: Vec<WalkPosition> = neutral.mini_tiles().collect();
            let bottom = grid.tile_at(neutral.top_left).neutral().unwrap_or(candidate);
            for id in self.stack(bottom) {
                if let Some(n) = self.neutrals[id.0 as usize].as_mut() {
                    n.blocking_doors = true_doors.clone();
                }
            }

            for w in footprint {
                let mini_tile = grid.mini_tile_at_mut(w);
                if mini_tile.walkable() {
                    mini_tile.set_blocked(true);
                }
            }
        }
    }
}

/// The walkable ring of minitiles just outside a footprint.
fn outer_mini_tile_border(top_left: TilePosition, size: TilePosition) -> Vec<WalkPosition> {
    let tl = WalkPosition::from(top_left) - 1;
    let br = WalkPosition::from(top_left + size);
    let mut border = Vec::new();
    for y in tl.y..=br.y {
        for x in tl.x..=br.x {
            if y == tl.y || y == br.y || x == tl.x || x == br.x {
                border.push(WalkPosition::new(x, y));
            }
        }
    }
    border
}

fn adjoins_lake_or_neutral(w: WalkPosition, grid: &TerrainGrid) -> bool {
    SURROUNDING_WALK_DELTAS.iter().any(|delta| {
        let next = w + *delta;
        grid.valid_walk(next) && (grid.under_neutral(next) || grid.mini_tile_at(next).lake())
    })
}

#[inline]
fn open_ground(w: WalkPosition, grid: &TerrainGrid) -> bool {
    grid.valid_walk(w) && grid.mini_tile_at(w).walkable() && !grid.under_neutral(w)
}

fn find_true_doors(neutral: &Neutral, grid: &TerrainGrid) -> Vec<WalkPosition> {
    let mut border: Vec<WalkPosition> = outer_mini_tile_border(neutral.top_left, neutral.size)
        .into_iter()
        .filter(|w| open_ground(*w, grid))
        .collect();

    // One door per group of border minitiles connected along the obstacle.
    let mut doors = Vec::new();
    while let Some(door) = border.pop() {
        doors.push(door);
        let mut to_visit = vec![door];
        let mut visited = HashSet::from([door]);
        while let Some(current) = to_visit.pop() {
            for delta in ORTHOGONAL_WALK_DELTAS {
                let next = current + delta;
                if !visited.contains(&next) && open_ground(next, grid) && adjoins_lake_or_neutral(next, grid) {
                    visited.insert(next);
                    to_visit.push(next);
                }
            }
        }
        border.retain(|w| !visited.contains(w));
    }

    if doors.len() < 2 {
        return Vec::new();
    }

    // A door only counts if it opens onto enough ground.
    let limit = if neutral.is_static_building() { STATIC_BUILDING_DOOR_REACH } else { MINERAL_DOOR_REACH };
    doors
        .into_iter()
        .filter(|door| {
            let mut to_visit = vec![*door];
            let mut visited = HashSet::from([*door]);
            while let Some(current) = to_visit.pop() {
                if visited.len() >= limit {
                    break;
                }
                for delta in ORTHOGONAL_WALK_DELTAS {
                    let next = current + delta;
                    if !visited.contains(&next) && open_ground(next, grid) {
                        visited.insert(next);
                        to_visit.push(next);
                    }
                }
            }
            visited.len() >= limit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::snapshot::MapSnapshot;

    fn grid_for(snapshot: &MapSnapshot) -> TerrainGrid {
        TerrainGrid::load(snapshot, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn neutral_is_put_on_every_tile_of_its_footprint() {
        let mut snapshot = MapSnapshot::new(8, 8);
        snapshot.neutrals.push(NeutralSnapshot::geyser(3, TilePosition::new(2, 2), 5000));
        let mut grid = grid_for(&snapshot);
        let registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        let id = registry.by_unit(UnitId(3)).unwrap().id();
        for dy in 0..2 {
            for dx in 0..4 {
                assert_eq!(grid.tile_at(TilePosition::new(2 + dx, 2 + dy)).neutral(), Some(id));
            }
        }
        assert_eq!(grid.tile_at(TilePosition::new(6, 2)).neutral(), None);
    }

    #[test]
    fn stacked_neutrals_unstack_one_layer_at_a_time() {
        let mut snapshot = MapSnapshot::new(8, 8);
        let size = TilePosition::new(2, 2);
        snapshot.neutrals.push(NeutralSnapshot::static_building(1, TilePosition::new(3, 3), size));
        snapshot.neutrals.push(NeutralSnapshot::static_building(2, TilePosition::new(3, 3), size));
        let mut grid = grid_for(&snapshot);
        let mut registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        let bottom = registry.by_unit(UnitId(1)).unwrap().id();
        let top = registry.by_unit(UnitId(2)).unwrap().id();
        assert_eq!(registry.get(bottom).unwrap().next_stacked(), Some(top));
        assert_eq!(registry.stack(bottom), vec![bottom, top]);

        registry.remove(UnitId(1), &mut grid).unwrap();
        assert_eq!(grid.tile_at(TilePosition::new(4, 4)).neutral(), Some(top));

        registry.remove(UnitId(2), &mut grid).unwrap();
        assert_eq!(grid.tile_at(TilePosition::new(4, 4)).neutral(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_the_top_of_a_stack_keeps_the_bottom() {
        let mut snapshot = MapSnapshot::new(8, 8);
        snapshot.neutrals.push(NeutralSnapshot::mineral(1, TilePosition::new(1, 1), 100));
        snapshot.neutrals.push(NeutralSnapshot::mineral(2, TilePosition::new(1, 1), 100));
        let mut grid = grid_for(&snapshot);
        let mut registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        let bottom = registry.by_unit(UnitId(1)).unwrap().id();
        registry.remove(UnitId(2), &mut grid).unwrap();
        assert_eq!(grid.tile_at(TilePosition::new(1, 1)).neutral(), Some(bottom));
        assert_eq!(registry.get(bottom).unwrap().next_stacked(), None);
    }

    #[test]
    fn removing_unknown_unit_is_rejected() {
        let snapshot = MapSnapshot::new(4, 4);
        let mut grid = grid_for(&snapshot);
        let mut registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);
        assert_eq!(registry.remove(UnitId(9), &mut grid).unwrap_err(), MapError::UnknownUnit(UnitId(9)));
    }

    #[test]
    fn building_plugging_a_gap_is_blocking() {
        // A wall across the map at tile columns 10..12 with a 2-tile gap
        // at rows 7..9, plugged by a 2x2 building.
        let mut snapshot = MapSnapshot::new(22, 16);
        snapshot.block_tiles(TilePosition::new(10, 0), TilePosition::new(2, 7));
        snapshot.block_tiles(TilePosition::new(10, 9), TilePosition::new(2, 7));
        snapshot.neutrals.push(NeutralSnapshot::static_building(5, TilePosition::new(10, 7), TilePosition::new(2, 2)));
        let mut grid = grid_for(&snapshot);
        let mut registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        registry.detect_blocking(&mut grid);

        let building = registry.by_unit(UnitId(5)).unwrap();
        assert!(building.is_blocking());
        assert_eq!(building.blocking_doors().len(), 2);
        assert!(grid.mini_tile_at(WalkPosition::new(42, 31)).blocked());
    }

    #[test]
    fn building_in_the_open_is_not_blocking() {
        let mut snapshot = MapSnapshot::new(16, 16);
        snapshot.neutrals.push(NeutralSnapshot::static_building(5, TilePosition::new(6, 6), TilePosition::new(2, 2)));
        let mut grid = grid_for(&snapshot);
        let mut registry = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        registry.detect_blocking(&mut grid);

        assert!(!registry.by_unit(UnitId(5)).unwrap().is_blocking());
        assert!(!grid.mini_tile_at(WalkPosition::new(26, 26)).blocked());
    }
}
