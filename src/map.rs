use std::cmp::Reverse;
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::altitude::AltitudeField;
use crate::base::{assign_starting_locations, create_bases, Base, BaseId};
use crate::chokepoint::{build_chokepoints, ChokePoint, ChokePointId, Node};
use crate::config::AnalysisConfig;
use crate::error::{MapError, Result};
use crate::graph::{update_reachability, ChokePointPath, ConnectivityGraph};
use crate::neutral::{Neutral, NeutralRegistry};
use crate::position::{rounded_dist, segments_intersect, squared_norm, Position, TilePosition, WalkPosition};
use crate::region_analysis::{segment_areas, Area, AreaId};
use crate::snapshot::{MapSnapshot, NeutralKind, UnitId};
use crate::terrain::{MiniTile, TerrainGrid, Tile};
use crate::tile_map::TileMap;

#[derive(Debug, Clone)]
pub struct Map {
    config: AnalysisConfig,
    grid: TerrainGrid,
    max_altitude: u16,
    neutrals: NeutralRegistry,
    areas: Vec<Area>,
    chokepoints: Vec<ChokePoint>,
    graph: ConnectivityGraph,
    bases: Vec<Base>,
    starting_locations: Vec<TilePosition>,
}

impl Map {
    /// Runs the whole analysis on `snapshot`. Fails without producing a
    /// partial map.
    pub fn initialize(snapshot: &MapSnapshot, config: AnalysisConfig) -> Result<Map> {
        let mut grid = TerrainGrid::load(snapshot, &config)?;
        let mut neutrals = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);

        let altitude = AltitudeField::compute(grid.mini_tiles());
        altitude.apply_to(&mut grid);

        neutrals.detect_blocking(&mut grid);

        let segmentation = segment_areas(&mut grid, &config, &snapshot.starting_locations)?;
        let mut areas: Vec<Area> = segmentation
            .areas
            .iter()
            .map(|seed| Area::new(seed.id, seed.top, seed.max_altitude, seed.mini_tiles))
            .collect();

        for idx in 0..grid.tiles().len() {
            let (x, y) = grid.tiles().xy(idx);
            let tile = &grid.tiles()[idx];
            if let Some(area) = tile.area_id().and_then(|id| areas.get_mut(id.index())) {
                area.add_tile_information(TilePosition::new(x, y), tile);
            }
        }

        let chokepoints = build_chokepoints(&segmentation.frontiers, &grid, &neutrals, &config)?;
        for cp in &chokepoints {
            let (a, b) = cp.areas();
            areas.get_mut(a.index()).ok_or(MapError::UnknownArea(a))?.add_chokepoint(b, cp.id());
            areas.get_mut(b.index()).ok_or(MapError::UnknownArea(b))?.add_chokepoint(a, cp.id());
        }

        for neutral in neutrals.iter().filter(|n| !n.is_static_building()) {
            let Some(area) = main_area(&grid, neutral.top_left(), neutral.size()).and_then(|id| areas.get_mut(id.index())) else {
                warn!("{:?} at {} lies in no area", neutral.unit(), neutral.top_left());
                continue;
            };
            if neutral.is_mineral() {
                area.add_mineral(neutral.id());
            } else {
                area.add_geyser(neutral.id());
            }
        }

        let graph = ConnectivityGraph::build(&areas, &chokepoints, &grid);
        update_reachability(&mut areas, &chokepoints);

        let mut bases = Vec::new();
        let mut scores = TileMap::new(grid.width_tiles(), grid.height_tiles(), 0);
        let mut next_base_id = 0;
        for area in areas.iter_mut() {
            let created = create_bases(area, &grid, &neutrals, &config, &mut scores, &mut next_base_id);
            for base in &created {
                area.add_base(base.id());
            }
            bases.extend(created);
        }

        let mut map = Map {
            config,
            grid,
            max_altitude: altitude.max_altitude(),
            neutrals,
            areas,
            chokepoints,
            graph,
            bases,
            starting_locations: snapshot.starting_locations.clone(),
        };
        map.update_islands();
        map.assign_starting_locations_to_suitable_bases()?;

        info!(
            "map analyzed: {} areas, {} chokepoints, {} bases, highest altitude {}",
            map.areas.len(),
            map.chokepoints.len(),
            map.bases.len(),
            map.max_altitude
        );

        Ok(map)
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    #[inline]
    pub fn width_tiles(&self) -> i32 {
        self.grid.width_tiles()
    }

    #[inline]
    pub fn height_tiles(&self) -> i32 {
        self.grid.height_tiles()
    }

    pub fn tile(&self, t: TilePosition) -> Result<&Tile> {
        self.grid.tile(t)
    }

    pub fn mini_tile(&self, w: WalkPosition) -> Result<&MiniTile> {
        self.grid.mini_tile(w)
    }

    /// Highest altitude of any minitile.
    #[inline]
    pub fn max_altitude(&self) -> u16 {
        self.max_altitude
    }

    #[inline]
    pub fn starting_locations(&self) -> &[TilePosition] {
        &self.starting_locations
    }

    #[inline]
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn area(&self, id: AreaId) -> Result<&Area> {
        id.0.checked_sub(1)
            .and_then(|idx| self.areas.get(usize::from(idx)))
            .ok_or(MapError::UnknownArea(id))
    }

    #[inline]
    pub fn chokepoints(&self) -> &[ChokePoint] {
        &self.chokepoints
    }

    #[inline]
    pub fn chokepoint_count(&self) -> usize {
        self.chokepoints.len()
    }

    pub fn chokepoint(&self, id: ChokePointId) -> Result<&ChokePoint> {
        self.chokepoints.get(id.index()).ok_or(MapError::UnknownChokePoint(id))
    }

    #[inline]
    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    #[inline]
    pub fn base_count(&self) -> usize {
        self.bases.len()
    }

    pub fn base(&self, id: BaseId) -> Option<&Base> {
        self.bases.get(id.index())
    }

    #[inline]
    pub fn neutrals(&self) -> &NeutralRegistry {
        &self.neutrals
    }

    pub fn mineral(&self, unit: UnitId) -> Option<&Neutral> {
        self.neutrals.by_unit(unit).filter(|n| n.kind() == NeutralKind::Mineral)
    }

    pub fn geyser(&self, unit: UnitId) -> Option<&Neutral> {
        self.neutrals.by_unit(unit).filter(|n| n.kind() == NeutralKind::Geyser)
    }

    pub fn static_building(&self, unit: UnitId) -> Option<&Neutral> {
        self.neutrals.by_unit(unit).filter(|n| n.kind() == NeutralKind::StaticBuilding)
    }

    /// The area owning minitile `w`, if any.
    pub fn area_at_walk(&self, w: WalkPosition) -> Result<Option<AreaId>> {
        Ok(self.grid.mini_tile(w)?.area_id())
    }

    /// The area owning tile `t`. Tiles shared by several areas have none.
    pub fn area_at_tile(&self, t: TilePosition) -> Result<Option<AreaId>> {
        Ok(self.grid.tile(t)?.area_id())
    }

    pub fn area_of_position(&self, p: Position) -> Result<Option<AreaId>> {
        self.area_at_walk(WalkPosition::from(p))
    }

    /// The area of the nearest minitile that has one, `w` included.
    pub fn nearest_area_walk(&self, w: WalkPosition) -> Result<AreaId> {
        self.grid.mini_tile(w)?;
        self.grid
            .search_mini_tiles(w, &(|m: &MiniTile, _: WalkPosition| m.area_id().is_some(), |_: &MiniTile, _: WalkPosition| true))
            .and_then(|found| self.grid.mini_tile_at(found).area_id())
            .ok_or(MapError::SearchExhausted { what: "nearest area", from: w })
    }

    /// The area of the nearest tile owned by a single area, `t` included.
    pub fn nearest_area_tile(&self, t: TilePosition) -> Result<AreaId> {
        self.grid.tile(t)?;
        self.grid
            .search_tiles(t, &(|tile: &Tile, _: TilePosition| tile.area_id().is_some(), |_: &Tile, _: TilePosition| true))
            .and_then(|found| self.grid.tile_at(found).area_id())
            .ok_or(MapError::SearchExhausted { what: "nearest area", from: WalkPosition::from(t) })
    }

    /// The area owning most tiles of the rectangle, lowest id on ties.
    pub fn main_area(&self, top_left: TilePosition, size: TilePosition) -> Option<AreaId> {
        main_area(&self.grid, top_left, size)
    }

    /// The chokepoint whose middle is the closest to `p`.
    pub fn nearest_chokepoint(&self, p: Position) -> Option<ChokePointId> {
        self.chokepoints
            .iter()
            .min_by_key(|cp| {
                let c = cp.center_position();
                (squared_norm(c.x - p.x, c.y - p.y), cp.id())
            })
            .map(ChokePoint::id)
    }

    pub fn nearest_base(&self, p: Position) -> Option<BaseId> {
        self.bases
            .iter()
            .min_by_key(|base| {
                let c = base.center();
                (squared_norm(c.x - p.x, c.y - p.y), base.id())
            })
            .map(Base::id)
    }

    /// Whether `a` and `b` are linked by open chokepoints.
    pub fn is_accessible_from(&self, a: AreaId, b: AreaId) -> Result<bool> {
        Ok(self.area(a)?.accessible_from(self.area(b)?))
    }

    /// Whether `cp` is open and reachable from `area`, that is its areas
    /// share the reachability group of `area`.
    pub fn chokepoint_accessible_from(&self, cp: ChokePointId, area: AreaId) -> Result<bool> {
        let cp = self.chokepoint(cp)?;
        let area = self.area(area)?;
        let (a, _) = cp.areas();
        Ok(!cp.blocked() && self.area(a)?.group_id() == area.group_id())
    }

    /// Walking distance in pixels through the chokepoint graph, `None` when
    /// `b` cannot be reached from `a`.
    pub fn distance_between(&self, a: ChokePointId, b: ChokePointId) -> Result<Option<u32>> {
        Ok(self.path_between_chokepoints(a, b)?.map(|path| path.length()))
    }

    pub fn path_between_chokepoints(&self, a: ChokePointId, b: ChokePointId) -> Result<Option<ChokePointPath>> {
        self.chokepoint(a)?;
        self.chokepoint(b)?;
        Ok(self.graph.path(a, b))
    }

    /// Route between two pixel positions. Each end is resolved to its
    /// nearest area. Within one area the path has no chokepoint and its
    /// length is the straight-line distance.
    pub fn path_between(&self, a: Position, b: Position) -> Result<Option<ChokePointPath>> {
        let area_a = self.nearest_area_walk(WalkPosition::from(a))?;
        let area_b = self.nearest_area_walk(WalkPosition::from(b))?;

        if area_a == area_b {
            return Ok(Some(ChokePointPath::new(Vec::new(), rounded_dist(a, b))));
        }
        if !self.is_accessible_from(area_a, area_b)? {
            return Ok(None);
        }

        let open = |id: ChokePointId| self.chokepoints.get(id.index()).filter(|cp| !cp.blocked());

        let mut best: Option<(u32, ChokePointId, ChokePointId)> = None;
        for cp_a in self.area(area_a)?.chokepoints().filter_map(open) {
            let dist_a = rounded_dist(a, cp_a.center_position());
            for cp_b in self.area(area_b)?.chokepoints().filter_map(open) {
                let dist_b = rounded_dist(b, cp_b.center_position());
                let Some(between) = self.graph.path(cp_a.id(), cp_b.id()).map(|p| p.length()) else {
                    continue;
                };
                let total = dist_a + dist_b + between;
                if best.map_or(true, |(d, _, _)| total < d) {
                    best = Some((total, cp_a.id(), cp_b.id()));
                }
            }
        }

        let Some((length, from, to)) = best else {
            return Ok(None);
        };
        let Some(mut path) = self.graph.path(from, to) else {
            return Ok(None);
        };
        path.set_length(length);

        // Crossing a single chokepoint: go through whichever part of it is
        // on the way.
        if let &[only] = path.chokepoints() {
            let cp = self.chokepoint(only)?;
            let end1 = cp.pos(Node::End1).center();
            let end2 = cp.pos(Node::End2).center();
            if segments_intersect(a, b, end1, end2) {
                path.set_length(rounded_dist(a, b));
            } else {
                for end in [end1, end2] {
                    let through = rounded_dist(a, end) + rounded_dist(b, end);
                    if through < path.length() {
                        path.set_length(through);
                    }
                }
            }
        }

        Ok(Some(path))
    }

    pub fn enable_automatic_path_update(&mut self) {
        self.config.automatic_path_update = true;
    }

    #[inline]
    pub fn automatic_path_update(&self) -> bool {
        self.config.automatic_path_update
    }

    /// Matches every starting location to a base nearby. Fails if one of
    /// them has no base within reach.
    pub fn assign_starting_locations_to_suitable_bases(&mut self) -> Result<()> {
        assign_starting_locations(&mut self.bases, &self.starting_locations, &self.config)
    }

    /// Forgets the neutral of `unit`. When it was the last layer of a
    /// blocking stack, the ground under it joins the area on one of its
    /// sides, and with automatic path update the chokepoints it closed open
    /// up.
    ///
    /// On error the map is left untouched.
    pub fn on_unit_destroyed(&mut self, unit: UnitId) -> Result<()> {
        let neutral = self.neutrals.by_unit(unit).ok_or(MapError::UnknownUnit(unit))?;
        let id = neutral.id();
        let next_bottom = match self.grid.tile_at(neutral.top_left()).neutral() {
            Some(bottom) if bottom == id => neutral.next_stacked(),
            other => other,
        };

        let new_area = if neutral.is_blocking() && next_bottom.is_none() {
            let Some(new_area) = neutral.blocking_doors().iter().find_map(|w| self.grid.mini_tile_at(*w).area_id()) else {
                return Err(MapError::Invariant(format!("blocking {unit:?} opens onto no area")));
            };
            self.area(new_area)?;
            Some(new_area)
        } else {
            None
        };

        let neutral = self.neutrals.remove(unit, &mut self.grid)?;
        debug!("{unit:?} destroyed at {}", neutral.top_left());

        for area in self.areas.iter_mut() {
            area.on_neutral_destroyed(id);
        }
        for base in self.bases.iter_mut() {
            base.on_neutral_destroyed(id);
        }

        if !neutral.is_blocking() {
            return Ok(());
        }

        let mut reopened = 0;
        for cp in self.chokepoints.iter_mut().filter(|cp| cp.blocking_neutral() == Some(id)) {
            cp.set_blocking_neutral(next_bottom);
            if next_bottom.is_none() && self.config.automatic_path_update {
                cp.set_blocked(false);
                reopened += 1;
            }
        }

        let Some(new_area) = new_area else {
            return Ok(());
        };

        let mut freed = 0;
        for w in neutral.mini_tiles() {
            let mini_tile = self.grid.mini_tile_at_mut(w);
            if mini_tile.blocked() {
                mini_tile.set_blocked(false);
                mini_tile.set_area_id(Some(new_area));
                freed += 1;
            }
        }
        if let Some(area) = self.areas.get_mut(new_area.index()) {
            area.add_mini_tiles(freed);
            for t in neutral.tiles() {
                self.grid.resolve_tile_area(t);
                let tile = self.grid.tile_at(t);
                if tile.area_id() == Some(new_area) {
                    area.add_tile_information(t, tile);
                }
            }
        }
        info!("{freed} minitiles under {unit:?} joined area {new_area}, {reopened} chokepoints reopened");

        if self.config.automatic_path_update {
            self.graph = ConnectivityGraph::build(&self.areas, &self.chokepoints, &self.grid);
            update_reachability(&mut self.areas, &self.chokepoints);
            self.update_islands();
        }

        Ok(())
    }

    fn update_islands(&mut self) {
        for base in self.bases.iter_mut() {
            let island = self
                .areas
                .get(base.area().index())
                .map_or(true, |area| area.accessible_neighbors().is_empty());
            base.set_island(island);
        }
    }
}

/// The area owning most tiles of a rectangle, lowest id on ties.
fn main_area(grid: &TerrainGrid, top_left: TilePosition, size: TilePosition) -> Option<AreaId> {
    let mut counts: BTreeMap<AreaId, usize> = BTreeMap::new();
    for dy in 0..size.y {
        for dx in 0..size.x {
            let t = top_left + TilePosition::new(dx, dy);
            if let Some(id) = grid.tiles().get(t.x, t.y).and_then(Tile::area_id) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }
    counts.into_iter().max_by_key(|(id, count)| (*count, Reverse(*id))).map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NeutralSnapshot;

    fn halves() -> MapSnapshot {
        // Two halves split by a wall on tile columns 15..17.
        let mut snapshot = MapSnapshot::new(32, 16);
        snapshot.block_tiles(TilePosition::new(15, 0), TilePosition::new(2, 16));
        snapshot
    }

    fn plugged_halves() -> MapSnapshot {
        let mut snapshot = MapSnapshot::new(48, 24);
        snapshot.block_tiles(TilePosition::new(23, 0), TilePosition::new(2, 11));
        snapshot.block_tiles(TilePosition::new(23, 13), TilePosition::new(2, 11));
        snapshot.neutrals.push(NeutralSnapshot::static_building(7, TilePosition::new(23, 11), TilePosition::new(2, 2)));
        snapshot
    }

    #[test]
    fn failed_destruction_leaves_the_map_untouched() {
        let mut map = Map::initialize(&plugged_halves(), AnalysisConfig::default()).unwrap();
        map.enable_automatic_path_update();
        let plug = map.static_building(UnitId(7)).unwrap();
        let (plug_id, doors) = (plug.id(), plug.blocking_doors().to_vec());
        assert!(!doors.is_empty());
        let sizes: Vec<usize> = map.areas().iter().map(Area::mini_tiles).collect();

        for w in &doors {
            map.grid.mini_tile_at_mut(*w).set_area_id(None);
        }

        let result = map.on_unit_destroyed(UnitId(7));
        assert!(matches!(result, Err(MapError::Invariant(_))), "{result:?}");

        assert_eq!(map.static_building(UnitId(7)).map(Neutral::id), Some(plug_id));
        assert_eq!(map.grid.tile_at(TilePosition::new(23, 11)).neutral(), Some(plug_id));
        let cp = &map.chokepoints()[0];
        assert!(cp.blocked());
        assert_eq!(cp.blocking_neutral(), Some(plug_id));
        assert_eq!(map.areas().iter().map(Area::mini_tiles).collect::<Vec<_>>(), sizes);
        assert!(!map.is_accessible_from(AreaId(1), AreaId(2)).unwrap());
    }

    #[test]
    fn unconnected_halves_are_not_accessible() {
        let map = Map::initialize(&halves(), AnalysisConfig::default()).unwrap();
        assert_eq!(map.areas().len(), 2);
        assert_eq!(map.chokepoint_count(), 0);

        let (a, b) = (AreaId(1), AreaId(2));
        assert!(!map.is_accessible_from(a, b).unwrap());
        assert!(map.is_accessible_from(a, a).unwrap());
        assert_ne!(map.area(a).unwrap().group_id(), map.area(b).unwrap().group_id());

        let left = Position::new(5 * 32, 8 * 32);
        let right = Position::new(25 * 32, 8 * 32);
        assert_eq!(map.path_between(left, right).unwrap(), None);
    }

    #[test]
    fn same_area_path_is_straight() {
        let map = Map::initialize(&halves(), AnalysisConfig::default()).unwrap();
        let path = map.path_between(Position::new(40, 40), Position::new(70, 80)).unwrap().unwrap();
        assert!(path.chokepoints().is_empty());
        assert_eq!(path.length(), 50);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let map = Map::initialize(&halves(), AnalysisConfig::default()).unwrap();
        assert_eq!(map.area(AreaId(0)).unwrap_err(), MapError::UnknownArea(AreaId(0)));
        assert_eq!(map.area(AreaId(3)).unwrap_err(), MapError::UnknownArea(AreaId(3)));
        assert!(map.distance_between(ChokePointId(0), ChokePointId(0)).unwrap_err().is_caller_error());
        assert!(matches!(map.area_at_tile(TilePosition::new(32, 0)), Err(MapError::OutOfBounds { .. })));
    }

    #[test]
    fn nearest_area_from_the_wall() {
        let map = Map::initialize(&halves(), AnalysisConfig::default()).unwrap();
        let wall = WalkPosition::new(62, 30);
        assert_eq!(map.area_at_walk(wall).unwrap(), None);
        assert_eq!(map.nearest_area_walk(wall).unwrap(), AreaId(1));
        assert_eq!(map.area_at_tile(TilePosition::new(2, 2)).unwrap(), Some(AreaId(1)));
    }

    #[test]
    fn main_area_counts_tiles() {
        let map = Map::initialize(&halves(), AnalysisConfig::default()).unwrap();
        assert_eq!(map.main_area(TilePosition::new(13, 4), TilePosition::new(8, 2)), Some(AreaId(2)));
        assert_eq!(map.main_area(TilePosition::new(14, 4), TilePosition::new(4, 2)), Some(AreaId(1)));
        assert_eq!(map.main_area(TilePosition::new(15, 4), TilePosition::new(2, 2)), None);
    }
}
