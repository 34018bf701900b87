use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::{MapError, Result};
use crate::neutral::{Neutral, NeutralId, NeutralRegistry};
use crate::position::{dist_to_rectangle, norm, queen_wise_dist, Position, TilePosition, PIXELS_PER_TILE};
use crate::region_analysis::{Area, AreaId};
use crate::terrain::TerrainGrid;
use crate::tile_map::TileMap;

/// Footprint of a main building, in tiles.
pub const COMMAND_CENTER_SIZE: TilePosition = TilePosition::new(4, 3);

/// Resources closer than this many tiles forbid a main building.
const RESOURCE_CLEARANCE: i32 = 3;

/// Scratch score marking a tile too close to a resource.
const FORBIDDEN: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseId(pub u32);

impl BaseId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Base {
    id: BaseId,
    area: AreaId,
    location: TilePosition,
    center: Position,
    minerals: Vec<NeutralId>,
    geysers: Vec<NeutralId>,
    blocking_minerals: Vec<NeutralId>,
    starting: bool,
    island: bool,
}

impl Base {
    fn new(
        id: BaseId,
        area: AreaId,
        location: TilePosition,
        resources: &[&Neutral],
        blocking_minerals: Vec<NeutralId>,
    ) -> Self {
        Base {
            id,
            area,
            location,
            center: command_center_center(location),
            minerals: resources.iter().filter(|r| r.is_mineral()).map(|r| r.id()).collect(),
            geysers: resources.iter().filter(|r| r.is_geyser()).map(|r| r.id()).collect(),
            blocking_minerals,
            starting: false,
            island: false,
        }
    }

    #[inline]
    pub fn id(&self) -> BaseId {
        self.id
    }

    #[inline]
    pub fn area(&self) -> AreaId {
        self.area
    }

    /// Top-left tile of the main building.
    #[inline]
    pub fn location(&self) -> TilePosition {
        self.location
    }

    #[inline]
    pub fn center(&self) -> Position {
        self.center
    }

    #[inline]
    pub fn minerals(&self) -> &[NeutralId] {
        &self.minerals
    }

    #[inline]
    pub fn geysers(&self) -> &[NeutralId] {
        &self.geysers
    }

    /// Tiny minerals lying where the main building should go.
    #[inline]
    pub fn blocking_minerals(&self) -> &[NeutralId] {
        &self.blocking_minerals
    }

    #[inline]
    pub fn is_starting_location(&self) -> bool {
        self.starting
    }

    /// The base's area has no accessible neighbour.
    #[inline]
    pub fn is_island(&self) -> bool {
        self.island
    }

    #[inline]
    pub fn is_mineral_only(&self) -> bool {
        !self.minerals.is_empty() && self.geysers.is_empty()
    }

    /// Moves the base onto the starting location it was matched to.
    pub(crate) fn set_starting_location(&mut self, location: TilePosition) {
        self.starting = true;
        self.location = location;
        self.center = command_center_center(location);
    }

    pub(crate) fn clear_starting_location(&mut self) {
        self.starting = false;
    }

    pub(crate) fn set_island(&mut self, island: bool) {
        self.island = island;
    }

    pub(crate) fn on_neutral_destroyed(&mut self, neutral: NeutralId) {
        self.minerals.retain(|m| *m != neutral);
        self.geysers.retain(|g| *g != neutral);
        self.blocking_minerals.retain(|m| *m != neutral);
    }
}

#[inline]
fn command_center_center(location: TilePosition) -> Position {
    Position::from(location) + Position::from(COMMAND_CENTER_SIZE) / 2
}

/// Places bases around the resources of one area, best spot first, until
/// every resource worth mining is assigned or no valid spot remains.
///
/// `scores` is scratch space the size of the tile grid; it is left zeroed.
pub(crate) fn create_bases(
    area: &Area,
    grid: &TerrainGrid,
    neutrals: &NeutralRegistry,
    config: &AnalysisConfig,
    scores: &mut TileMap<i32>,
    next_id: &mut u32,
) -> Vec<Base> {
    let max_dist = config.max_tiles_between_command_center_and_resources;

    let mut remaining: Vec<&Neutral> = area
        .minerals()
        .iter()
        .filter_map(|id| neutrals.get(*id))
        .filter(|m| m.initial_amount() >= config.min_mineral_amount && !m.is_blocking())
        .chain(
            area.geysers()
                .iter()
                .filter_map(|id| neutrals.get(*id))
                .filter(|g| g.initial_amount() >= config.min_geyser_amount && !g.is_blocking()),
        )
        .collect();

    let mut bases: Vec<Base> = Vec::new();

    while !remaining.is_empty() {
        // Only look near the remaining resources.
        let mut resources_top_left = TilePosition::new(i32::MAX, i32::MAX);
        let mut resources_bottom_right = TilePosition::new(i32::MIN, i32::MIN);
        for r in &remaining {
            resources_top_left = TilePosition::new(resources_top_left.x.min(r.top_left().x), resources_top_left.y.min(r.top_left().y));
            resources_bottom_right =
                TilePosition::new(resources_bottom_right.x.max(r.bottom_right().x), resources_bottom_right.y.max(r.bottom_right().y));
        }
        let search_min = area.top_left();
        let search_max = area.bottom_right() - COMMAND_CENTER_SIZE + 1;
        let clamp = |t: TilePosition| {
            TilePosition::new(t.x.min(search_max.x).max(search_min.x), t.y.min(search_max.y).max(search_min.y))
        };
        let search_top_left = clamp(resources_top_left - COMMAND_CENTER_SIZE - max_dist);
        let search_bottom_right = clamp(resources_bottom_right + 1 + max_dist);

        // Potential field: tiles of this area score higher the closer they
        // are to resources, geysers counting triple.
        for r in &remaining {
            for t in around(r, COMMAND_CENTER_SIZE.x + max_dist, COMMAND_CENTER_SIZE.y + max_dist) {
                let Some(tile) = grid.tiles().get(t.x, t.y) else {
                    continue;
                };
                let dist = (dist_to_rectangle(t.center(), r.top_left(), r.size()) + PIXELS_PER_TILE / 2) / PIXELS_PER_TILE;
                let mut score = (max_dist + 3 - dist).max(0);
                if r.is_geyser() {
                    score *= 3;
                }
                if tile.area_id() == Some(area.id()) {
                    scores[t] += score;
                }
            }
        }

        for r in &remaining {
            for t in around(r, RESOURCE_CLEARANCE, RESOURCE_CLEARANCE) {
                if let Some(score) = scores.get_mut(t.x, t.y) {
                    *score = FORBIDDEN;
                }
            }
        }

        let mut best: Option<(TilePosition, i32, Vec<NeutralId>)> = None;
        for y in search_top_left.y..=search_bottom_right.y {
            for x in search_top_left.x..=search_bottom_right.x {
                let location = TilePosition::new(x, y);
                let Some(score) = location_score(location, area.id(), grid, neutrals, scores) else {
                    continue;
                };
                if score > best.as_ref().map_or(0, |(_, s, _)| *s) {
                    if let Some(blocking) = validate_location(location, &bases, grid, neutrals, config) {
                        best = Some((location, score, blocking));
                    }
                }
            }
        }

        for r in &remaining {
            for t in around(r, COMMAND_CENTER_SIZE.x + max_dist, COMMAND_CENTER_SIZE.y + max_dist) {
                if let Some(score) = scores.get_mut(t.x, t.y) {
                    *score = 0;
                }
            }
        }

        let Some((location, score, blocking_minerals)) = best else {
            debug!("area {}: no room for a base near {} resources", area.id(), remaining.len());
            break;
        };

        let (assigned, rest): (Vec<&Neutral>, Vec<&Neutral>) = remaining
            .into_iter()
            .partition(|r| dist_to_rectangle(r.pos(), location, COMMAND_CENTER_SIZE) + 2 <= max_dist * PIXELS_PER_TILE);
        remaining = rest;

        if assigned.is_empty() {
            break;
        }

        let id = BaseId(*next_id);
        *next_id += 1;
        debug!("area {}: base {id:?} at {location} (score {score}) with {} resources", area.id(), assigned.len());
        bases.push(Base::new(id, area.id(), location, &assigned, blocking_minerals));
    }

    bases
}

/// Tiles around a resource footprint, widened by `dx` and `dy`.
fn around(r: &Neutral, dx: i32, dy: i32) -> impl Iterator<Item = TilePosition> {
    let (top_left, size) = (r.top_left(), r.size());
    (-dy..size.y + dy).flat_map(move |y| (-dx..size.x + dx).map(move |x| top_left + TilePosition::new(x, y)))
}

/// Sum of the scores under a main building placed at `location`, or `None`
/// if it cannot stand there.
fn location_score(
    location: TilePosition,
    area: AreaId,
    grid: &TerrainGrid,
    neutrals: &NeutralRegistry,
    scores: &TileMap<i32>,
) -> Option<i32> {
    let mut sum = 0;
    for dy in 0..COMMAND_CENTER_SIZE.y {
        for dx in 0..COMMAND_CENTER_SIZE.x {
            let t = location + TilePosition::new(dx, dy);
            let tile = grid.tiles().get(t.x, t.y)?;
            if !tile.buildable() || scores[t] == FORBIDDEN || tile.area_id() != Some(area) {
                return None;
            }
            if tile.neutral().and_then(|n| neutrals.get(n)).is_some_and(Neutral::is_static_building) {
                return None;
            }
            sum += scores[t];
        }
    }
    Some(sum)
}

/// Checks the surroundings of a candidate location: no geyser or sizeable
/// mineral within reach, and far enough from the other bases. Returns the
/// tiny minerals that would have to be mined out.
fn validate_location(
    location: TilePosition,
    bases: &[Base],
    grid: &TerrainGrid,
    neutrals: &NeutralRegistry,
    config: &AnalysisConfig,
) -> Option<Vec<NeutralId>> {
    let mut blocking_minerals = Vec::new();
    for dy in -RESOURCE_CLEARANCE..COMMAND_CENTER_SIZE.y + RESOURCE_CLEARANCE {
        for dx in -RESOURCE_CLEARANCE..COMMAND_CENTER_SIZE.x + RESOURCE_CLEARANCE {
            let t = location + TilePosition::new(dx, dy);
            let Some(neutral) = grid.tiles().get(t.x, t.y).and_then(|tile| tile.neutral()).and_then(|n| neutrals.get(n)) else {
                continue;
            };
            if neutral.is_geyser() {
                return None;
            }
            if neutral.is_mineral() {
                if neutral.initial_amount() > config.blocking_mineral_max_amount {
                    return None;
                }
                if !blocking_minerals.contains(&neutral.id()) {
                    blocking_minerals.push(neutral.id());
                }
            }
        }
    }

    let too_close = bases.iter().any(|base| {
        let d = base.location() - location;
        norm(d.x, d.y) < f64::from(config.min_tiles_between_bases)
    });
    if too_close {
        return None;
    }

    Some(blocking_minerals)
}

/// Matches every starting location to the nearest base within
/// `max_tiles_between_starting_location_and_base`, ties going to the lowest
/// base id. A base serves at most one starting location.
pub(crate) fn assign_starting_locations(bases: &mut [Base], starting_locations: &[TilePosition], config: &AnalysisConfig) -> Result<()> {
    for base in bases.iter_mut() {
        base.clear_starting_location();
    }

    for start in starting_locations {
        let nearest = bases
            .iter_mut()
            .filter(|base| !base.is_starting_location())
            .map(|base| (queen_wise_dist(base.location(), *start), base))
            .filter(|(dist, _)| *dist <= config.max_tiles_between_starting_location_and_base)
            .min_by_key(|(dist, base)| (*dist, base.id()));

        let Some((_, base)) = nearest else {
            return Err(MapError::UnassignedStartingLocation(*start));
        };
        debug!("starting location {start} assigned to {:?}", base.id());
        base.set_starting_location(*start);
    }

    info!("{} starting locations assigned", starting_locations.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_at(id: u32, x: i32, y: i32) -> Base {
        Base::new(BaseId(id), AreaId(1), TilePosition::new(x, y), &[], Vec::new())
    }

    #[test]
    fn center_is_middle_of_command_center() {
        let base = base_at(0, 10, 20);
        assert_eq!(base.center(), Position::new(10 * 32 + 64, 20 * 32 + 48));
    }

    #[test]
    fn starting_location_goes_to_nearest_base() {
        let config = AnalysisConfig::default();
        let mut bases = vec![base_at(0, 10, 10), base_at(1, 12, 11), base_at(2, 40, 40)];

        assign_starting_locations(&mut bases, &[TilePosition::new(13, 11)], &config).unwrap();

        assert!(!bases[0].is_starting_location());
        assert!(bases[1].is_starting_location());
        assert_eq!(bases[1].location(), TilePosition::new(13, 11));
        assert!(!bases[2].is_starting_location());
    }

    #[test]
    fn reassignment_is_stable() {
        let config = AnalysisConfig::default();
        let mut bases = vec![base_at(0, 10, 10), base_at(1, 30, 10)];
        let starts = [TilePosition::new(11, 10), TilePosition::new(29, 12)];

        assign_starting_locations(&mut bases, &starts, &config).unwrap();
        let first: Vec<_> = bases.iter().map(|b| (b.is_starting_location(), b.location())).collect();
        assign_starting_locations(&mut bases, &starts, &config).unwrap();
        let second: Vec<_> = bases.iter().map(|b| (b.is_starting_location(), b.location())).collect();

        assert_eq!(first, second);
        assert!(bases.iter().all(Base::is_starting_location));
    }

    #[test]
    fn unmatched_starting_location_is_an_error() {
        let config = AnalysisConfig::default();
        let mut bases = vec![base_at(0, 10, 10)];
        let err = assign_starting_locations(&mut bases, &[TilePosition::new(30, 30)], &config).unwrap_err();
        assert_eq!(err, MapError::UnassignedStartingLocation(TilePosition::new(30, 30)));
    }

    #[test]
    fn destroyed_mineral_leaves_every_list() {
        let mut base = base_at(0, 0, 0);
        base.minerals = vec![NeutralId(1), NeutralId(2)];
        base.blocking_minerals = vec![NeutralId(2)];
        base.on_neutral_destroyed(NeutralId(2));
        assert_eq!(base.minerals(), &[NeutralId(1)]);
        assert!(base.blocking_minerals().is_empty());
        assert!(base.is_mineral_only());
    }
}
