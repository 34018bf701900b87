
use std::collections::BTreeMap;
use std::fmt;

use crate::base::BaseId;
use crate::chokepoint::ChokePointId;
use crate::neutral::NeutralId;
use crate::position::{TilePosition, WalkPosition};
use crate::terrain::Tile;

/// Identifier of an area, contiguous from 1 for a given map.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct AreaId(pub u16);

impl AreaId {
    /// Position of this area in a zero-based list. Only valid for ids
    /// handed out by a map.
    #[inline]
    pub(crate) fn index(self) -> usize {
        usize::from(self.0) - 1
    }

    #[inline]
    pub(crate) fn from_index(idx: usize) -> Self {
        AreaId(idx as u16 + 1)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A region of walkable ground grown from one altitude peak.
#[derive(Debug, Clone)]
pub struct Area {
    id: AreaId,
    group_id: u32,
    top: WalkPosition,
    max_altitude: u16,
    mini_tiles: usize,

    top_left: TilePosition,
    bottom_right: TilePosition,
    tiles: usize,
    buildable_tiles: usize,
    high_ground_tiles: usize,
    very_high_ground_tiles: usize,

    chokepoints_by_area: BTreeMap<AreaId, Vec<ChokePointId>>,
    accessible_neighbors: Vec<AreaId>,
    bases: Vec<BaseId>,
    minerals: Vec<NeutralId>,
    geysers: Vec<NeutralId>,
}

impl Area {
    pub(crate) fn new(id: AreaId, top: WalkPosition, max_altitude: u16, mini_tiles: usize) -> Self {
        Self {
            id,
            group_id: 0,
            top,
            max_altitude,
            mini_tiles,
            top_left: TilePosition::new(i32::MAX, i32::MAX),
            bottom_right: TilePosition::new(i32::MIN, i32::MIN),
            tiles: 0,
            buildable_tiles: 0,
            high_ground_tiles: 0,
            very_high_ground_tiles: 0,
            chokepoints_by_area: BTreeMap::new(),
            accessible_neighbors: Vec::new(),
            bases: Vec::new(),
            minerals: Vec::new(),
            geysers: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> AreaId {
        self.id
    }

    /// Areas sharing a group id are mutually reachable.
    #[inline]
    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    /// The minitile of highest altitude, where the area started growing.
    #[inline]
    pub fn top(&self) -> WalkPosition {
        self.top
    }

    #[inline]
    pub fn max_altitude(&self) -> u16 {
        self.max_altitude
    }

    #[inline]
    pub fn mini_tiles(&self) -> usize {
        self.mini_tiles
    }

    /// Bounding box of the tiles owned by this area.
    #[inline]
    pub fn top_left(&self) -> TilePosition {
        self.top_left
    }

    #[inline]
    pub fn bottom_right(&self) -> TilePosition {
        self.bottom_right
    }

    pub fn bounding_box_size(&self) -> TilePosition {
        self.bottom_right - self.top_left + 1
    }

    #[inline]
    pub fn tiles(&self) -> usize {
        self.tiles
    }

    #[inline]
    pub fn buildable_tiles(&self) -> usize {
        self.buildable_tiles
    }

    #[inline]
    pub fn high_ground_tiles(&self) -> usize {
        self.high_ground_tiles
    }

    #[inline]
    pub fn very_high_ground_tiles(&self) -> usize {
        self.very_high_ground_tiles
    }

    /// Chokepoints leading to each neighbouring area. Every entry is
    /// non-empty.
    #[inline]
    pub fn chokepoints_by_area(&self) -> &BTreeMap<AreaId, Vec<ChokePointId>> {
        &self.chokepoints_by_area
    }

    pub fn chokepoints_to(&self, neighbor: AreaId) -> &[ChokePointId] {
        self.chokepoints_by_area.get(&neighbor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All chokepoints of this area, grouped by neighbour.
    pub fn chokepoints(&self) -> impl Iterator<Item = ChokePointId> + '_ {
        self.chokepoints_by_area.values().flatten().copied()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = AreaId> + '_ {
        self.chokepoints_by_area.keys().copied()
    }

    /// Neighbours reachable through at least one open chokepoint.
    #[inline]
    pub fn accessible_neighbors(&self) -> &[AreaId] {
        &self.accessible_neighbors
    }

    #[inline]
    pub fn accessible_from(&self, other: &Area) -> bool {
        self.group_id == other.group_id
    }

    #[inline]
    pub fn bases(&self) -> &[BaseId] {
        &self.bases
    }

    #[inline]
    pub fn minerals(&self) -> &[NeutralId] {
        &self.minerals
    }

    #[inline]
    pub fn geysers(&self) -> &[NeutralId] {
        &self.geysers
    }

    pub(crate) fn add_chokepoint(&mut self, neighbor: AreaId, cp: ChokePointId) {
        self.chokepoints_by_area.entry(neighbor).or_default().push(cp);
    }

    pub(crate) fn add_tile_information(&mut self, t: TilePosition, tile: &Tile) {
        self.tiles += 1;
        self.top_left = TilePosition::new(self.top_left.x.min(t.x), self.top_left.y.min(t.y));
        self.bottom_right = TilePosition::new(self.bottom_right.x.max(t.x), self.bottom_right.y.max(t.y));
        if tile.buildable() {
            self.buildable_tiles += 1;
        }
        match tile.ground_height() {
            1 => self.high_ground_tiles += 1,
            2 => self.very_high_ground_tiles += 1,
            _ => {}
        }
    }

    pub(crate) fn add_mini_tiles(&mut self, count: usize) {
        self.mini_tiles += count;
    }

    pub(crate) fn set_group_id(&mut self, group_id: u32) {
        self.group_id = group_id;
    }

    pub(crate) fn set_accessible_neighbors(&mut self, neighbors: Vec<AreaId>) {
        self.accessible_neighbors = neighbors;
    }

    pub(crate) fn add_base(&mut self, base: BaseId) {
        self.bases.push(base);
    }

    pub(crate) fn add_mineral(&mut self, mineral: NeutralId) {
        self.minerals.push(mineral);
    }

    pub(crate) fn add_geyser(&mut self, geyser: NeutralId) {
        self.geysers.push(geyser);
    }

    pub(crate) fn on_neutral_destroyed(&mut self, neutral: NeutralId) {
        self.minerals.retain(|m| *m != neutral);
        self.geysers.retain(|g| *g != neutral);
    }
}
