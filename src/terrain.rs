use log::debug;

use crate::config::AnalysisConfig;
use crate::error::{MapError, Result};
use crate::neutral::NeutralId;
use crate::position::{TilePosition, WalkPosition, ORTHOGONAL_WALK_DELTAS, SURROUNDING_WALK_DELTAS, WALKS_PER_TILE};
use crate::region_analysis::AreaId;
use crate::search::{breadth_first_search, SearchCond};
use crate::snapshot::MapSnapshot;
use crate::tile_map::TileMap;

/// What lies under a minitile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ground {
    Terrain,
    /// Unwalkable and either big or touching the map edge.
    Sea,
    /// Small landlocked unwalkable patch. Lakes get altitudes like terrain.
    Lake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniTile {
    ground: Ground,
    altitude: u16,
    area_id: Option<AreaId>,
    blocked: bool,
}

impl Default for MiniTile {
    fn default() -> Self {
        Self { ground: Ground::Terrain, altitude: 0, area_id: None, blocked: false }
    }
}

impl MiniTile {
    #[inline]
    pub fn walkable(&self) -> bool {
        self.ground == Ground::Terrain
    }

    #[inline]
    pub fn ground(&self) -> Ground {
        self.ground
    }

    #[inline]
    pub fn sea(&self) -> bool {
        self.ground == Ground::Sea
    }

    #[inline]
    pub fn lake(&self) -> bool {
        self.ground == Ground::Lake
    }

    /// Approximate distance in pixels to the nearest sea. Zero on sea.
    #[inline]
    pub fn altitude(&self) -> u16 {
        self.altitude
    }

    /// The owning area. `None` on unwalkable minitiles and under blocking
    /// neutrals.
    #[inline]
    pub fn area_id(&self) -> Option<AreaId> {
        self.area_id
    }

    /// Walkable, but covered by a blocking neutral and therefore in no area.
    #[inline]
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub(crate) fn set_walkable(&mut self, walkable: bool) {
        self.ground = if walkable { Ground::Terrain } else { Ground::Sea };
    }

    pub(crate) fn set_altitude(&mut self, altitude: u16) {
        self.altitude = altitude;
    }

    pub(crate) fn set_area_id(&mut self, id: Option<AreaId>) {
        self.area_id = id;
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }
}

/// Area ownership of a tile, resolved from its 16 minitiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileArea {
    #[default]
    None,
    Area(AreaId),
    /// Its minitiles belong to different areas.
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    buildable: bool,
    doodad: bool,
    ground_height: u8,
    area: TileArea,
    min_altitude: u16,
    neutral: Option<NeutralId>,
}

impl Tile {
    #[inline]
    pub fn buildable(&self) -> bool {
        self.buildable
    }

    #[inline]
    pub fn doodad(&self) -> bool {
        self.doodad
    }

    /// 0 (low), 1 (high) or 2 (very high).
    #[inline]
    pub fn ground_height(&self) -> u8 {
        self.ground_height
    }

    #[inline]
    pub fn area(&self) -> TileArea {
        self.area
    }

    /// The owning area, if all of this tile's assigned minitiles agree.
    #[inline]
    pub fn area_id(&self) -> Option<AreaId> {
        match self.area {
            TileArea::Area(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn min_altitude(&self) -> u16 {
        self.min_altitude
    }

    /// The bottom of the stack of neutrals occupying this tile.
    #[inline]
    pub fn neutral(&self) -> Option<NeutralId> {
        self.neutral
    }

    pub(crate) fn set_neutral(&mut self, neutral: Option<NeutralId>) {
        self.neutral = neutral;
    }
}

#[derive(Debug, Clone)]
pub struct TerrainGrid {
    tiles: TileMap<Tile>,
    mini_tiles: TileMap<MiniTile>,
}

impl TerrainGrid {
    /// Loads walkability, buildability and ground height, then sorts the
    /// unwalkable minitiles into seas and lakes.
    pub fn load(snapshot: &MapSnapshot, config: &AnalysisConfig) -> Result<Self> {
        snapshot.validate()?;

        let mut grid = Self {
            tiles: TileMap::new(snapshot.width_tiles, snapshot.height_tiles, Tile::default()),
            mini_tiles: TileMap::new(snapshot.width_walks(), snapshot.height_walks(), MiniTile::default()),
        };

        // An unwalkable minitile also makes its 8 neighbours unwalkable.
        for idx in 0..grid.mini_tiles.len() {
            if snapshot.walkable[idx] {
                continue;
            }
            let (x, y) = grid.mini_tiles.xy(idx);
            let w = WalkPosition::new(x, y);
            grid.mini_tiles[w].set_walkable(false);
            for delta in SURROUNDING_WALK_DELTAS {
                let n = w + delta;
                if let Some(mini_tile) = grid.mini_tiles.get_mut(n.x, n.y) {
                    mini_tile.set_walkable(false);
                }
            }
        }

        for idx in 0..grid.tiles.len() {
            let (x, y) = grid.tiles.xy(idx);
            let t = TilePosition::new(x, y);

            if snapshot.buildable[idx] {
                grid.tiles[t].buildable = true;
                for w in Self::mini_tiles_of(t) {
                    grid.mini_tiles[w].set_walkable(true);
                }
            }

            let height = snapshot.ground_height[idx];
            grid.tiles[t].ground_height = height / 2;
            grid.tiles[t].doodad = height % 2 == 1;
        }

        grid.decide_seas_or_lakes(config);

        Ok(grid)
    }

    fn decide_seas_or_lakes(&mut self, config: &AnalysisConfig) {
        let width = self.mini_tiles.width();
        let height = self.mini_tiles.height();
        let mut seen = vec![false; self.mini_tiles.len()];
        let mut lakes = 0usize;

        for origin_idx in 0..self.mini_tiles.len() {
            if seen[origin_idx] || self.mini_tiles[origin_idx].walkable() {
                continue;
            }

            let (ox, oy) = self.mini_tiles.xy(origin_idx);
            let origin = WalkPosition::new(ox, oy);
            seen[origin_idx] = true;

            let mut to_search = vec![origin];
            let mut extent = vec![origin];
            let mut top_left = origin;
            let mut bottom_right = origin;

            while let Some(current) = to_search.pop() {
                top_left = WalkPosition::new(top_left.x.min(current.x), top_left.y.min(current.y));
                bottom_right = WalkPosition::new(bottom_right.x.max(current.x), bottom_right.y.max(current.y));

                for delta in ORTHOGONAL_WALK_DELTAS {
                    let next = current + delta;
                    let Some(mini_tile) = self.mini_tiles.get(next.x, next.y) else {
                        continue;
                    };
                    let next_idx = self.mini_tiles.linear_index(next.x, next.y);
                    if !mini_tile.walkable() && !seen[next_idx] {
                        seen[next_idx] = true;
                        to_search.push(next);
                        if extent.len() <= config.lake_max_minitiles {
                            extent.push(next);
                        }
                    }
                }
            }

            let is_lake = extent.len() <= config.lake_max_minitiles
                && bottom_right.x - top_left.x <= config.lake_max_width_minitiles
                && bottom_right.y - top_left.y <= config.lake_max_width_minitiles
                && top_left.x >= 2
                && top_left.y >= 2
                && bottom_right.x < width - 2
                && bottom_right.y < height - 2;

            if is_lake {
                lakes += 1;
                for w in extent {
                    self.mini_tiles[w].ground = Ground::Lake;
                }
            }
        }

        debug!("classified {lakes} unwalkable patches as lakes");
    }

    /// The 16 minitiles of a tile.
    pub fn mini_tiles_of(t: TilePosition) -> impl Iterator<Item = WalkPosition> {
        let origin = WalkPosition::from(t);
        (0..WALKS_PER_TILE).flat_map(move |dy| (0..WALKS_PER_TILE).map(move |dx| origin + WalkPosition::new(dx, dy)))
    }

    #[inline]
    pub fn width_tiles(&self) -> i32 {
        self.tiles.width()
    }

    #[inline]
    pub fn height_tiles(&self) -> i32 {
        self.tiles.height()
    }

    #[inline]
    pub fn width_walks(&self) -> i32 {
        self.mini_tiles.width()
    }

    #[inline]
    pub fn height_walks(&self) -> i32 {
        self.mini_tiles.height()
    }

    #[inline]
    pub fn valid_tile(&self, t: TilePosition) -> bool {
        self.tiles.contains(t.x, t.y)
    }

    #[inline]
    pub fn valid_walk(&self, w: WalkPosition) -> bool {
        self.mini_tiles.contains(w.x, w.y)
    }

    pub fn tile(&self, t: TilePosition) -> Result<&Tile> {
        self.tiles.get(t.x, t.y).ok_or(MapError::OutOfBounds { what: "tile", x: t.x, y: t.y })
    }

    pub fn mini_tile(&self, w: WalkPosition) -> Result<&MiniTile> {
        self.mini_tiles.get(w.x, w.y).ok_or(MapError::OutOfBounds { what: "minitile", x: w.x, y: w.y })
    }

    /// Unchecked access for positions already known to be valid.
    #[inline]
    pub(crate) fn tile_at(&self, t: TilePosition) -> &Tile {
        &self.tiles[t]
    }

    #[inline]
    pub(crate) fn tile_at_mut(&mut self, t: TilePosition) -> &mut Tile {
        &mut self.tiles[t]
    }

    #[inline]
    pub(crate) fn mini_tile_at(&self, w: WalkPosition) -> &MiniTile {
        &self.mini_tiles[w]
    }

    #[inline]
    pub(crate) fn mini_tile_at_mut(&mut self, w: WalkPosition) -> &mut MiniTile {
        &mut self.mini_tiles[w]
    }

    pub(crate) fn tiles(&self) -> &TileMap<Tile> {
        &self.tiles
    }

    pub(crate) fn mini_tiles(&self) -> &TileMap<MiniTile> {
        &self.mini_tiles
    }

    pub(crate) fn mini_tiles_mut(&mut self) -> &mut TileMap<MiniTile> {
        &mut self.mini_tiles
    }

    /// True when the tile containing `w` is occupied by some neutral.
    #[inline]
    pub(crate) fn under_neutral(&self, w: WalkPosition) -> bool {
        self.tiles[TilePosition::from(w)].neutral.is_some()
    }

    pub fn search_mini_tiles<S>(&self, start: WalkPosition, cond: &S) -> Option<WalkPosition>
    where
        S: SearchCond<MiniTile, WalkPosition>,
    {
        breadth_first_search(&self.mini_tiles, start, cond)
    }

    pub fn search_tiles<S>(&self, start: TilePosition, cond: &S) -> Option<TilePosition>
    where
        S: SearchCond<Tile, TilePosition>,
    {
        breadth_first_search(&self.tiles, start, cond)
    }

    /// Derives a tile's area from its minitiles: the common area if all
    /// assigned minitiles agree, [`TileArea::Ambiguous`] otherwise.
    pub(crate) fn resolve_tile_area(&mut self, t: TilePosition) {
        let mut area = TileArea::None;
        for w in Self::mini_tiles_of(t) {
            let Some(id) = self.mini_tiles[w].area_id else {
                continue;
            };
            match area {
                TileArea::None => area = TileArea::Area(id),
                TileArea::Area(current) if current != id => {
                    area = TileArea::Ambiguous;
                    break;
                }
                _ => {}
            }
        }
        self.tiles[t].area = area;
    }

    pub(crate) fn resolve_tile_altitude(&mut self, t: TilePosition) {
        let min_altitude = Self::mini_tiles_of(t)
            .map(|w| self.mini_tiles[w].altitude)
            .min()
            .unwrap_or(0);
        self.tiles[t].min_altitude = min_altitude;
    }

    pub(crate) fn resolve_all_tiles(&mut self) {
        for idx in 0..self.tiles.len() {
            let (x, y) = self.tiles.xy(idx);
            let t = TilePosition::new(x, y);
            self.resolve_tile_area(t);
            self.resolve_tile_altitude(t);
        }
    }
}
