use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::algo::astar;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{EdgeFiltered, EdgeRef};
use priority_queue::PriorityQueue;

use crate::chokepoint::{ChokePoint, ChokePointId, Node};
use crate::disjoint_set::DisjointSet;
use crate::error::{MapError, Result};
use crate::position::{TilePosition, WalkPosition, PIXELS_PER_TILE, SURROUNDING_TILE_DELTAS};
use crate::region_analysis::{Area, AreaId};
use crate::terrain::{Tile, TerrainGrid, TileArea};
use crate::tile_map::TileMap;

/// Cost of a straight step between two tiles.
const ORTHOGONAL_COST: u32 = 10_000;
/// Cost of a diagonal step, `ORTHOGONAL_COST * sqrt(2)`.
const DIAGONAL_COST: u32 = 14_142;

/// A route through the chokepoint graph, with its length in pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChokePointPath {
    chokepoints: Vec<ChokePointId>,
    length: u32,
}

impl ChokePointPath {
    pub(crate) fn new(chokepoints: Vec<ChokePointId>, length: u32) -> Self {
        Self { chokepoints, length }
    }

    /// The chokepoints crossed, in order. Empty when both ends lie in the
    /// same area.
    #[inline]
    pub fn chokepoints(&self) -> &[ChokePointId] {
        &self.chokepoints
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    pub(crate) fn set_length(&mut self, length: u32) {
        self.length = length;
    }
}

/// Chokepoints linked by the walking distance between them across the area
/// they share.
///
/// Blocked chokepoints can be the end of a path but are never crossed.
#[derive(Debug, Clone)]
pub struct ConnectivityGraph {
    graph: DiGraphMap<ChokePointId, u32>,
    blocked: Vec<bool>,
    paths: RefCell<HashMap<(ChokePointId, ChokePointId), Option<ChokePointPath>>>,
}

impl ConnectivityGraph {
    fn empty(blocked: Vec<bool>) -> Self {
        let mut graph = DiGraphMap::new();
        for idx in 0..blocked.len() {
            graph.add_node(ChokePointId(idx as u32));
        }
        Self { graph, blocked, paths: RefCell::new(HashMap::new()) }
    }

    /// Links `a` and `b` both ways. Keeps the shortest of parallel links.
    fn connect(&mut self, a: ChokePointId, b: ChokePointId, length: u32) {
        let length = match self.graph.edge_weight(a, b) {
            Some(existing) => length.min(*existing),
            None => length,
        };
        self.graph.add_edge(a, b, length);
        self.graph.add_edge(b, a, length);
    }

    /// Computes every area-internal distance between chokepoints of the
    /// same area. Pseudo chokepoints of the same neutral are 0 apart.
    ///
    /// A pair whose distance cannot be measured is left unlinked.
    pub fn build(areas: &[Area], chokepoints: &[ChokePoint], grid: &TerrainGrid) -> Self {
        let mut graph = Self::empty(chokepoints.iter().map(ChokePoint::blocked).collect());

        for area in areas {
            let ids: Vec<ChokePointId> = area.chokepoints().collect();
            for (a, b) in ids.into_iter().tuple_combinations() {
                match link_length(grid, chokepoints, area.id(), a, b) {
                    Ok(Some(length)) => graph.connect(a, b, length),
                    Ok(None) => warn!("no walk inside area {} between {a:?} and {b:?}", area.id()),
                    Err(e) => warn!("{a:?} and {b:?} left unlinked in area {}: {e}", area.id()),
                }
            }
        }

        for (a, b) in chokepoints.iter().filter(|cp| cp.is_pseudo()).tuple_combinations() {
            if a.blocking_neutral().is_some() && a.blocking_neutral() == b.blocking_neutral() {
                graph.connect(a.id(), b.id(), 0);
            }
        }

        info!("chokepoint graph has {} links", graph.graph.edge_count() / 2);

        graph
    }

    #[inline]
    pub fn chokepoint_count(&self) -> usize {
        self.blocked.len()
    }

    /// Area-internal distance between two chokepoints of a common area.
    pub fn link(&self, a: ChokePointId, b: ChokePointId) -> Option<u32> {
        self.graph.edge_weight(a, b).copied()
    }

    /// Shortest route from `from` to `to`, or `None` if `to` cannot be
    /// reached without crossing a blocked chokepoint. Results are memoized
    /// until the graph is rebuilt.
    pub fn path(&self, from: ChokePointId, to: ChokePointId) -> Option<ChokePointPath> {
        if let Some(cached) = self.paths.borrow().get(&(from, to)) {
            return cached.clone();
        }

        let open = EdgeFiltered::from_fn(&self.graph, |edge: (ChokePointId, ChokePointId, &u32)| {
            edge.source() == from || !self.is_blocked(edge.source())
        });
        let path = astar(&open, from, |node| node == to, |edge| *edge.weight(), |_| 0)
            .map(|(length, chokepoints)| ChokePointPath::new(chokepoints, length));

        debug!("path {from:?} -> {to:?}: {:?}", path.as_ref().map(ChokePointPath::length));
        self.paths.borrow_mut().insert((from, to), path.clone());
        path
    }

    #[inline]
    fn is_blocked(&self, cp: ChokePointId) -> bool {
        self.blocked.get(cp.index()).copied().unwrap_or(true)
    }
}

fn link_length(
    grid: &TerrainGrid,
    chokepoints: &[ChokePoint],
    area: AreaId,
    a: ChokePointId,
    b: ChokePointId,
) -> Result<Option<u32>> {
    let from = middle_in_area(chokepoints, a, area)?;
    let to = middle_in_area(chokepoints, b, area)?;
    area_distance(grid, area, from, to)
}

fn middle_in_area(chokepoints: &[ChokePoint], cp: ChokePointId, area: AreaId) -> Result<WalkPosition> {
    chokepoints
        .get(cp.index())
        .ok_or(MapError::UnknownChokePoint(cp))?
        .pos_in_area(Node::Middle, area)
        .ok_or_else(|| MapError::Invariant(format!("{cp:?} is listed by area {area} but does not touch it")))
}

/// A tile of `area` near the minitile `w`.
fn tile_in_area(grid: &TerrainGrid, area: AreaId, w: WalkPosition) -> Result<TilePosition> {
    let start = TilePosition::from(w);
    grid.search_tiles(start, &(|tile: &Tile, _: TilePosition| tile.area_id() == Some(area), |_: &Tile, _: TilePosition| true))
        .ok_or(MapError::SearchExhausted { what: "tile of area", from: w })
}

#[inline]
fn to_pixels(cost: u32) -> u32 {
    (0.5 + f64::from(cost) * f64::from(PIXELS_PER_TILE) / f64::from(ORTHOGONAL_COST)) as u32
}

/// Walking distance in pixels between two minitiles of `area`, stepping on
/// tiles of that area or on tiles shared with a neighbour.
pub(crate) fn area_distance(grid: &TerrainGrid, area: AreaId, from: WalkPosition, to: WalkPosition) -> Result<Option<u32>> {
    let start = tile_in_area(grid, area, from)?;
    let target = tile_in_area(grid, area, to)?;

    let walkable = |t: TilePosition| -> bool {
        grid.valid_tile(t)
            && match grid.tile_at(t).area() {
                TileArea::Area(id) => id == area,
                TileArea::Ambiguous => true,
                TileArea::None => false,
            }
    };

    let mut costs = TileMap::new(grid.width_tiles(), grid.height_tiles(), u32::MAX);
    let mut queue: PriorityQueue<TilePosition, Reverse<u32>> = PriorityQueue::new();
    costs[start] = 0;
    queue.push(start, Reverse(0));

    while let Some((t, Reverse(cost))) = queue.pop() {
        if t == target {
            return Ok(Some(to_pixels(cost)));
        }

        for delta in SURROUNDING_TILE_DELTAS {
            let next = t + delta;
            if !walkable(next) {
                continue;
            }
            let diagonal = delta.x != 0 && delta.y != 0;
            // No corner cutting.
            if diagonal && !(walkable(TilePosition::new(next.x, t.y)) && walkable(TilePosition::new(t.x, next.y))) {
                continue;
            }

            let next_cost = cost + if diagonal { DIAGONAL_COST } else { ORTHOGONAL_COST };
            if next_cost < costs[next] {
                costs[next] = next_cost;
                queue.push_increase(next, Reverse(next_cost));
            }
        }
    }

    Ok(None)
}

/// Groups areas linked by open chokepoints and lists, for each area, the
/// neighbours reachable through at least one of them.
///
/// Group ids start at 1 and follow the order of the areas' lowest ids.
pub(crate) fn update_reachability(areas: &mut [Area], chokepoints: &[ChokePoint]) {
    let mut sets = DisjointSet::with_len(areas.len());
    for cp in chokepoints.iter().filter(|cp| !cp.blocked()) {
        let (a, b) = cp.areas();
        let (ra, rb) = (sets.find(a.index() as u32), sets.find(b.index() as u32));
        if ra != rb {
            sets.attach(ra.max(rb), ra.min(rb));
        }
    }

    let is_open = |cp: &ChokePointId| chokepoints.get(cp.index()).is_some_and(|c| !c.blocked());

    let mut group_ids: HashMap<u32, u32> = HashMap::new();
    for area in areas.iter_mut() {
        let root = sets.find(area.id().index() as u32);
        let next_group = group_ids.len() as u32 + 1;
        let group_id = *group_ids.entry(root).or_insert(next_group);
        area.set_group_id(group_id);

        let accessible: Vec<AreaId> = area
            .chokepoints_by_area()
            .iter()
            .filter(|(_, cps)| cps.iter().any(is_open))
            .map(|(neighbor, _)| *neighbor)
            .collect();
        area.set_accessible_neighbors(accessible);
    }

    info!("{} areas in {} reachability groups", areas.len(), group_ids.len());
}
