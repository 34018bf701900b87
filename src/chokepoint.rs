use std::collections::VecDeque;

use itertools::Itertools;
use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::{MapError, Result};
use crate::neutral::{NeutralId, NeutralRegistry};
use crate::position::{queen_wise_dist, Position, WalkPosition};
use crate::region_analysis::{AreaId, Frontiers};
use crate::terrain::{MiniTile, TerrainGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChokePointId(pub u32);

impl ChokePointId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Landmarks along a chokepoint's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    End1,
    /// Highest point near the middle of the geometry, where the passage is
    /// the widest.
    Middle,
    End2,
}

impl Node {
    pub const ALL: [Node; 3] = [Node::End1, Node::Middle, Node::End2];

    #[inline]
    fn index(self) -> usize {
        match self {
            Node::End1 => 0,
            Node::Middle => 1,
            Node::End2 => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChokePoint {
    id: ChokePointId,
    areas: (AreaId, AreaId),
    geometry: Vec<WalkPosition>,
    nodes: [WalkPosition; 3],
    nodes_in_area: [[WalkPosition; 2]; 3],
    pseudo: bool,
    blocked: bool,
    blocking_neutral: Option<NeutralId>,
}

impl ChokePoint {
    /// Builds a chokepoint and projects each of its nodes into both areas.
    ///
    /// A chokepoint with a blocking neutral is pseudo and starts blocked.
    fn new(
        id: ChokePointId,
        areas: (AreaId, AreaId),
        geometry: Vec<WalkPosition>,
        grid: &TerrainGrid,
        blocking_neutral: Option<NeutralId>,
    ) -> Result<Self> {
        if areas.0 == areas.1 {
            return Err(MapError::Invariant(format!("chokepoint {id:?} joins area {} to itself", areas.0)));
        }
        let (Some(first), Some(last)) = (geometry.first().copied(), geometry.last().copied()) else {
            return Err(MapError::EmptyFrontier(areas.0, areas.1));
        };

        let altitudes: Vec<u16> = geometry.iter().map(|w| grid.mini_tile_at(*w).altitude()).collect();
        let middle = geometry[middle_index(&altitudes)];

        let pseudo = blocking_neutral.is_some();
        let mut cp = ChokePoint {
            id,
            areas,
            geometry,
            nodes: [first, middle, last],
            nodes_in_area: [[first; 2], [middle; 2], [last; 2]],
            pseudo,
            blocked: pseudo,
            blocking_neutral,
        };

        for node in Node::ALL {
            for (side, area) in [areas.0, areas.1].into_iter().enumerate() {
                let start = cp.nodes[node.index()];
                let blocked = cp.blocked;
                let found = grid
                    .search_mini_tiles(
                        start,
                        &(
                            |m: &MiniTile, w: WalkPosition| m.area_id() == Some(area) && !grid.under_neutral(w),
                            |m: &MiniTile, w: WalkPosition| {
                                m.area_id() == Some(area) || (blocked && (m.blocked() || grid.under_neutral(w)))
                            },
                        ),
                    )
                    .ok_or(MapError::SearchExhausted { what: "chokepoint node projection", from: start })?;
                cp.nodes_in_area[node.index()][side] = found;
            }
        }

        Ok(cp)
    }

    #[inline]
    pub fn id(&self) -> ChokePointId {
        self.id
    }

    /// The two areas this chokepoint joins, lowest id first.
    #[inline]
    pub fn areas(&self) -> (AreaId, AreaId) {
        self.areas
    }

    /// Whether this chokepoint is one of the sides of `area`.
    #[inline]
    pub fn touches(&self, area: AreaId) -> bool {
        self.areas.0 == area || self.areas.1 == area
    }

    /// The area across this chokepoint from `area`.
    pub fn other_area(&self, area: AreaId) -> Option<AreaId> {
        if self.areas.0 == area {
            Some(self.areas.1)
        } else if self.areas.1 == area {
            Some(self.areas.0)
        } else {
            None
        }
    }

    /// The minitiles of the passage, from one end to the other. Never
    /// empty, and consecutive minitiles are 8-adjacent.
    #[inline]
    pub fn geometry(&self) -> &[WalkPosition] {
        &self.geometry
    }

    #[inline]
    pub fn pos(&self, node: Node) -> WalkPosition {
        self.nodes[node.index()]
    }

    /// The middle node.
    #[inline]
    pub fn center(&self) -> WalkPosition {
        self.pos(Node::Middle)
    }

    /// Pixel centre of the middle node.
    #[inline]
    pub fn center_position(&self) -> Position {
        self.center().center()
    }

    /// The nearest minitile to `node` that stands inside `area` and is not
    /// covered by a neutral.
    pub fn pos_in_area(&self, node: Node, area: AreaId) -> Option<WalkPosition> {
        if self.areas.0 == area {
            Some(self.nodes_in_area[node.index()][0])
        } else if self.areas.1 == area {
            Some(self.nodes_in_area[node.index()][1])
        } else {
            None
        }
    }

    /// Pseudo chokepoints are made by a blocking neutral rather than by the
    /// terrain. Their geometry is a single minitile.
    #[inline]
    pub fn is_pseudo(&self) -> bool {
        self.pseudo
    }

    #[inline]
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// The neutral at the bottom of the stack blocking this chokepoint.
    #[inline]
    pub fn blocking_neutral(&self) -> Option<NeutralId> {
        self.blocking_neutral
    }

    pub(crate) fn set_blocking_neutral(&mut self, neutral: Option<NeutralId>) {
        self.blocking_neutral = neutral;
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }
}

/// Index of the middle node: starting from the middle of the geometry,
/// climbs to the nearest local altitude peak.
fn middle_index(altitudes: &[u16]) -> usize {
    let mut i = altitudes.len() / 2;
    while i > 0 && altitudes[i - 1] > altitudes[i] {
        i -= 1;
    }
    while i + 1 < altitudes.len() && altitudes[i + 1] > altitudes[i] {
        i += 1;
    }
    i
}

/// Splits a frontier into groups of nearby minitiles. Each group grows at
/// whichever end is closer to the next minitile, so it stays ordered along
/// the passage.
fn cluster_frontier(positions: impl Iterator<Item = WalkPosition>, cluster_min_dist: i32) -> Vec<VecDeque<WalkPosition>> {
    let mut clusters: Vec<VecDeque<WalkPosition>> = Vec::new();

    for w in positions {
        let mut added = false;
        for cluster in clusters.iter_mut() {
            let (Some(front), Some(back)) = (cluster.front(), cluster.back()) else {
                continue;
            };
            let dist_to_front = queen_wise_dist(*front, w);
            let dist_to_back = queen_wise_dist(*back, w);
            if dist_to_front.min(dist_to_back) <= cluster_min_dist {
                if dist_to_front < dist_to_back {
                    cluster.push_front(w);
                } else {
                    cluster.push_back(w);
                }
                added = true;
                break;
            }
        }

        if !added {
            clusters.push(VecDeque::from([w]));
        }
    }

    clusters
}

/// Frontier minitiles at most this far apart belong to the same door.
const DOOR_LINK_DIST: i32 = 2;

/// Splits a cluster into doors: groups of frontier minitiles linked to one
/// another, isolated minitiles trimmed off. If nothing but isolated
/// minitiles remains, the highest one is kept.
///
/// Each door comes back as a chain of 8-adjacent minitiles running from
/// one end of the door to the other.
fn split_doors(cluster: &[WalkPosition], altitude: impl Fn(WalkPosition) -> u16) -> Vec<Vec<WalkPosition>> {
    let linked = |a: WalkPosition, b: WalkPosition| queen_wise_dist(a, b) <= DOOR_LINK_DIST;

    let mut kept: Vec<WalkPosition> = cluster
        .iter()
        .copied()
        .filter(|w| cluster.iter().any(|other| other != w && linked(*other, *w)))
        .collect();
    if kept.is_empty() {
        kept.extend(cluster.iter().copied().max_by_key(|w| altitude(*w)));
    }

    let mut doors = Vec::new();
    let mut grouped = vec![false; kept.len()];
    for start in 0..kept.len() {
        if grouped[start] {
            continue;
        }
        grouped[start] = true;
        let mut members = vec![kept[start]];
        let mut i = 0;
        while i < members.len() {
            let current = members[i];
            for (j, w) in kept.iter().enumerate() {
                if !grouped[j] && linked(current, *w) {
                    grouped[j] = true;
                    members.push(*w);
                }
            }
            i += 1;
        }
        doors.push(door_geometry(&members));
    }

    doors
}

/// Breadth-first walk over linked members from `from`. Returns the last
/// member reached and the predecessor of each member.
fn farthest_member(members: &[WalkPosition], from: usize) -> (usize, Vec<Option<usize>>) {
    let mut parents = vec![None; members.len()];
    let mut seen = vec![false; members.len()];
    seen[from] = true;

    let mut queue = VecDeque::from([from]);
    let mut last = from;
    while let Some(i) = queue.pop_front() {
        last = i;
        for j in 0..members.len() {
            if !seen[j] && queen_wise_dist(members[i], members[j]) <= DOOR_LINK_DIST {
                seen[j] = true;
                parents[j] = Some(i);
                queue.push_back(j);
            }
        }
    }

    (last, parents)
}

/// The shortest chain between the two ends of a door, holes filled so that
/// consecutive minitiles are 8-adjacent.
fn door_geometry(members: &[WalkPosition]) -> Vec<WalkPosition> {
    if members.is_empty() {
        return Vec::new();
    }
    let (end1, _) = farthest_member(members, 0);
    let (end2, parents) = farthest_member(members, end1);

    let mut path = vec![members[end2]];
    let mut current = end2;
    while let Some(prev) = parents[current] {
        path.push(members[prev]);
        current = prev;
    }
    path.reverse();

    let mut geometry: Vec<WalkPosition> = Vec::with_capacity(path.len() * 2);
    for w in path {
        if let Some(&prev) = geometry.last() {
            if queen_wise_dist(prev, w) > 1 {
                geometry.push(prev + WalkPosition::new((w.x - prev.x).signum(), (w.y - prev.y).signum()));
            }
        }
        geometry.push(w);
    }
    geometry
}

/// Creates the chokepoints of every frontier, then one pseudo chokepoint
/// per pair of areas cut off from each other by a blocking neutral.
pub fn build_chokepoints(
    frontiers: &Frontiers,
    grid: &TerrainGrid,
    neutrals: &NeutralRegistry,
    config: &AnalysisConfig,
) -> Result<Vec<ChokePoint>> {
    let mut chokepoints: Vec<ChokePoint> = Vec::new();

    for (a, b, frontier) in frontiers.iter() {
        if frontier.is_empty() {
            return Err(MapError::EmptyFrontier(a, b));
        }

        let first = chokepoints.len();
        for cluster in cluster_frontier(frontier.positions(), config.cluster_min_dist) {
            let cluster: Vec<WalkPosition> = cluster.into();
            for door in split_doors(&cluster, |w| grid.mini_tile_at(w).altitude()) {
                let id = ChokePointId(chokepoints.len() as u32);
                chokepoints.push(ChokePoint::new(id, (a, b), door, grid, None)?);
            }
        }
        debug!("frontier {a}-{b}: {} minitiles in {} chokepoints", frontier.len(), chokepoints.len() - first);
    }

    let blocking = neutrals.iter().filter(|n| n.is_blocking() && n.next_stacked().is_none());
    for neutral in blocking {
        let areas = neutrals.blocked_areas(neutral.id(), grid);
        for (a, b) in areas.iter().copied().tuple_combinations() {
            let origin = WalkPosition::from(neutral.pos());
            let center = grid
                .search_mini_tiles(origin, &(|m: &MiniTile, _: WalkPosition| m.walkable(), |_: &MiniTile, _: WalkPosition| true))
                .ok_or(MapError::SearchExhausted { what: "pseudo chokepoint centre", from: origin })?;
            // Stacked neutrals unblock one at a time, starting from the bottom.
            let bottom = grid.tile_at(neutral.top_left()).neutral().unwrap_or(neutral.id());

            let id = ChokePointId(chokepoints.len() as u32);
            debug!("pseudo chokepoint {id:?} between {a} and {b} under {:?}", neutral.unit());
            chokepoints.push(ChokePoint::new(id, (a, b), vec![center], grid, Some(bottom))?);
        }
    }

    info!("built {} chokepoints", chokepoints.len());

    Ok(chokepoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::AltitudeField;
    use crate::position::TilePosition;
    use crate::region_analysis::segment_areas;
    use crate::snapshot::{MapSnapshot, NeutralSnapshot};

    fn analyzed(snapshot: &MapSnapshot) -> Result<(TerrainGrid, NeutralRegistry, Vec<ChokePoint>)> {
        let config = AnalysisConfig::default();
        let mut grid = TerrainGrid::load(snapshot, &config)?;
        let mut neutrals = NeutralRegistry::ingest(&snapshot.neutrals, &mut grid);
        AltitudeField::compute(grid.mini_tiles()).apply_to(&mut grid);
        neutrals.detect_blocking(&mut grid);
        let segmentation = segment_areas(&mut grid, &config, &snapshot.starting_locations)?;
        let chokepoints = build_chokepoints(&segmentation.frontiers, &grid, &neutrals, &config)?;
        Ok((grid, neutrals, chokepoints))
    }

    #[test]
    fn middle_climbs_to_local_peak() {
        assert_eq!(middle_index(&[1, 2, 3, 4, 5]), 4);
        assert_eq!(middle_index(&[5, 4, 3, 2, 1]), 0);
        assert_eq!(middle_index(&[1, 3, 2, 3, 1]), 1);
        assert_eq!(middle_index(&[7]), 0);
    }

    #[test]
    fn frontier_splits_on_gaps() {
        let positions = [
            WalkPosition::new(10, 10),
            WalkPosition::new(10, 11),
            WalkPosition::new(10, 9),
            WalkPosition::new(60, 10),
            WalkPosition::new(10, 12),
        ];
        let clusters = cluster_frontier(positions.into_iter(), 17);

        assert_eq!(clusters.len(), 2);
        let first: Vec<_> = clusters[0].iter().copied().collect();
        assert_eq!(
            first,
            vec![WalkPosition::new(10, 9), WalkPosition::new(10, 10), WalkPosition::new(10, 11), WalkPosition::new(10, 12)]
        );
        assert_eq!(clusters[1].len(), 1);
    }

    #[test]
    fn doors_split_at_gaps_and_drop_isolated_minitiles() {
        let upper = (0..8).map(|y| WalkPosition::new(10, y));
        let lower = (17..25).map(|y| WalkPosition::new(10, y));
        let mut cluster: Vec<WalkPosition> = upper.chain(lower).collect();
        cluster.push(WalkPosition::new(14, 12));

        let doors = split_doors(&cluster, |_| 0);

        assert_eq!(doors.len(), 2);
        for door in &doors {
            assert_eq!(door.len(), 8);
            assert!(door.windows(2).all(|p| queen_wise_dist(p[0], p[1]) == 1));
            assert!(!door.contains(&WalkPosition::new(14, 12)));
        }
        let ends: Vec<_> = doors.iter().map(|d| (d[0].y.min(d[7].y), d[0].y.max(d[7].y))).sorted().collect();
        assert_eq!(ends, vec![(0, 7), (17, 24)]);
    }

    #[test]
    fn door_holes_are_filled() {
        let cluster = [WalkPosition::new(0, 0), WalkPosition::new(2, 1), WalkPosition::new(4, 3), WalkPosition::new(5, 4)];
        let doors = split_doors(&cluster, |_| 0);

        assert_eq!(doors.len(), 1);
        let door = &doors[0];
        assert!(door.windows(2).all(|p| queen_wise_dist(p[0], p[1]) == 1), "{door:?}");
        let ends = [door[0], door[door.len() - 1]];
        assert!(ends.contains(&WalkPosition::new(0, 0)) && ends.contains(&WalkPosition::new(5, 4)));
    }

    #[test]
    fn only_isolated_minitiles_keep_the_highest() {
        let cluster = [WalkPosition::new(0, 0), WalkPosition::new(5, 5), WalkPosition::new(9, 1)];
        let doors = split_doors(&cluster, |w| w.y as u16);
        assert_eq!(doors, vec![vec![WalkPosition::new(5, 5)]]);
    }

    #[test]
    fn corridor_makes_one_chokepoint_with_projected_nodes() {
        let mut snapshot = MapSnapshot::new(44, 24);
        snapshot.block_tiles(TilePosition::new(20, 0), TilePosition::new(4, 11));
        snapshot.block_tiles(TilePosition::new(20, 13), TilePosition::new(4, 11));
        let (grid, _, chokepoints) = analyzed(&snapshot).unwrap();

        assert_eq!(chokepoints.len(), 1);
        let cp = &chokepoints[0];
        let (a, b) = cp.areas();
        assert!(a < b);
        assert!(!cp.geometry().is_empty());
        assert!(cp.geometry().windows(2).all(|p| queen_wise_dist(p[0], p[1]) == 1));
        assert!(!cp.blocked() && !cp.is_pseudo());

        for node in Node::ALL {
            for area in [a, b] {
                let w = cp.pos_in_area(node, area).unwrap();
                assert_eq!(grid.mini_tile_at(w).area_id(), Some(area));
                assert!(queen_wise_dist(w, cp.pos(node)) <= 4, "{node:?} projected too far into {area}");
            }
        }
        assert_eq!(cp.pos_in_area(Node::Middle, AreaId(99)), None);
    }

    #[test]
    fn blocking_building_makes_a_blocked_pseudo_chokepoint() {
        let mut snapshot = MapSnapshot::new(22, 16);
        snapshot.block_tiles(TilePosition::new(10, 0), TilePosition::new(2, 7));
        snapshot.block_tiles(TilePosition::new(10, 9), TilePosition::new(2, 7));
        snapshot.neutrals.push(NeutralSnapshot::static_building(5, TilePosition::new(10, 7), TilePosition::new(2, 2)));
        let (grid, neutrals, chokepoints) = analyzed(&snapshot).unwrap();

        assert_eq!(chokepoints.len(), 1);
        let cp = &chokepoints[0];
        assert!(cp.is_pseudo());
        assert!(cp.blocked());
        assert_eq!(cp.geometry().len(), 1);
        assert_eq!(cp.blocking_neutral(), neutrals.by_unit(crate::snapshot::UnitId(5)).map(|n| n.id()));

        let (a, b) = cp.areas();
        assert_ne!(a, b);
        for area in [a, b] {
            let w = cp.pos_in_area(Node::Middle, area).unwrap();
            assert_eq!(grid.mini_tile_at(w).area_id(), Some(area));
        }
    }
}
