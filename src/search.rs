use std::collections::VecDeque;
use std::ops::Add;

use crate::position::{TilePosition, WalkPosition, SURROUNDING_TILE_DELTAS, SURROUNDING_WALK_DELTAS};
use crate::tile_map::TileMap;

/// A coordinate type that addresses cells of a [`TileMap`].
pub trait GridPosition: 'static + Copy + Eq + Add<Output = Self> + Into<(i32, i32)> {
    /// Offsets of the 8 surrounding cells.
    fn surrounding() -> &'static [Self];
}

impl GridPosition for WalkPosition {
    fn surrounding() -> &'static [Self] {
        &SURROUNDING_WALK_DELTAS
    }
}

impl GridPosition for TilePosition {
    fn surrounding() -> &'static [Self] {
        &SURROUNDING_TILE_DELTAS
    }
}

/// The two predicates steering a [`breadth_first_search`].
pub trait SearchCond<C, P> {
    /// The search stops at the first cell for which this holds.
    fn found(&self, cell: &C, pos: P) -> bool;
    /// Cells for which this holds are expanded further.
    fn visit(&self, cell: &C, pos: P) -> bool;
}

impl<C, P, F, V> SearchCond<C, P> for (F, V)
where
    F: Fn(&C, P) -> bool,
    V: Fn(&C, P) -> bool,
{
    #[inline]
    fn found(&self, cell: &C, pos: P) -> bool {
        (self.0)(cell, pos)
    }

    #[inline]
    fn visit(&self, cell: &C, pos: P) -> bool {
        (self.1)(cell, pos)
    }
}

/// 8-connected breadth-first search over `grid` from `start`.
///
/// Returns the first position satisfying `cond.found`, `start` included, or
/// `None` once every cell reachable through `cond.visit` has been seen.
pub fn breadth_first_search<C, P, S>(grid: &TileMap<C>, start: P, cond: &S) -> Option<P>
where
    P: GridPosition,
    S: SearchCond<C, P>,
{
    let (sx, sy) = start.into();
    let start_cell = grid.get(sx, sy)?;
    if cond.found(start_cell, start) {
        return Some(start);
    }

    let mut visited = vec![false; grid.len()];
    visited[grid.linear_index(sx, sy)] = true;

    let mut to_visit = VecDeque::new();
    to_visit.push_back(start);

    while let Some(current) = to_visit.pop_front() {
        for delta in P::surrounding() {
            let next = current + *delta;
            let (nx, ny) = next.into();
            let Some(cell) = grid.get(nx, ny) else {
                continue;
            };

            if cond.found(cell, next) {
                return Some(next);
            }

            let idx = grid.linear_index(nx, ny);
            if !visited[idx] && cond.visit(cell, next) {
                visited[idx] = true;
                to_visit.push_back(next);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_start_when_it_matches() {
        let grid = TileMap::new(3, 3, 1u8);
        let found = breadth_first_search(&grid, WalkPosition::new(1, 1), &(|c: &u8, _| *c == 1, |_: &u8, _| true));
        assert_eq!(found, Some(WalkPosition::new(1, 1)));
    }

    #[test]
    fn finds_nearest_match_through_visitable_cells() {
        let mut grid = TileMap::new(5, 1, 0u8);
        grid[TilePosition::new(4, 0)] = 2;
        grid[TilePosition::new(2, 0)] = 9;

        let through_all = breadth_first_search(&grid, TilePosition::new(0, 0), &(|c: &u8, _| *c == 2, |_: &u8, _| true));
        assert_eq!(through_all, Some(TilePosition::new(4, 0)));

        let blocked = breadth_first_search(&grid, TilePosition::new(0, 0), &(|c: &u8, _| *c == 2, |c: &u8, _| *c != 9));
        assert_eq!(blocked, None);
    }

    fn surrounding_of<P: GridPosition>() -> &'static [P] {
        P::surrounding()
    }

    #[test]
    fn both_resolutions_surround_with_eight_distinct_offsets() {
        let walks = surrounding_of::<WalkPosition>();
        let tiles = surrounding_of::<TilePosition>();
        assert_eq!(walks.len(), 8);
        assert_eq!(tiles.len(), 8);
        for (i, w) in walks.iter().enumerate() {
            assert!(!walks[i + 1..].contains(w));
            assert_ne!(*w, WalkPosition::new(0, 0));
        }
    }
}
