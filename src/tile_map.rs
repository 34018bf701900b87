// Original under MIT license from: https://github.com/einargs/rust-screeps-code/blob/main/src/rooms/tile_slice.rs

use std::ops::{Index, IndexMut};

use crate::position::{TilePosition, WalkPosition};

/// A row-major grid of cells, addressed either by linear index or by a
/// coordinate of the grid's own resolution.
#[derive(Debug, Clone)]
pub struct TileMap<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T> TileMap<T> where T: Clone {
    #[inline]
    pub fn new(width: i32, height: i32, default: T) -> TileMap<T> {
        let len = (width.max(0) as usize) * (height.max(0) as usize);
        TileMap { width, height, cells: vec![default; len] }
    }
}

impl<T> TileMap<T> {
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    pub fn linear_index(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[inline]
    pub fn xy(&self, idx: usize) -> (i32, i32) {
        let w = self.width as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        if self.contains(x, y) {
            Some(&self.cells[self.linear_index(x, y)])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        if self.contains(x, y) {
            let idx = self.linear_index(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.cells.iter_mut()
    }
}

impl<T> Index<usize> for TileMap<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.cells[index]
    }
}

impl<T> IndexMut<usize> for TileMap<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.cells[index]
    }
}

impl<T> Index<WalkPosition> for TileMap<T> {
    type Output = T;
    fn index(&self, index: WalkPosition) -> &T {
        &self.cells[self.linear_index(index.x, index.y)]
    }
}

impl<T> IndexMut<WalkPosition> for TileMap<T> {
    fn index_mut(&mut self, index: WalkPosition) -> &mut T {
        let idx = self.linear_index(index.x, index.y);
        &mut self.cells[idx]
    }
}

impl<T> Index<TilePosition> for TileMap<T> {
    type Output = T;
    fn index(&self, index: TilePosition) -> &T {
        &self.cells[self.linear_index(index.x, index.y)]
    }
}

impl<T> IndexMut<TilePosition> for TileMap<T> {
    fn index_mut(&mut self, index: TilePosition) -> &mut T {
        let idx = self.linear_index(index.x, index.y);
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_index_round_trips_through_xy() {
        let map: TileMap<u8> = TileMap::new(5, 3, 0);
        assert_eq!(map.len(), 15);
        let idx = map.linear_index(4, 2);
        assert_eq!(idx, 14);
        assert_eq!(map.xy(idx), (4, 2));
    }

    #[test]
    fn out_of_bounds_get_is_none() {
        let mut map = TileMap::new(2, 2, 7u8);
        assert_eq!(map.get(1, 1), Some(&7));
        assert!(map.get(2, 0).is_none());
        assert!(map.get(0, -1).is_none());
        *map.get_mut(0, 1).unwrap() = 3;
        assert_eq!(map[WalkPosition::new(0, 1)], 3);
    }
}
