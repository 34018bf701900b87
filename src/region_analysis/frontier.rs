use std::collections::BTreeMap;

use crate::position::WalkPosition;
use super::structs::AreaId;

/// The minitiles where two areas met while growing.
///
/// Positions are kept in the order they were settled, which is by
/// descending altitude: the first one is the narrowest point of the
/// passage, the last ones are its ends.
#[derive(Clone, Debug, Default)]
pub struct Frontier {
    positions: Vec<WalkPosition>,
}

impl Frontier {
    #[inline]
    fn add(&mut self, w: WalkPosition) {
        self.positions.push(w);
    }

    /// The number of minitiles that comprise this frontier
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Generates an iterator over the minitiles of this frontier, highest first
    #[inline]
    pub fn positions(&self) -> impl Iterator<Item = WalkPosition> + '_ {
        self.positions.iter().copied()
    }
}

/// Frontiers of every pair of adjacent areas.
///
/// Keys are ordered so that `(a, b)` and `(b, a)` address the same frontier.
#[derive(Debug, Default, Clone)]
pub struct Frontiers(BTreeMap<(AreaId, AreaId), Frontier>);

impl Frontiers {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[inline]
    fn key(a: AreaId, b: AreaId) -> (AreaId, AreaId) {
        if a < b { (a, b) } else { (b, a) }
    }

    /// Records `w` on the frontier between `a` and `b`. Positions between an
    /// area and itself are dropped.
    pub fn add(&mut self, a: AreaId, b: AreaId, w: WalkPosition) {
        if a == b {
            return;
        }
        self.0.entry(Self::key(a, b)).or_default().add(w);
    }

    pub fn get(&self, a: AreaId, b: AreaId) -> Option<&Frontier> {
        self.0.get(&Self::key(a, b))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over frontiers, along with the ids of the areas they separate
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (AreaId, AreaId, &Frontier)> {
        self.0.iter().map(|((a, b), frontier)| (*a, *b, frontier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_is_shared_by_both_orders() {
        let mut frontiers = Frontiers::new();
        frontiers.add(AreaId(2), AreaId(1), WalkPosition::new(3, 3));
        frontiers.add(AreaId(1), AreaId(2), WalkPosition::new(3, 4));

        assert_eq!(frontiers.len(), 1);
        let forward: Vec<_> = frontiers.get(AreaId(1), AreaId(2)).unwrap().positions().collect();
        let backward: Vec<_> = frontiers.get(AreaId(2), AreaId(1)).unwrap().positions().collect();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec![WalkPosition::new(3, 3), WalkPosition::new(3, 4)]);
    }

    #[test]
    fn self_frontier_is_ignored() {
        let mut frontiers = Frontiers::new();
        frontiers.add(AreaId(4), AreaId(4), WalkPosition::new(0, 0));
        assert!(frontiers.is_empty());
    }
}
