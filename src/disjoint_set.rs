/// Union-find over dense `u32` labels.
///
/// Unlike a ranked union, `attach` always makes the second root the
/// representative, so callers control which label survives a merge.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parents: Vec<u32>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self { parents: Vec::new() }
    }

    pub fn with_len(len: usize) -> Self {
        Self { parents: (0..len as u32).collect() }
    }

    /// Adds a new singleton and returns its label.
    pub fn push(&mut self) -> u32 {
        let label = self.parents.len() as u32;
        self.parents.push(label);
        label
    }

    pub fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parents[root as usize] != root {
            root = self.parents[root as usize];
        }

        // Path compression
        let mut cur = label;
        while self.parents[cur as usize] != root {
            let next = self.parents[cur as usize];
            self.parents[cur as usize] = root;
            cur = next;
        }

        root
    }

    /// Merges the set of `child` into the set of `parent`. Returns the
    /// surviving root.
    pub fn attach(&mut self, child: u32, parent: u32) -> u32 {
        let child_root = self.find(child);
        let parent_root = self.find(parent);
        if child_root != parent_root {
            self.parents[child_root as usize] = parent_root;
        }
        parent_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_keeps_parent_root() {
        let mut set = DisjointSet::with_len(4);
        assert_eq!(set.attach(0, 1), 1);
        assert_eq!(set.attach(1, 3), 3);
        assert_eq!(set.find(0), 3);
        assert_eq!(set.find(2), 2);
    }

    #[test]
    fn pushed_labels_start_alone() {
        let mut set = DisjointSet::new();
        let a = set.push();
        let b = set.push();
        assert_eq!((a, b), (0, 1));
        assert_eq!(set.find(a), a);
        assert_eq!(set.attach(a, b), b);
        assert_eq!(set.find(a), b);
    }
}
