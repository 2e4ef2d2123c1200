//! Spatial-key abstraction.
//!
//! A spatial key identifies one leaf of a hierarchical tree along a
//! space-filling curve. The engine never interprets keys: collaborators
//! supply a type implementing [`SpatialKey`], and every internal component
//! erases it to the canonical byte encoding plus an integer level.

/// An opaque, totally ordered key identifying a leaf in a hierarchical
/// spatial tree.
///
/// Level 0 is the root; the level increases with refinement. Equality is
/// bitwise identity of the canonical encoding, so hashing key bytes is
/// deterministic across peers regardless of which partition produced them.
pub trait SpatialKey: Clone + Eq + Ord + std::hash::Hash + Send + Sync + 'static {
    /// Refinement level of the leaf this key addresses (0 = root).
    fn level(&self) -> u8;

    /// Key of the parent node, or `None` at the root.
    fn parent(&self) -> Option<Self>;

    /// Key of the `i`-th child, or `None` if the child index is out of range
    /// for the tree's branching factor.
    fn child(&self, i: u8) -> Option<Self>;

    /// Canonical byte encoding of this key.
    ///
    /// Two keys compare equal if and only if their canonical encodings are
    /// bit-identical. The encoding must be stable across processes and
    /// architectures.
    fn canonical_bytes(&self) -> Vec<u8>;
}

/// Erase typed keys to their canonical byte encodings, the form every
/// internal component and wire message works with.
pub fn canonicalize_keys<K: SpatialKey>(keys: &[K]) -> Vec<Vec<u8>> {
    keys.iter().map(SpatialKey::canonical_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fixed-depth octree key: one byte of level followed by the child
    /// index path from the root.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    struct PathKey {
        path: Vec<u8>,
    }

    impl SpatialKey for PathKey {
        fn level(&self) -> u8 {
            self.path.len() as u8
        }

        fn parent(&self) -> Option<Self> {
            if self.path.is_empty() {
                return None;
            }
            Some(Self {
                path: self.path[..self.path.len() - 1].to_vec(),
            })
        }

        fn child(&self, i: u8) -> Option<Self> {
            if i >= 8 {
                return None;
            }
            let mut path = self.path.clone();
            path.push(i);
            Some(Self { path })
        }

        fn canonical_bytes(&self) -> Vec<u8> {
            let mut bytes = Vec::with_capacity(self.path.len() + 1);
            bytes.push(self.path.len() as u8);
            bytes.extend_from_slice(&self.path);
            bytes
        }
    }

    #[test]
    fn parent_child_navigation_round_trips() {
        let root = PathKey { path: vec![] };
        assert_eq!(root.level(), 0);
        assert!(root.parent().is_none());

        let child = root.child(3).unwrap();
        assert_eq!(child.level(), 1);
        assert_eq!(child.parent().unwrap(), root);
        assert!(root.child(8).is_none());
    }

    #[test]
    fn canonical_bytes_are_bitwise_identity() {
        let a = PathKey { path: vec![1, 2, 3] };
        let b = PathKey { path: vec![1, 2, 3] };
        let c = PathKey { path: vec![1, 2, 4] };
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
        assert_ne!(a.canonical_bytes(), c.canonical_bytes());
    }

    #[test]
    fn canonicalize_preserves_order_and_encoding() {
        let keys = vec![
            PathKey { path: vec![3] },
            PathKey { path: vec![1, 2] },
        ];
        let erased = canonicalize_keys(&keys);
        assert_eq!(erased, vec![vec![1, 3], vec![2, 1, 2]]);
    }
}
