//! Dihedral symmetries of the 3x3 grid
//!
//! Each symmetry is a permutation of local indices `row * 3 + col`. Applied
//! at every level of the tree it maps a board onto an equivalent board, so a
//! search on the transformed position yields an equally good move once the
//! move is mapped back.
//!
//! # Example
//!
//! ```
//! use fractal::symmetry::Symmetry;
//!
//! let path = vec![0, 4, 7];
//! let rotated = Symmetry::Rot90.transform_path(&path);
//! assert_eq!(rotated, vec![2, 4, 3]);
//! assert_eq!(Symmetry::Rot90.inverse_path(&rotated), path);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::adapter::TreeNode;

/// Forward index maps, in `Symmetry::ALL` order
const MAPS: [[u8; 9]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8],
    [2, 5, 8, 1, 4, 7, 0, 3, 6],
    [8, 7, 6, 5, 4, 3, 2, 1, 0],
    [6, 3, 0, 7, 4, 1, 8, 5, 2],
    [2, 1, 0, 5, 4, 3, 8, 7, 6],
    [6, 7, 8, 3, 4, 5, 0, 1, 2],
    [0, 3, 6, 1, 4, 7, 2, 5, 8],
    [8, 5, 2, 7, 4, 1, 6, 3, 0],
];

const INVERSES: [[u8; 9]; 8] = invert_all(MAPS);

const fn invert_all(maps: [[u8; 9]; 8]) -> [[u8; 9]; 8] {
    let mut out = [[0u8; 9]; 8];
    let mut s = 0;
    while s < 8 {
        let mut i = 0;
        while i < 9 {
            out[s][maps[s][i] as usize] = i as u8;
            i += 1;
        }
        s += 1;
    }
    out
}

/// One of the eight symmetries of the square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Symmetry {
    Identity,
    /// Quarter turn clockwise
    Rot90,
    Rot180,
    Rot270,
    /// Mirror across the vertical axis
    FlipHorizontal,
    /// Mirror across the horizontal axis
    FlipVertical,
    /// Mirror across the main diagonal
    Transpose,
    /// Mirror across the anti-diagonal
    AntiTranspose,
}

impl Symmetry {
    pub const ALL: [Symmetry; 8] = [
        Symmetry::Identity,
        Symmetry::Rot90,
        Symmetry::Rot180,
        Symmetry::Rot270,
        Symmetry::FlipHorizontal,
        Symmetry::FlipVertical,
        Symmetry::Transpose,
        Symmetry::AntiTranspose,
    ];

    /// Pick a symmetry uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Symmetry {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }

    /// Forward index map
    #[inline]
    pub fn map(self) -> &'static [u8; 9] {
        &MAPS[self.slot()]
    }

    /// Inverse index map
    #[inline]
    pub fn inverse_map(self) -> &'static [u8; 9] {
        &INVERSES[self.slot()]
    }

    /// Map one local digit
    #[inline]
    pub fn apply_digit(self, digit: u8) -> u8 {
        self.map()[digit as usize]
    }

    /// Map every digit of a root-first path
    pub fn transform_path(self, path: &[u8]) -> Vec<u8> {
        path.iter().map(|&d| self.apply_digit(d)).collect()
    }

    /// Undo `transform_path`
    pub fn inverse_path(self, path: &[u8]) -> Vec<u8> {
        let inv = self.inverse_map();
        path.iter().map(|&d| inv[d as usize]).collect()
    }

    /// Build a transformed copy of `tree`.
    ///
    /// The child at local index `i` moves to `map[i]`, at every level.
    /// Malformed nodes (not exactly nine children) are copied unchanged so
    /// that the adapter reports them.
    pub fn transform_tree(self, tree: &TreeNode) -> TreeNode {
        if self == Symmetry::Identity || tree.children.len() != 9 {
            return tree.clone();
        }
        let map = self.map();
        let mut children = vec![TreeNode::default(); 9];
        for (i, child) in tree.children.iter().enumerate() {
            children[map[i] as usize] = self.transform_tree(child);
        }
        TreeNode {
            value: tree.value,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Mark;
    use crate::board::Player;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_maps_are_permutations() {
        for s in Symmetry::ALL {
            let mut seen = [false; 9];
            for &d in s.map() {
                assert!(!seen[d as usize], "{:?} repeats {}", s, d);
                seen[d as usize] = true;
            }
            // the centre is fixed by every symmetry
            assert_eq!(s.apply_digit(4), 4);
        }
    }

    #[test]
    fn test_inverse_round_trip_all_paths() {
        for s in Symmetry::ALL {
            for len in 0..=4usize {
                for seed in 0..50u32 {
                    let path: Vec<u8> = (0..len).map(|i| ((seed * 7 + i as u32 * 5) % 9) as u8).collect();
                    assert_eq!(s.inverse_path(&s.transform_path(&path)), path, "{:?}", s);
                    assert_eq!(s.transform_path(&s.inverse_path(&path)), path, "{:?}", s);
                }
            }
        }
    }

    #[test]
    fn test_rotation_inverses() {
        assert_eq!(Symmetry::Rot90.inverse_map(), Symmetry::Rot270.map());
        assert_eq!(Symmetry::Rot180.inverse_map(), Symmetry::Rot180.map());
        for s in [Symmetry::FlipHorizontal, Symmetry::FlipVertical, Symmetry::Transpose, Symmetry::AntiTranspose] {
            assert_eq!(s.inverse_map(), s.map());
        }
    }

    #[test]
    fn test_transform_tree_matches_path_transform() {
        let mut tree = TreeNode::empty(2);
        tree.play(&[0, 1], Player::X).unwrap();
        tree.play(&[3, 8], Player::O).unwrap();
        tree.play(&[4, 4], Player::X).unwrap();

        for s in Symmetry::ALL {
            let moved = s.transform_tree(&tree);
            for path in [[0u8, 1], [3, 8], [4, 4], [7, 2]] {
                let orig = tree.node(&path).unwrap().value;
                let mapped = moved.node(&s.transform_path(&path)).unwrap().value;
                assert_eq!(orig, mapped, "{:?} at {:?}", s, path);
            }
        }
    }

    #[test]
    fn test_transform_preserves_status() {
        let mut tree = TreeNode::empty(2);
        for p in [[0u8, 0], [0, 4], [0, 8]] {
            tree.play(&p, Player::O).unwrap();
        }
        for s in Symmetry::ALL {
            let moved = s.transform_tree(&tree);
            let corner = s.apply_digit(0);
            assert_eq!(moved.children[corner as usize].status(), Mark::O, "{:?}", s);
        }
    }

    #[test]
    fn test_random_covers_group() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(Symmetry::random(&mut rng));
        }
        assert_eq!(seen.len(), 8);
    }
}
