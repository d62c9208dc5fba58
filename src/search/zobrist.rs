//! Zobrist hashing for position identification
//!
//! The board keeps an incrementally updated hash of its leaf contents. Side
//! to move and the active constraint are folded in only when the search
//! probes the transposition table.
//!
//! # Example
//!
//! ```
//! use fractal::board::{Board, Player, X};
//! use fractal::search::ZOBRIST;
//!
//! let mut board = Board::new(2).unwrap();
//! board.set_cell(40, X);
//! assert_eq!(board.hash(), ZOBRIST.leaf(40, X));
//!
//! // Same leaves, different side to move: different search key
//! let x_key = ZOBRIST.position(&board, Player::X);
//! let o_key = ZOBRIST.position(&board, Player::O);
//! assert_ne!(x_key, o_key);
//! ```

use once_cell::sync::Lazy;

use crate::board::{Board, Constraint, Player, MAX_LEAVES, O, X};

/// Number of constraint buckets; distinct constraints may share a bucket
pub const CONSTRAINT_BUCKETS: usize = 64;

/// Process-wide Zobrist constants, built on first use
pub static ZOBRIST: Lazy<ZobristTable> = Lazy::new(ZobristTable::new);

/// Zobrist hash constants.
///
/// One random value per (leaf, mark) pair, one for O to move, and one per
/// constraint bucket.
pub struct ZobristTable {
    x: Box<[u64]>,
    o: Box<[u64]>,
    o_to_move: u64,
    constraints: [u64; CONSTRAINT_BUCKETS],
}

impl ZobristTable {
    /// Create a new Zobrist table with deterministic random values.
    ///
    /// Uses a linear congruential generator with a fixed seed so hashes are
    /// reproducible across runs.
    #[must_use]
    pub fn new() -> Self {
        // Knuth's MMIX LCG
        let mut seed: u64 = 0x1234_5678_9ABC_DEF0;
        let mut next_rand = || {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            // high bits of an LCG are the well-mixed ones
            seed ^ (seed >> 29)
        };

        let mut x = vec![0u64; MAX_LEAVES].into_boxed_slice();
        let mut o = vec![0u64; MAX_LEAVES].into_boxed_slice();
        for i in 0..MAX_LEAVES {
            x[i] = next_rand();
            o[i] = next_rand();
        }

        let o_to_move = next_rand();
        let mut constraints = [0u64; CONSTRAINT_BUCKETS];
        for c in constraints.iter_mut() {
            *c = next_rand();
        }

        Self {
            x,
            o,
            o_to_move,
            constraints,
        }
    }

    /// Contribution of mark `val` at leaf `idx` (0 for an empty leaf)
    #[inline]
    pub fn leaf(&self, idx: usize, val: u8) -> u64 {
        match val {
            X => self.x[idx],
            O => self.o[idx],
            _ => 0,
        }
    }

    /// Side-to-move component
    #[inline]
    pub fn side(&self, player: Player) -> u64 {
        match player {
            Player::X => 0,
            Player::O => self.o_to_move,
        }
    }

    /// Constraint component, folded into a fixed number of buckets
    #[inline]
    pub fn constraint(&self, constraint: Option<Constraint>) -> u64 {
        self.constraints[Constraint::code(constraint) % CONSTRAINT_BUCKETS]
    }

    /// Search key: leaf hash, side to move and constraint combined
    #[inline]
    pub fn position(&self, board: &Board, player: Player) -> u64 {
        board.hash() ^ self.side(player) ^ self.constraint(board.constraint())
    }

    /// Recompute the leaf hash from scratch.
    ///
    /// Used to check the incremental hash; search never needs it.
    #[must_use]
    pub fn full_hash(&self, board: &Board) -> u64 {
        board
            .leaves()
            .iter()
            .enumerate()
            .fold(0u64, |h, (i, &v)| h ^ self.leaf(i, v))
    }
}

impl Default for ZobristTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::EMPTY;

    #[test]
    fn test_zobrist_deterministic() {
        let zt1 = ZobristTable::new();
        let zt2 = ZobristTable::new();
        assert_eq!(zt1.leaf(100, X), zt2.leaf(100, X));
        assert_eq!(zt1.o_to_move, zt2.o_to_move);
    }

    #[test]
    fn test_zobrist_empty_leaf_contributes_nothing() {
        assert_eq!(ZOBRIST.leaf(7, EMPTY), 0);
        assert_ne!(ZOBRIST.leaf(7, X), ZOBRIST.leaf(7, O));
    }

    #[test]
    fn test_zobrist_incremental_matches_full() {
        let mut board = Board::new(3).unwrap();
        for (i, &idx) in [0usize, 17, 300, 728, 81].iter().enumerate() {
            let val = if i % 2 == 0 { X } else { O };
            board.set_cell(idx, val);
            assert_eq!(board.hash(), ZOBRIST.full_hash(&board));
        }
        board.set_cell(17, X);
        assert_eq!(board.hash(), ZOBRIST.full_hash(&board));
        board.set_cell(300, EMPTY);
        assert_eq!(board.hash(), ZOBRIST.full_hash(&board));
    }

    #[test]
    fn test_zobrist_side_and_constraint_change_key() {
        let mut board = Board::new(2).unwrap();
        board.set_cell(0, X);
        let free = ZOBRIST.position(&board, Player::O);
        board.set_constraint(Some(Constraint::new(1, 0)));
        let constrained = ZOBRIST.position(&board, Player::O);
        assert_ne!(free, constrained);
        assert_ne!(constrained, ZOBRIST.position(&board, Player::X));
    }

    #[test]
    fn test_zobrist_constraint_buckets_wrap() {
        // codes 1 and 65 land in the same bucket
        let a = Some(Constraint::new(0, 0));
        let b = Some(Constraint::new(2, 65 - 11));
        assert_eq!(Constraint::code(b), 65);
        assert_eq!(ZOBRIST.constraint(a), ZOBRIST.constraint(b));
    }

    #[test]
    fn test_zobrist_values_distinct() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..MAX_LEAVES {
            assert!(seen.insert(ZOBRIST.leaf(i, X)));
            assert!(seen.insert(ZOBRIST.leaf(i, O)));
        }
    }
}
