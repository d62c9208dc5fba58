//! Packed board representation for fractal tic-tac-toe

pub mod board;
pub mod lookup;


use serde::{Deserialize, Serialize};

// Re-exports
pub use board::Board;
pub use lookup::{LookupTables, TABLES};

/// Supported board depths (number of nested 3x3 levels)
pub const MIN_DEPTH: usize = 2;
pub const MAX_DEPTH: usize = 4;

/// Leaf count of the deepest supported board (9^4)
pub const MAX_LEAVES: usize = 6561;

/// Cell / status values shared by leaves and 2-bit key fields
pub const EMPTY: u8 = 0;
pub const X: u8 = 1;
pub const O: u8 = 2;
pub const DRAW: u8 = 3;

/// Status of an unresolved node (same encoding as an empty cell)
pub const PLAYING: u8 = EMPTY;

/// 9^n for n in 0..=4
pub const POW9: [usize; 5] = [1, 9, 81, 729, 6561];

/// Player to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    X,
    O,
}

impl Player {
    /// Get opponent
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }

    /// Value written into a leaf for this player's mark
    #[inline]
    pub fn cell(self) -> u8 {
        match self {
            Player::X => X,
            Player::O => O,
        }
    }

    /// Player owning a won status, if any
    #[inline]
    pub fn from_status(status: u8) -> Option<Player> {
        match status {
            X => Some(Player::X),
            O => Some(Player::O),
            _ => None,
        }
    }
}

/// Sub-board the next mover is restricted to.
///
/// `layer` is the keyed level of the node (0 = root, `depth - 1` = leaf
/// parent) and `index` its position within `keys[layer]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub layer: usize,
    pub index: usize,
}

impl Constraint {
    #[inline]
    pub fn new(layer: usize, index: usize) -> Self {
        debug_assert!(layer < MAX_DEPTH && index < POW9[layer]);
        Self { layer, index }
    }

    /// Leaf index range covered by this node on a board of `depth` levels
    #[inline]
    pub fn leaf_range(self, depth: usize) -> std::ops::Range<usize> {
        let block = POW9[depth - self.layer];
        self.index * block..(self.index + 1) * block
    }

    /// Dense code used to bucket constraints for hashing (0 is reserved for
    /// free play)
    #[inline]
    pub fn code(constraint: Option<Constraint>) -> usize {
        match constraint {
            None => 0,
            Some(c) => 1 + POW9[..c.layer].iter().sum::<usize>() + c.index,
        }
    }
}
