//! Packed board with incrementally maintained group keys and hash

use crate::error::{EngineError, EngineResult};
use crate::search::zobrist::ZOBRIST;

use super::lookup::{LookupTables, TABLES};
use super::{Constraint, Player, EMPTY, MAX_DEPTH, MIN_DEPTH, PLAYING, POW9};

/// Evaluation is clamped to this magnitude, well below terminal scores
pub const EVAL_LIMIT: i32 = 90_000;

/// Bonus for the side to move when it may play anywhere
pub const FREE_PLAY_BONUS: i32 = 15;

/// Per-level evaluation weights, root first
const LEVEL_WEIGHTS: [i32; MAX_DEPTH] = [1000, 100, 10, 1];

/// Game board for one search session.
///
/// `keys[layer][i]` packs the 2-bit status of the nine children of node `i`
/// at that layer. The deepest keyed layer (`depth - 1`) indexes the leaves
/// directly.
#[derive(Debug, Clone)]
pub struct Board {
    depth: usize,
    leaves: Vec<u8>,
    keys: Vec<Vec<u32>>,
    hash: u64,
    constraint: Option<Constraint>,
}

impl Board {
    /// Create an empty board with `depth` nested levels.
    pub fn new(depth: usize) -> EngineResult<Self> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(EngineError::UnsupportedDepth(depth));
        }
        Ok(Self {
            depth,
            leaves: vec![EMPTY; POW9[depth]],
            keys: (0..depth).map(|layer| vec![0u32; POW9[layer]]).collect(),
            hash: 0,
            constraint: None,
        })
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn leaf(&self, idx: usize) -> u8 {
        self.leaves[idx]
    }

    #[inline]
    pub fn leaves(&self) -> &[u8] {
        &self.leaves
    }

    #[inline]
    pub fn key(&self, layer: usize, idx: usize) -> u32 {
        self.keys[layer][idx]
    }

    #[inline]
    pub fn keys(&self, layer: usize) -> &[u32] {
        &self.keys[layer]
    }

    /// Zobrist hash over leaf contents only
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn constraint(&self) -> Option<Constraint> {
        self.constraint
    }

    #[inline]
    pub fn set_constraint(&mut self, constraint: Option<Constraint>) {
        self.constraint = constraint;
    }

    /// Count empty leaves
    pub fn empty_count(&self) -> usize {
        self.leaves.iter().filter(|&&c| c == EMPTY).count()
    }

    /// Status of the whole game
    #[inline]
    pub fn root_status(&self) -> u8 {
        TABLES.status(self.keys[0][0])
    }

    /// Status of node `idx` at `layer`, as recorded in its parent's key.
    ///
    /// Reading through the parent picks up statuses forced in by the adapter.
    #[inline]
    pub fn node_status(&self, layer: usize, idx: usize) -> u8 {
        if layer == 0 {
            self.root_status()
        } else {
            LookupTables::field(self.keys[layer - 1][idx / 9], idx % 9)
        }
    }

    /// True when the node and all of its ancestors are still being played.
    pub fn is_open(&self, constraint: Constraint) -> bool {
        let mut idx = constraint.index;
        for layer in (0..=constraint.layer).rev() {
            if self.node_status(layer, idx) != PLAYING {
                return false;
            }
            idx /= 9;
        }
        true
    }

    /// Write a leaf and propagate status changes toward the root.
    ///
    /// Returns the shallowest layer whose node changed its derived status,
    /// or `None` when no group was resolved or reopened by this write.
    pub fn set_cell(&mut self, idx: usize, val: u8) -> Option<usize> {
        let old = self.leaves[idx];
        if old == val {
            return None;
        }

        if old != EMPTY {
            self.hash ^= ZOBRIST.leaf(idx, old);
        }
        if val != EMPTY {
            self.hash ^= ZOBRIST.leaf(idx, val);
        }
        self.leaves[idx] = val;

        self.propagate(self.depth, idx, val)
    }

    /// Force a node's recorded status, bypassing line detection.
    ///
    /// Used for rulings made outside the packed board (e.g. early draws).
    /// The change keeps propagating upward like a regular write.
    pub fn force_status(&mut self, layer: usize, idx: usize, status: u8) -> Option<usize> {
        debug_assert!(layer > 0, "the root has no parent to record its status");
        self.propagate(layer, idx, status)
    }

    /// Push `status` of the entity at tree depth `level` (leaves sit at
    /// `self.depth`) into its parent and continue while statuses change.
    fn propagate(&mut self, level: usize, idx: usize, status: u8) -> Option<usize> {
        let mut child = idx;
        let mut child_status = status;
        let mut changed = None;

        for layer in (0..level).rev() {
            let parent = child / 9;
            let offset = child % 9;
            let old_key = self.keys[layer][parent];

            if LookupTables::field(old_key, offset) == child_status {
                break;
            }

            let new_key = LookupTables::splice(old_key, offset, child_status);
            self.keys[layer][parent] = new_key;

            let new_status = TABLES.status(new_key);
            if TABLES.status(old_key) == new_status {
                break;
            }

            changed = Some(layer);
            child = parent;
            child_status = new_status;
        }

        changed
    }

    /// Constraint for the opponent after playing `mv`.
    ///
    /// `changed` is the value `set_cell` returned for the move. The entity
    /// that decides the target is the leaf itself, or the shallowest node the
    /// move resolved. For an entity at tree depth `k` with index `r`, the
    /// opponent is sent to the layer `k - 1` node that keeps the first
    /// `k - 2` path digits of `r` and ends with `r`'s own last digit. Depth
    /// `k <= 1` means free play.
    pub fn next_constraint(&self, mv: usize, changed: Option<usize>) -> Option<Constraint> {
        let (k, r) = match changed {
            None => (self.depth, mv),
            Some(layer) => (layer, mv / POW9[self.depth - layer]),
        };
        if k <= 1 {
            return None;
        }
        Some(Constraint::new(k - 1, (r / 81) * 9 + r % 9))
    }

    /// Static evaluation from `player`'s point of view.
    pub fn evaluate(&self, player: Player) -> i32 {
        let mut total = 0i32;
        for (layer, keys) in self.keys.iter().enumerate() {
            let weight = LEVEL_WEIGHTS[layer].max(1);
            let sum: i32 = keys.iter().map(|&k| TABLES.score(k)).sum();
            total = total.saturating_add(sum.saturating_mul(weight));
        }
        let total = total.clamp(-EVAL_LIMIT, EVAL_LIMIT);

        let mut score = match player {
            Player::X => total,
            Player::O => -total,
        };
        if self.constraint.is_none() {
            score += FREE_PLAY_BONUS;
        }
        score
    }
}
