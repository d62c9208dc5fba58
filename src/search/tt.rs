//! Transposition Table for caching search results
//!
//! A fixed-size, power-of-two array indexed by the low bits of the position
//! key. There is no chaining: a colliding store either evicts the resident
//! entry or is dropped, depending on search depth.
//!
//! # Example
//!
//! ```
//! use fractal::search::{Bound, TranspositionTable};
//!
//! let mut tt = TranspositionTable::new(1); // 1 MB
//!
//! let hash = 0x1234_5678_9ABC_DEF0;
//! tt.store(hash, 5, 100, Bound::Exact, Some(40));
//!
//! if let Some(entry) = tt.probe(hash) {
//!     assert_eq!(entry.score, 100);
//!     assert_eq!(entry.best_move, Some(40));
//! }
//! ```

/// Score interpretation of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Exact score - the search completed inside the window
    Exact,
    /// Lower bound - score >= stored value (beta cutoff)
    Lower,
    /// Upper bound - score <= stored value (alpha fail-low)
    Upper,
}

/// Decoded transposition table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTEntry {
    /// Remaining search depth the score was computed with
    pub depth: u8,
    pub score: i32,
    pub bound: Bound,
    /// Best move found for this position
    pub best_move: Option<usize>,
}

/// One table slot.
///
/// `data` layout:
/// ```text
/// bits [0..15]   best move + 1 (0 = none)   16 bits
/// bits [16..23]  depth                        8 bits
/// bits [24..25]  bound (0 = empty slot)       2 bits
/// ```
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    key: u64,
    score: i32,
    data: u32,
}

fn pack(depth: u8, bound: Bound, best_move: Option<usize>) -> u32 {
    let mv = best_move.map_or(0, |m| {
        debug_assert!(m < 0xFFFF);
        m as u32 + 1
    });
    let b = match bound {
        Bound::Exact => 1u32,
        Bound::Lower => 2u32,
        Bound::Upper => 3u32,
    };
    mv | (u32::from(depth) << 16) | (b << 24)
}

fn unpack(data: u32) -> Option<(u8, Bound, Option<usize>)> {
    let bound = match (data >> 24) & 0x3 {
        0 => return None,
        1 => Bound::Exact,
        2 => Bound::Lower,
        _ => Bound::Upper,
    };
    let mv = data & 0xFFFF;
    let best_move = if mv == 0 { None } else { Some(mv as usize - 1) };
    Some((((data >> 16) & 0xFF) as u8, bound, best_move))
}

/// Transposition table owned by a single search engine.
pub struct TranspositionTable {
    slots: Vec<Slot>,
    mask: usize,
}

impl TranspositionTable {
    /// Create a table of roughly `size_mb` megabytes.
    ///
    /// The slot count is rounded down to a power of two, with a floor of
    /// 1024 slots.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let slot_size = std::mem::size_of::<Slot>();
        let wanted = ((size_mb * 1024 * 1024) / slot_size).max(1024);
        // largest power of two not above `wanted`
        let size = 1usize << (usize::BITS - 1 - wanted.leading_zeros());

        Self {
            slots: vec![Slot::default(); size],
            mask: size - 1,
        }
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Look up a position. Returns `None` on an empty slot or key mismatch.
    #[inline]
    #[must_use]
    pub fn probe(&self, hash: u64) -> Option<TTEntry> {
        let slot = &self.slots[(hash as usize) & self.mask];
        if slot.key != hash {
            return None;
        }
        let (depth, bound, best_move) = unpack(slot.data)?;
        Some(TTEntry {
            depth,
            score: slot.score,
            bound,
            best_move,
        })
    }

    /// Store a search result.
    ///
    /// Depth-preferred: an empty slot always accepts, an occupied slot only
    /// when the new depth is at least the resident one (ties go to the newer
    /// result).
    pub fn store(&mut self, hash: u64, depth: u8, score: i32, bound: Bound, best_move: Option<usize>) {
        let slot = &mut self.slots[(hash as usize) & self.mask];
        if let Some((resident_depth, _, _)) = unpack(slot.data) {
            if depth < resident_depth {
                return;
            }
        }
        *slot = Slot {
            key: hash,
            score,
            data: pack(depth, bound, best_move),
        };
    }

    /// Clear all entries.
    ///
    /// Called on a new game and whenever cached entries may have been
    /// computed for a differently oriented board.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::default());
    }

    /// Get statistics about table usage.
    #[must_use]
    pub fn stats(&self) -> TTStats {
        let used = self
            .slots
            .iter()
            .filter(|s| unpack(s.data).is_some())
            .count();
        TTStats {
            size: self.slots.len(),
            used,
            usage_percent: (used as f64 / self.slots.len() as f64 * 100.0) as u8,
        }
    }
}

/// Statistics about transposition table usage.
#[derive(Debug, Clone, Copy)]
pub struct TTStats {
    /// Total number of slots in the table
    pub size: usize,
    /// Number of slots currently occupied
    pub used: usize,
    /// Percentage of table in use (0-100)
    pub usage_percent: u8,
}
