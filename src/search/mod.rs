//! Search module for the fractal engine
//!
//! Contains:
//! - Zobrist hashing for position identification
//! - Transposition table for caching search results
//! - Legal move generation with dead-subtree skipping
//! - Alpha-Beta search with iterative deepening

pub mod alphabeta;
pub mod movegen;
pub mod tt;
pub mod zobrist;

pub use alphabeta::{is_decisive, SearchLimits, SearchResult, SearchStats, Searcher, WIN_SCORE};
pub use movegen::{generate_moves, legal_moves};
pub use tt::{Bound, TTEntry, TTStats, TranspositionTable};
pub use zobrist::{ZobristTable, ZOBRIST};
