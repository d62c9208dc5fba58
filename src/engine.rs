//! Main AI Engine orchestrating one search request
//!
//! Each request goes through the same pipeline:
//!
//! 1. **Symmetry**: pick one of the eight square symmetries at random and
//!    transform the tree and constraint path with it
//! 2. **Adapter**: pack the transformed tree into a [`Board`]
//! 3. **Search**: iterative-deepening alpha-beta on the packed board
//! 4. **Map back**: turn the best leaf index into a path and undo the symmetry
//! 5. **Validate**: check the candidate against the original tree
//! 6. **Fallback**: on a validation failure, clear the table and search the
//!    untransformed board with half of the remaining time
//!
//! # Example
//!
//! ```
//! use fractal::adapter::TreeNode;
//! use fractal::board::Player;
//! use fractal::config::SearchConfig;
//! use fractal::engine::{AIEngine, SearchRequest};
//!
//! let mut board = TreeNode::empty(2);
//! board.play(&[4, 4], Player::X).unwrap();
//!
//! let mut engine = AIEngine::new();
//! let request = SearchRequest {
//!     board,
//!     player: Player::O,
//!     constraint: vec![4],
//!     config: SearchConfig { max_time_ms: 300, max_search_depth: 4, board_depth: 2 },
//! };
//! let result = engine.think(&request);
//! assert_eq!(result.best_move[0], 4);
//! ```

use std::time::Instant;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::adapter::{constraint_from_path, flat_index_to_path, is_legal_path, to_packed, Mark, TreeNode};
use crate::board::{Board, Player, X};
use crate::config::{EngineConfig, SearchConfig};
use crate::error::{EngineError, EngineResult};
use crate::search::{SearchLimits, SearchResult, Searcher, TTStats, WIN_SCORE};
use crate::symmetry::Symmetry;

/// Search depth cap used by the benchmark
const BENCHMARK_MAX_DEPTH: u8 = 64;

/// One search request in tree form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub board: TreeNode,
    pub player: Player,
    /// Root-first path of the sub-board the mover is restricted to (empty
    /// for free play)
    #[serde(default)]
    pub constraint: Vec<u8>,
    #[serde(default)]
    pub config: SearchConfig,
}

/// How the returned move was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Search on the symmetry-transformed board, validated
    Transformed,
    /// Untransformed rerun after a validation failure
    Fallback,
    /// No move: the game is over, or the request could not be served
    NoMove,
}

/// Result of a move search with detailed statistics.
#[derive(Debug, Clone)]
pub struct MoveResult {
    /// Root-first path of the chosen leaf (empty when there is none)
    pub best_move: Vec<u8>,
    /// Score from the mover's point of view
    pub score: i32,
    /// Deepest completed iteration
    pub depth: u8,
    /// Number of nodes searched over all attempts
    pub nodes: u64,
    pub search_type: SearchType,
    /// Symmetry the first attempt searched under
    pub symmetry: Symmetry,
    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl MoveResult {
    /// Create a result for a transformed search
    #[inline]
    fn transformed(path: Vec<u8>, result: &SearchResult, symmetry: Symmetry, time_ms: u64) -> Self {
        Self {
            best_move: path,
            score: result.score,
            depth: result.depth,
            nodes: result.nodes,
            search_type: SearchType::Transformed,
            symmetry,
            time_ms,
        }
    }

    /// Create a result for the untransformed rerun
    #[inline]
    fn fallback(path: Vec<u8>, result: &SearchResult, nodes: u64, symmetry: Symmetry, time_ms: u64) -> Self {
        Self {
            best_move: path,
            score: result.score,
            depth: result.depth,
            nodes,
            search_type: SearchType::Fallback,
            symmetry,
            time_ms,
        }
    }

    /// Create a result carrying no move
    #[inline]
    fn no_move(score: i32, depth: u8, nodes: u64, symmetry: Symmetry, time_ms: u64) -> Self {
        Self {
            best_move: Vec::new(),
            score,
            depth,
            nodes,
            search_type: SearchType::NoMove,
            symmetry,
            time_ms,
        }
    }
}

/// Benchmark summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub nodes_visited: u64,
    pub nodes_per_second: u64,
    pub elapsed_ms: u64,
    pub depth_reached: u8,
}

/// Main AI Engine.
///
/// Owns one searcher (and therefore one transposition table). An engine is
/// used from a single thread at a time; run several engines for concurrent
/// searches.
pub struct AIEngine {
    searcher: Searcher,
    rng: StdRng,
    config: EngineConfig,
}

impl AIEngine {
    /// Create a new AI engine with default settings.
    ///
    /// Default configuration:
    /// - 16 MB transposition table
    /// - Random symmetry per request
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an AI engine with custom configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use fractal::config::EngineConfig;
    /// use fractal::engine::AIEngine;
    ///
    /// let engine = AIEngine::with_config(EngineConfig { tt_size_mb: 4, ..Default::default() });
    /// assert!(engine.tt_stats().size > 0);
    /// ```
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            searcher: Searcher::new(config.tt_size_mb),
            rng: StdRng::from_os_rng(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Enable or disable the random symmetry step
    pub fn set_randomize_symmetry(&mut self, enabled: bool) {
        self.config.randomize_symmetry = enabled;
    }

    /// Reseed the symmetry picker, for reproducible runs
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Clear the transposition table (new game)
    pub fn clear_cache(&mut self) {
        self.searcher.clear_tt();
    }

    /// Get statistics about the transposition table.
    #[must_use]
    pub fn tt_stats(&self) -> TTStats {
        self.searcher.tt_stats()
    }

    /// Serve one request. Never fails: any error becomes an empty move with
    /// score 0.
    pub fn think(&mut self, request: &SearchRequest) -> MoveResult {
        let start = Instant::now();
        let symmetry = if self.config.randomize_symmetry {
            Symmetry::random(&mut self.rng)
        } else {
            Symmetry::Identity
        };

        match self.try_think(request, symmetry, start) {
            Ok(result) => {
                info!(
                    "{:?} move {:?} score {} depth {} nodes {} in {}ms ({:?})",
                    request.player,
                    result.best_move,
                    result.score,
                    result.depth,
                    result.nodes,
                    result.time_ms,
                    result.search_type
                );
                result
            }
            Err(e) => {
                error!("search request failed: {}", e);
                MoveResult::no_move(0, 0, 0, symmetry, elapsed_ms(start))
            }
        }
    }

    fn try_think(&mut self, request: &SearchRequest, symmetry: Symmetry, start: Instant) -> EngineResult<MoveResult> {
        let config = &request.config;
        let depth = config.board_depth;

        // digits are checked before the symmetry maps them
        constraint_from_path(&request.constraint, depth)?;

        // a status recorded on the root by the caller ends the game, even
        // when it cannot be derived from the lines on the board
        if request.board.value != Mark::Empty {
            let score = recorded_result(request.board.value, request.player);
            return Ok(MoveResult::no_move(score, 0, 0, symmetry, elapsed_ms(start)));
        }

        let tree = symmetry.transform_tree(&request.board);
        let constraint = symmetry.transform_path(&request.constraint);
        let mut board = to_packed(&tree, depth, &constraint)?;

        let limits = SearchLimits::new(config.max_search_depth, config.max_time_ms);
        let result = self.searcher.search(&mut board, request.player, &limits);
        debug!(
            "symmetry {:?}: cutoffs {} first-move {:.1}% tt hits {:.1}%",
            symmetry,
            result.stats.beta_cutoffs,
            result.stats.first_move_rate(),
            result.stats.tt_score_rate()
        );

        let Some(mv) = result.best_move else {
            return Ok(MoveResult::no_move(result.score, result.depth, result.nodes, symmetry, elapsed_ms(start)));
        };

        let path = symmetry.inverse_path(&flat_index_to_path(mv, depth));
        if is_legal_path(&request.board, &request.constraint, &path, depth) {
            return Ok(MoveResult::transformed(path, &result, symmetry, elapsed_ms(start)));
        }

        warn!("move {:?} under {:?} failed validation, searching untransformed board", path, symmetry);
        self.fallback(request, symmetry, result.nodes, start)
    }

    /// Rerun on the untransformed board with half of the remaining budget.
    fn fallback(&mut self, request: &SearchRequest, symmetry: Symmetry, nodes_so_far: u64, start: Instant) -> EngineResult<MoveResult> {
        // entries were keyed under a different orientation
        self.searcher.clear_tt();

        let config = &request.config;
        let depth = config.board_depth;
        let remaining = config.max_time_ms.saturating_sub(elapsed_ms(start));
        let mut board = to_packed(&request.board, depth, &request.constraint)?;

        let limits = SearchLimits::new(config.max_search_depth, remaining / 2);
        let result = self.searcher.search(&mut board, request.player, &limits);
        let nodes = nodes_so_far + result.nodes;

        let Some(mv) = result.best_move else {
            return Ok(MoveResult::no_move(result.score, result.depth, nodes, symmetry, elapsed_ms(start)));
        };
        let path = flat_index_to_path(mv, depth);
        if !is_legal_path(&request.board, &request.constraint, &path, depth) {
            return Err(EngineError::InvalidMove(path));
        }
        Ok(MoveResult::fallback(path, &result, nodes, symmetry, elapsed_ms(start)))
    }
}

impl Default for AIEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Score of a finished game recorded by the caller, from `player`'s side
fn recorded_result(value: Mark, player: Player) -> i32 {
    match (value, player) {
        (Mark::X, Player::X) | (Mark::O, Player::O) => WIN_SCORE,
        (Mark::X, Player::O) | (Mark::O, Player::X) => -WIN_SCORE,
        _ => 0,
    }
}

#[inline]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Time a search on an empty board after one random opening move by X.
///
/// # Example
///
/// ```
/// let report = fractal::engine::run_ai_benchmark(2, 100).unwrap();
/// assert!(report.nodes_visited > 0);
/// ```
pub fn run_ai_benchmark(board_depth: usize, time_ms: u64) -> EngineResult<BenchmarkReport> {
    let mut board = Board::new(board_depth)?;
    let mut rng = StdRng::from_os_rng();
    let opening = rng.random_range(0..board.leaf_count());
    let changed = board.set_cell(opening, X);
    board.set_constraint(board.next_constraint(opening, changed));

    let mut searcher = Searcher::new(EngineConfig::default().tt_size_mb);
    let start = Instant::now();
    let result = searcher.search(&mut board, Player::O, &SearchLimits::new(BENCHMARK_MAX_DEPTH, time_ms));
    let elapsed = start.elapsed();

    let secs = elapsed.as_secs_f64();
    let nodes_per_second = if secs > 0.0 { (result.nodes as f64 / secs) as u64 } else { result.nodes };
    info!(
        "benchmark depth {}: {} nodes in {:?} ({} nps), reached depth {}",
        board_depth, result.nodes, elapsed, nodes_per_second, result.depth
    );

    Ok(BenchmarkReport {
        nodes_visited: result.nodes,
        nodes_per_second,
        elapsed_ms: elapsed.as_millis() as u64,
        depth_reached: result.depth,
    })
}
