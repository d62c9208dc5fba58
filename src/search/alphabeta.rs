//! Alpha-Beta search with iterative deepening and transposition table
//!
//! Negamax with alpha-beta pruning over the packed board. Moves are applied
//! and undone in place with `Board::set_cell`; the search never clones the
//! board.
//!
//! # Features
//!
//! - Iterative deepening for time management and move ordering
//! - Transposition table keyed by leaf hash, side to move and constraint
//! - Cheap static move ordering with the table move tried first
//! - Voluntary deadline checks; depth 1 always completes
//!
//! # Example
//!
//! ```
//! use fractal::board::{Board, Player, X};
//! use fractal::search::{SearchLimits, Searcher};
//!
//! let mut searcher = Searcher::new(1);
//! let mut board = Board::new(2).unwrap();
//! board.set_cell(40, X);
//! board.set_constraint(board.next_constraint(40, None));
//!
//! let result = searcher.search(&mut board, Player::O, &SearchLimits::new(4, 500));
//! let mv = result.best_move.unwrap();
//! assert!((36..45).contains(&mv));
//! ```

use std::time::{Duration, Instant};

use log::debug;

use crate::board::{Board, LookupTables, Player, DRAW, EMPTY, PLAYING, TABLES};

use super::movegen::generate_moves;
use super::tt::{Bound, TTStats, TranspositionTable};
use super::zobrist::ZOBRIST;

/// Base score of a decided game
pub const WIN_SCORE: i32 = 100_000;

/// Infinity score for alpha-beta bounds
const INF: i32 = WIN_SCORE * 2;

/// Deadline is checked whenever `nodes & TIME_CHECK_MASK == 0`
const TIME_CHECK_MASK: u64 = (1 << 13) - 1;

/// Static move-ordering weights
struct OrderScore;

impl OrderScore {
    const BASE: u32 = 2000;
    const LOCAL_WIN: u32 = 1000;
    const STATUS_CHANGE: u32 = 100;
    const CENTER: u32 = 50;
    const CORNER: u32 = 20;
}

/// Leaf indices fit in 13 bits (9^4 = 6561 < 8192)
const MOVE_BITS: u32 = 13;

/// True if `score` reports a decided game
#[inline]
pub fn is_decisive(score: i32) -> bool {
    score.abs() >= WIN_SCORE
}

/// Depth and time bounds for one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: u8,
    pub time_limit: Duration,
}

impl SearchLimits {
    #[must_use]
    pub fn new(max_depth: u8, time_limit_ms: u64) -> Self {
        Self {
            max_depth,
            time_limit: Duration::from_millis(time_limit_ms),
        }
    }
}

/// Search statistics for diagnostics and tuning.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Total beta cutoffs (fail-high)
    pub beta_cutoffs: u64,
    /// Beta cutoffs on the first move tried (measures move ordering quality)
    pub first_move_cutoffs: u64,
    /// Total TT probes
    pub tt_probes: u64,
    /// TT probes that returned a usable score (exact/bound hit)
    pub tt_score_hits: u64,
    /// TT probes that provided a best move for ordering
    pub tt_move_hits: u64,
}

impl SearchStats {
    /// First-move cutoff rate in percent
    pub fn first_move_rate(&self) -> f64 {
        if self.beta_cutoffs == 0 {
            0.0
        } else {
            self.first_move_cutoffs as f64 / self.beta_cutoffs as f64 * 100.0
        }
    }

    /// TT score hit rate in percent
    pub fn tt_score_rate(&self) -> f64 {
        if self.tt_probes == 0 {
            0.0
        } else {
            self.tt_score_hits as f64 / self.tt_probes as f64 * 100.0
        }
    }
}

/// Search result containing the best move found and associated statistics.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Best move found (leaf index), if any
    pub best_move: Option<usize>,
    /// Score from the mover's point of view
    pub score: i32,
    /// Deepest fully completed iteration
    pub depth: u8,
    /// Total nodes searched, including aborted iterations
    pub nodes: u64,
    /// Search diagnostics
    pub stats: SearchStats,
}

/// Iterative-deepening searcher owning its transposition table.
pub struct Searcher {
    tt: TranspositionTable,
    nodes: u64,
    start: Instant,
    time_limit: Duration,
    aborted: bool,
    stats: SearchStats,
}

impl Searcher {
    /// Create a new searcher with a `tt_size_mb` megabyte table.
    #[must_use]
    pub fn new(tt_size_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(tt_size_mb),
            nodes: 0,
            start: Instant::now(),
            time_limit: Duration::ZERO,
            aborted: false,
            stats: SearchStats::default(),
        }
    }

    /// Search for the best move for `player` using iterative deepening.
    ///
    /// The board is mutated during the search and restored before return.
    pub fn search(&mut self, board: &mut Board, player: Player, limits: &SearchLimits) -> SearchResult {
        self.nodes = 0;
        self.start = Instant::now();
        self.time_limit = limits.time_limit;
        self.aborted = false;
        self.stats = SearchStats::default();

        let mut best = SearchResult::default();
        let max_depth = usize::from(limits.max_depth.max(1)).min(board.empty_count()).min(u8::MAX as usize) as u8;
        let mut prev_depth_time = Duration::ZERO;

        for depth in 1..=max_depth {
            let depth_start = Instant::now();
            let abortable = depth > 1;
            let (score, best_move) = self.search_root(board, player, depth, abortable);

            if self.aborted {
                debug!("depth {} aborted after {} nodes", depth, self.nodes);
                break;
            }

            best.score = score;
            best.best_move = best_move;
            best.depth = depth;

            let depth_time = depth_start.elapsed();
            let elapsed = self.start.elapsed();
            debug!(
                "depth {} score {} move {:?} nodes {} time {:?}",
                depth, score, best_move, self.nodes, elapsed
            );

            if best_move.is_none() || is_decisive(score) {
                break;
            }

            // Predict the next iteration from the observed branching factor
            let remaining = self.time_limit.saturating_sub(elapsed);
            let estimated_next = if !prev_depth_time.is_zero() && !depth_time.is_zero() {
                let bf = depth_time.as_secs_f64() / prev_depth_time.as_secs_f64();
                depth_time.mul_f64(bf.clamp(1.5, 8.0))
            } else {
                depth_time * 2
            };
            prev_depth_time = depth_time;

            if elapsed >= self.time_limit || estimated_next > remaining {
                break;
            }
        }

        best.nodes = self.nodes;
        best.stats = self.stats.clone();
        best
    }

    /// Get statistics about the transposition table.
    #[must_use]
    pub fn tt_stats(&self) -> TTStats {
        self.tt.stats()
    }

    /// Clear the transposition table.
    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    #[inline]
    fn out_of_time(&self) -> bool {
        self.start.elapsed() >= self.time_limit
    }

    /// Root search with a full window. Never cuts on a table hit so that a
    /// move is always produced.
    fn search_root(&mut self, board: &mut Board, player: Player, depth: u8, abortable: bool) -> (i32, Option<usize>) {
        self.nodes += 1;
        let hash = ZOBRIST.position(board, player);

        if let Some(score) = terminal_score(board, player, depth) {
            return (score, None);
        }

        let tt_move = self.tt.probe(hash).and_then(|e| e.best_move);
        let mut moves = Vec::with_capacity(81);
        generate_moves(board, &mut moves);
        if moves.is_empty() {
            return (board.evaluate(player), None);
        }
        order_moves(board, player, &mut moves, tt_move);

        let saved = board.constraint();
        let mut alpha = -INF;
        let beta = INF;
        let mut best_score = -INF;
        let mut best_move = None;

        for &mv in &moves {
            let changed = board.set_cell(mv, player.cell());
            board.set_constraint(board.next_constraint(mv, changed));
            let score = -self.alpha_beta(board, player.opponent(), depth - 1, -beta, -alpha, abortable);
            board.set_cell(mv, EMPTY);
            board.set_constraint(saved);

            if self.aborted {
                return (best_score, best_move);
            }

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            alpha = alpha.max(score);
        }

        self.tt.store(hash, depth, best_score, Bound::Exact, best_move);
        (best_score, best_move)
    }

    /// Recursive alpha-beta search with negamax formulation.
    fn alpha_beta(
        &mut self,
        board: &mut Board,
        player: Player,
        depth: u8,
        mut alpha: i32,
        mut beta: i32,
        abortable: bool,
    ) -> i32 {
        self.nodes += 1;

        if abortable && self.nodes & TIME_CHECK_MASK == 0 && self.out_of_time() {
            self.aborted = true;
        }
        if self.aborted {
            return 0;
        }

        let hash = ZOBRIST.position(board, player);
        let alpha_orig = alpha;

        self.stats.tt_probes += 1;
        let mut tt_move = None;
        if let Some(entry) = self.tt.probe(hash) {
            tt_move = entry.best_move;
            if tt_move.is_some() {
                self.stats.tt_move_hits += 1;
            }
            if entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => {
                        self.stats.tt_score_hits += 1;
                        return entry.score;
                    }
                    Bound::Lower => alpha = alpha.max(entry.score),
                    Bound::Upper => beta = beta.min(entry.score),
                }
                if alpha >= beta {
                    self.stats.tt_score_hits += 1;
                    return entry.score;
                }
            }
        }

        if let Some(score) = terminal_score(board, player, depth) {
            return score;
        }
        if depth == 0 {
            return board.evaluate(player);
        }

        let mut moves = Vec::with_capacity(81);
        generate_moves(board, &mut moves);
        if moves.is_empty() {
            return board.evaluate(player);
        }
        order_moves(board, player, &mut moves, tt_move);

        let saved = board.constraint();
        let mut best_score = -INF;
        let mut best_move = None;

        for (i, &mv) in moves.iter().enumerate() {
            let changed = board.set_cell(mv, player.cell());
            board.set_constraint(board.next_constraint(mv, changed));
            let score = -self.alpha_beta(board, player.opponent(), depth - 1, -beta, -alpha, abortable);
            board.set_cell(mv, EMPTY);
            board.set_constraint(saved);

            if self.aborted {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                self.stats.beta_cutoffs += 1;
                if i == 0 {
                    self.stats.first_move_cutoffs += 1;
                }
                break;
            }
        }

        let bound = if best_score <= alpha_orig {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(hash, depth, best_score, bound, best_move);

        best_score
    }
}

/// Score of a finished game from `player`'s point of view, if finished.
///
/// Wins found with more depth remaining are nearer and score higher.
#[inline]
fn terminal_score(board: &Board, player: Player, depth: u8) -> Option<i32> {
    match board.root_status() {
        PLAYING => None,
        DRAW => Some(0),
        status => {
            let score = WIN_SCORE + i32::from(depth);
            if Player::from_status(status) == Some(player) {
                Some(score)
            } else {
                Some(-score)
            }
        }
    }
}

/// Sort moves best-first by a packed static score; the table move goes first.
fn order_moves(board: &Board, player: Player, moves: &mut [usize], tt_move: Option<usize>) {
    let leaf_parent = board.depth() - 1;
    let mark = player.cell();

    let mut packed: Vec<u32> = moves
        .iter()
        .map(|&mv| {
            let key = board.key(leaf_parent, mv / 9);
            let offset = mv % 9;
            let after = LookupTables::splice(key, offset, mark);
            let before_status = TABLES.status(key);
            let after_status = TABLES.status(after);

            let mut score = OrderScore::BASE;
            if after_status == mark {
                score += OrderScore::LOCAL_WIN;
            }
            if after_status != before_status {
                score += OrderScore::STATUS_CHANGE;
            }
            match offset {
                4 => score += OrderScore::CENTER,
                0 | 2 | 6 | 8 => score += OrderScore::CORNER,
                _ => {}
            }
            (score << MOVE_BITS) | mv as u32
        })
        .collect();

    packed.sort_unstable_by(|a, b| b.cmp(a));
    for (slot, p) in moves.iter_mut().zip(&packed) {
        *slot = (p & ((1 << MOVE_BITS) - 1)) as usize;
    }

    if let Some(tm) = tt_move {
        if let Some(pos) = moves.iter().position(|&m| m == tm) {
            moves.swap(0, pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Constraint, O, X};
    use crate::search::movegen::legal_moves;

    fn limits(depth: u8) -> SearchLimits {
        SearchLimits::new(depth, 10_000)
    }

    #[test]
    fn test_depth_one_always_returns_move() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(3).unwrap();
        board.set_cell(0, X);
        board.set_constraint(board.next_constraint(0, None));

        // zero time budget: depth 1 still completes
        let result = searcher.search(&mut board, Player::O, &SearchLimits::new(6, 0));
        assert_eq!(result.depth, 1);
        let mv = result.best_move.unwrap();
        assert!(legal_moves(&board).contains(&mv));
    }

    #[test]
    fn test_search_restores_board() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        board.set_cell(40, X);
        board.set_constraint(Some(Constraint::new(1, 4)));
        let before = board.clone();

        let _ = searcher.search(&mut board, Player::O, &limits(4));
        assert_eq!(board.leaves(), before.leaves());
        assert_eq!(board.hash(), before.hash());
        assert_eq!(board.constraint(), before.constraint());
        for layer in 0..2 {
            assert_eq!(board.keys(layer), before.keys(layer));
        }
    }

    #[test]
    fn test_search_finds_local_win() {
        // X has 0 and 1 in group 4; completing it wins nothing globally but
        // it is the only immediately resolving move
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        board.set_cell(36, X);
        board.set_cell(37, X);
        board.set_cell(0, O);
        board.set_cell(9, O);
        board.set_constraint(Some(Constraint::new(1, 4)));

        let result = searcher.search(&mut board, Player::X, &limits(1));
        assert_eq!(result.best_move, Some(38));
    }

    #[test]
    fn test_search_finds_game_win() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        // X owns groups 0 and 1; group 2 needs one more cell
        for g in 0..2 {
            for i in 0..3 {
                board.set_cell(g * 9 + i, X);
            }
        }
        board.set_cell(18, X);
        board.set_cell(19, X);
        board.set_cell(50, O);
        board.set_cell(60, O);
        board.set_constraint(Some(Constraint::new(1, 2)));

        let result = searcher.search(&mut board, Player::X, &limits(3));
        assert_eq!(result.best_move, Some(20));
        assert!(result.score >= WIN_SCORE);
    }

    #[test]
    fn test_search_avoids_sending_opponent_to_win() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        // O owns groups 0 and 1 and needs leaf 20 to take group 2
        for g in 0..2 {
            for i in 0..3 {
                board.set_cell(g * 9 + i, O);
            }
        }
        board.set_cell(18, O);
        board.set_cell(19, O);
        board.set_cell(21, X);
        board.set_constraint(Some(Constraint::new(1, 7)));

        // offsets 0 and 1 free O to play anywhere, offset 2 sends O to group 2
        let result = searcher.search(&mut board, Player::X, &limits(2));
        let mv = result.best_move.unwrap();
        assert!((66..72).contains(&mv), "losing move {}", mv);
        assert!(result.score > -WIN_SCORE);
    }

    #[test]
    fn test_empty_board_is_not_decided() {
        let mut searcher = Searcher::new(4);
        let mut board = Board::new(2).unwrap();
        let result = searcher.search(&mut board, Player::X, &limits(4));
        assert!(result.best_move.is_some());
        assert!(!is_decisive(result.score), "score {}", result.score);
        assert_eq!(result.depth, 4);
    }

    #[test]
    fn test_finished_game_returns_no_move() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        for g in [0usize, 4, 8] {
            for i in 0..3 {
                board.set_cell(g * 9 + i, O);
            }
        }
        let result = searcher.search(&mut board, Player::X, &limits(4));
        assert_eq!(result.best_move, None);
        assert!(result.score <= -WIN_SCORE);
    }

    #[test]
    fn test_tt_reused_across_searches() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        board.set_cell(40, X);
        board.set_constraint(Some(Constraint::new(1, 4)));

        let _ = searcher.search(&mut board, Player::O, &limits(4));
        assert!(searcher.tt_stats().used > 0);

        let second = searcher.search(&mut board, Player::O, &limits(4));
        assert!(second.best_move.is_some());
        assert!(second.stats.tt_score_hits > 0);

        searcher.clear_tt();
        assert_eq!(searcher.tt_stats().used, 0);
    }

    #[test]
    fn test_time_limit_respected() {
        let mut searcher = Searcher::new(4);
        let mut board = Board::new(3).unwrap();
        let start = Instant::now();
        let result = searcher.search(&mut board, Player::X, &SearchLimits::new(30, 200));
        assert!(result.best_move.is_some());

        #[cfg(debug_assertions)]
        let max_ms = 20_000;
        #[cfg(not(debug_assertions))]
        let max_ms = 2_000;
        assert!(start.elapsed().as_millis() < max_ms);
    }

    #[test]
    fn test_order_moves_prefers_winning_and_tt_move() {
        let mut board = Board::new(2).unwrap();
        board.set_cell(36, O);
        board.set_cell(37, O);
        board.set_constraint(Some(Constraint::new(1, 4)));
        let mut moves = legal_moves(&board);

        order_moves(&board, Player::O, &mut moves, None);
        assert_eq!(moves[0], 38);
        // center beats plain edges
        assert!(moves.iter().position(|&m| m == 40) < moves.iter().position(|&m| m == 41));

        order_moves(&board, Player::O, &mut moves, Some(43));
        assert_eq!(moves[0], 43);
        assert_eq!(moves.len(), 7);
    }

    #[test]
    fn test_terminal_score_prefers_faster_wins() {
        let mut board = Board::new(2).unwrap();
        for g in [2usize, 4, 6] {
            for i in 0..3 {
                board.set_cell(g * 9 + i, X);
            }
        }
        assert_eq!(terminal_score(&board, Player::X, 3), Some(WIN_SCORE + 3));
        assert_eq!(terminal_score(&board, Player::O, 1), Some(-(WIN_SCORE + 1)));
        assert!(terminal_score(&board, Player::X, 3) > terminal_score(&board, Player::X, 1));
        assert_eq!(terminal_score(&Board::new(2).unwrap(), Player::X, 3), None);
    }

    #[test]
    fn test_stats_rates() {
        let stats = SearchStats {
            beta_cutoffs: 10,
            first_move_cutoffs: 9,
            tt_probes: 4,
            tt_score_hits: 1,
            tt_move_hits: 2,
        };
        assert!((stats.first_move_rate() - 90.0).abs() < 1e-9);
        assert!((stats.tt_score_rate() - 25.0).abs() < 1e-9);
        assert_eq!(SearchStats::default().first_move_rate(), 0.0);
    }

    #[test]
    fn test_search_for_o_uses_o_marks() {
        let mut searcher = Searcher::new(1);
        let mut board = Board::new(2).unwrap();
        board.set_cell(80, X);
        board.set_constraint(board.next_constraint(80, None));
        let result = searcher.search(&mut board, Player::O, &limits(2));
        let mv = result.best_move.unwrap();
        assert!((72..81).contains(&mv));
        assert_eq!(board.leaf(mv), EMPTY);
        assert_eq!(board.leaf(80), X);
    }
}
