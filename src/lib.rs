//! Fractal tic-tac-toe move-selection engine
//!
//! The game is tic-tac-toe nested `depth` levels deep (2 to 4): every cell of
//! a 3x3 group is itself a group, down to 9^depth leaf cells. Winning a group
//! marks the cell it occupies in its parent, and each move sends the opponent
//! to a matching sub-board.
//!
//! # Architecture
//!
//! The engine is organized into several modules:
//! - [`board`]: Packed board, group keys and precomputed lookup tables
//! - [`search`]: Move generation, Zobrist hashing, transposition table and
//!   alpha-beta search
//! - [`symmetry`]: The eight symmetries of the square
//! - [`adapter`]: Conversion from the tree-form board callers hold
//! - [`engine`]: Main AI engine running one request end to end
//! - [`worker`]: Worker contexts and the JSON message protocol
//!
//! # Quick Start
//!
//! ```
//! use fractal::{AIEngine, Player, SearchConfig, SearchRequest, TreeNode};
//!
//! let mut board = TreeNode::empty(2);
//! board.play(&[0, 8], Player::X).unwrap();
//!
//! let mut engine = AIEngine::new();
//! let result = engine.think(&SearchRequest {
//!     board,
//!     player: Player::O,
//!     constraint: vec![8],
//!     config: SearchConfig { max_time_ms: 200, max_search_depth: 4, board_depth: 2 },
//! });
//! assert_eq!(result.best_move[0], 8);
//! ```

pub mod adapter;
pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod search;
pub mod symmetry;
pub mod worker;

// Re-export commonly used types for convenience
pub use adapter::{Mark, TreeNode};
pub use board::{Board, Constraint, Player};
pub use config::{EngineConfig, SearchConfig};
pub use engine::{run_ai_benchmark, AIEngine, BenchmarkReport, MoveResult, SearchRequest, SearchType};
pub use error::{EngineError, EngineResult};
pub use worker::{Request, Response, WorkerPool};
