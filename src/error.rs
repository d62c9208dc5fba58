//! Error types for the engine
//!
//! Only external input (trees, paths, protocol messages) produces errors.
//! Broken internal invariants panic and are caught at the worker boundary.

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Board depth outside the supported range
    #[error("Unsupported board depth {0} (expected 2..=4)")]
    UnsupportedDepth(usize),

    /// Tree shape does not match the requested depth
    #[error("Malformed tree at {path:?}: {reason}")]
    MalformedTree { path: Vec<u8>, reason: String },

    /// Constraint path that does not name a sub-board
    #[error("Invalid constraint path {0:?}")]
    InvalidConstraint(Vec<u8>),

    /// Move path that does not name a leaf
    #[error("Invalid move path {0:?}")]
    InvalidMove(Vec<u8>),

    /// Worker context went away before replying
    #[error("Worker unavailable")]
    WorkerUnavailable,

    /// Malformed protocol message
    #[error(transparent)]
    Protocol(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
