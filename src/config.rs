//! Search and engine configuration

use serde::{Deserialize, Serialize};

/// Per-request search settings, as carried by the worker protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Wall-clock budget for the whole request
    pub max_time_ms: u64,
    /// Iterative deepening stops at this many plies
    pub max_search_depth: u8,
    /// Number of nested 3x3 levels (2..=4)
    pub board_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_time_ms: 1000,
            max_search_depth: 16,
            board_depth: 2,
        }
    }
}

/// Long-lived settings of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Transposition table size per engine, in megabytes
    pub tt_size_mb: usize,
    /// Maximum number of worker contexts
    pub pool_size: usize,
    /// Search a randomly transformed copy of each position
    pub randomize_symmetry: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tt_size_mb: 16,
            pool_size: 2,
            randomize_symmetry: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_time_ms, 1000);
        assert_eq!(config.max_search_depth, 16);
        assert_eq!(config.board_depth, 2);
    }

    #[test]
    fn test_search_config_partial_json() {
        let config: SearchConfig = serde_json::from_str(r#"{"maxTimeMs": 250}"#).unwrap();
        assert_eq!(config.max_time_ms, 250);
        assert_eq!(config.max_search_depth, 16);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"boardDepth\":2"));
    }
}
