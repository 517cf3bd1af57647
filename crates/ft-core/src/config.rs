//! # Forum Settings
//!
//! Tunables for the tree engine. The binary fills these from its config
//! sources; tests use [`ForumSettings::default`].

use serde::{Deserialize, Serialize};

/// Depth at which insert paths are truncated.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumSettings {
    /// Longest path an insert records. Deeper paths are truncated.
    pub max_depth: usize,
    /// Extra attempts an insert makes after a write conflict.
    pub commit_retries: u32,
    /// How many sections `get_sections` returns.
    pub sections_page: usize,
    /// How many threads `list_threads` returns.
    pub threads_page: usize,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            commit_retries: 3,
            sections_page: 100,
            threads_page: 1000,
        }
    }
}
