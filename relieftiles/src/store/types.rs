//! Store configuration, errors and scan results.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::fetch::DEFAULT_BLOCKED_TILE_SIZE;

/// Configuration for the tile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory; tiles live at `{base_dir}/{layer}/{zoom}/{x}/{y}.png`.
    pub base_dir: PathBuf,
    /// File length identifying a stored placeholder.
    pub blocked_tile_size: u64,
}

impl StoreConfig {
    /// Creates a configuration with the default placeholder size.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            blocked_tile_size: DEFAULT_BLOCKED_TILE_SIZE,
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking worker running the operation panicked or was cancelled.
    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Stored tile counts for one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerSummary {
    /// Layer name.
    pub layer: String,
    /// Tiles whose size differs from the placeholder size.
    pub good: u64,
    /// Stored placeholders.
    pub blocked: u64,
    /// Total bytes of all counted tiles.
    pub bytes: u64,
}

impl LayerSummary {
    /// Total number of stored tiles.
    pub fn total(&self) -> u64 {
        self.good + self.blocked
    }
}
