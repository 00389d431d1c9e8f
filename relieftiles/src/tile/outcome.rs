//! Per-tile outcomes and stored tile classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of processing one tile within a job.
///
/// Exactly one outcome is recorded per tile attempt. Outcomes are terminal:
/// a tile is never retried within the job that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileOutcome {
    /// Fetched with HTTP 200 and persisted.
    Success,
    /// A good copy already existed on disk.
    SkippedGood,
    /// A blocked placeholder existed and redownload was not requested.
    SkippedBlocked,
    /// The server answered 200 with the placeholder image.
    Blocked,
    /// The server answered with a non-200 status.
    Failed,
    /// The request exceeded the timeout.
    Timeout,
    /// Transport or storage failure.
    Error,
}

impl TileOutcome {
    /// Every outcome, in reporting order.
    pub const ALL: [TileOutcome; 7] = [
        TileOutcome::Success,
        TileOutcome::SkippedGood,
        TileOutcome::SkippedBlocked,
        TileOutcome::Blocked,
        TileOutcome::Failed,
        TileOutcome::Timeout,
        TileOutcome::Error,
    ];

    /// Whether this outcome leaves the tile without usable imagery.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            TileOutcome::Blocked | TileOutcome::Failed | TileOutcome::Timeout | TileOutcome::Error
        )
    }

    /// Whether a network request was made to produce this outcome.
    ///
    /// `Error` counts as a fetch; a store fault before the request is the
    /// only case where it does not, and that ends the job.
    pub fn is_fetch(&self) -> bool {
        !matches!(self, TileOutcome::SkippedGood | TileOutcome::SkippedBlocked)
    }

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileOutcome::Success => "success",
            TileOutcome::SkippedGood => "skipped_good",
            TileOutcome::SkippedBlocked => "skipped_blocked",
            TileOutcome::Blocked => "blocked",
            TileOutcome::Failed => "failed",
            TileOutcome::Timeout => "timeout",
            TileOutcome::Error => "error",
        }
    }
}

impl fmt::Display for TileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a tile on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    /// No file at the tile's path.
    Missing,
    /// A file whose size differs from the placeholder size.
    Good,
    /// A file exactly the size of the known placeholder image.
    Blocked,
}
