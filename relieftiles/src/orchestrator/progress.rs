//! Progress events and sinks.
//!
//! The orchestrator emits one [`JobEvent::Progress`] per tile, in processing
//! order, followed by a single [`JobEvent::Complete`]. Emission never blocks
//! the tile loop: the broadcast sink overwrites the oldest queued event when
//! a slow consumer falls behind, and the consumer is told how many it lost.

use serde::Serialize;
use tokio::sync::broadcast;

use super::types::{JobState, JobStats};
use crate::tile::{TileKey, TileOutcome};

/// Default capacity of the progress queue.
pub const DEFAULT_PROGRESS_BUFFER: usize = 1024;

/// Result of one tile, with cumulative counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub key: TileKey,
    pub outcome: TileOutcome,
    pub stats: JobStats,
    pub completed: u64,
    pub total: u64,
}

/// Everything a job reports while it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// One tile was processed.
    Progress(ProgressEvent),
    /// The job reached a terminal state; nothing follows.
    Complete {
        state: JobState,
        stats: JobStats,
        completed: u64,
        total: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The consumer fell behind and `skipped` events were dropped.
    Lagged { skipped: u64 },
}

impl JobEvent {
    /// Whether this is the terminal event.
    pub fn is_complete(&self) -> bool {
        matches!(self, JobEvent::Complete { .. })
    }
}

/// Destination for job events.
pub trait ProgressSink: Send + Sync {
    /// Delivers an event without blocking.
    fn emit(&self, event: JobEvent);
}

/// Discards every event. Used for polling jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: JobEvent) {}
}

/// Bounded drop-oldest queue backed by a Tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<JobEvent>,
}

impl BroadcastSink {
    /// Creates a sink and its receiver.
    ///
    /// `capacity` is clamped to at least one.
    pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<JobEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: JobEvent) {
        // Err only means no receiver is left; the job keeps running until
        // its cancellation token says otherwise.
        let _ = self.tx.send(event);
    }
}
