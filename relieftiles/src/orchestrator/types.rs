//! Job types and errors

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::coord::{AreaSpec, CoordError};
use crate::provider::{LayerSet, OSM_LAYER};
use crate::tile::TileOutcome;

/// Identifier of a download job.
pub type JobId = Uuid;

/// Errors raised when submitting or looking up jobs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    /// The request names no layers.
    #[error("at least one layer is required")]
    NoLayers,

    /// The request names no zoom levels.
    #[error("at least one zoom level is required")]
    NoZoomLevels,

    /// A requested layer is not configured.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// A zoom level is beyond what the layer serves.
    #[error("zoom {zoom} is out of range for layer '{layer}' (max {max})")]
    ZoomOutOfRange { layer: String, zoom: u8, max: u8 },

    /// The area is not projectable.
    #[error("invalid area: {0}")]
    InvalidArea(#[from] CoordError),

    /// No job with this id exists.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// Counting the job's tiles did not complete.
    #[error("tile planning failed: {0}")]
    Planning(String),
}

fn default_layers() -> Vec<String> {
    vec![OSM_LAYER.to_string()]
}

/// What a caller asks to download.
///
/// JSON form (HTTP body):
///
/// ```json
/// {
///   "area": {"type": "circle", "centerLat": 51.67, "centerLon": -1.28, "radiusMiles": 5.0},
///   "zoomLevels": [10, 11, 12],
///   "layers": ["osm", "satellite"],
///   "redownloadBlocked": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub area: AreaSpec,
    pub zoom_levels: Vec<u8>,
    #[serde(default = "default_layers")]
    pub layers: Vec<String>,
    #[serde(default)]
    pub redownload_blocked: bool,
}

impl JobRequest {
    /// Creates a request for the `osm` layer.
    pub fn new(area: AreaSpec, zoom_levels: Vec<u8>) -> Self {
        Self {
            area,
            zoom_levels,
            layers: default_layers(),
            redownload_blocked: false,
        }
    }

    /// Replaces the requested layers.
    pub fn with_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether stored placeholders are fetched again.
    pub fn with_redownload_blocked(mut self, redownload: bool) -> Self {
        self.redownload_blocked = redownload;
        self
    }

    /// Validates the request against the configured layers.
    ///
    /// Returns the normalized request: duplicate layers and zoom levels are
    /// dropped, keeping first-seen order.
    pub fn validate(&self, layers: &LayerSet) -> Result<JobRequest, JobError> {
        if self.layers.is_empty() {
            return Err(JobError::NoLayers);
        }
        if self.zoom_levels.is_empty() {
            return Err(JobError::NoZoomLevels);
        }
        self.area.validate()?;

        let unique_layers = dedup_preserving_order(&self.layers);
        let unique_zooms = dedup_preserving_order(&self.zoom_levels);

        for name in &unique_layers {
            let layer = layers
                .get(name)
                .ok_or_else(|| JobError::UnknownLayer(name.clone()))?;
            if let Some(&zoom) = unique_zooms.iter().find(|&&z| !layer.supports_zoom(z)) {
                return Err(JobError::ZoomOutOfRange {
                    layer: name.clone(),
                    zoom,
                    max: layer.max_zoom(),
                });
            }
        }

        Ok(JobRequest {
            area: self.area,
            zoom_levels: unique_zooms,
            layers: unique_layers,
            redownload_blocked: self.redownload_blocked,
        })
    }
}

fn dedup_preserving_order<T: Clone + PartialEq>(items: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    unique
}

/// Per-outcome tile counters.
///
/// Serializes with one key per outcome, all seven always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub success: u64,
    pub skipped_good: u64,
    pub skipped_blocked: u64,
    pub blocked: u64,
    pub failed: u64,
    pub timeout: u64,
    pub error: u64,
}

impl JobStats {
    /// Count for one outcome.
    pub fn get(&self, outcome: TileOutcome) -> u64 {
        match outcome {
            TileOutcome::Success => self.success,
            TileOutcome::SkippedGood => self.skipped_good,
            TileOutcome::SkippedBlocked => self.skipped_blocked,
            TileOutcome::Blocked => self.blocked,
            TileOutcome::Failed => self.failed,
            TileOutcome::Timeout => self.timeout,
            TileOutcome::Error => self.error,
        }
    }

    /// Increments the counter for one outcome.
    pub fn record(&mut self, outcome: TileOutcome) {
        let counter = match outcome {
            TileOutcome::Success => &mut self.success,
            TileOutcome::SkippedGood => &mut self.skipped_good,
            TileOutcome::SkippedBlocked => &mut self.skipped_blocked,
            TileOutcome::Blocked => &mut self.blocked,
            TileOutcome::Failed => &mut self.failed,
            TileOutcome::Timeout => &mut self.timeout,
            TileOutcome::Error => &mut self.error,
        };
        *counter += 1;
    }

    /// Tiles processed so far.
    pub fn total(&self) -> u64 {
        TileOutcome::ALL.iter().map(|&o| self.get(o)).sum()
    }

    /// Tiles that ended without usable imagery.
    pub fn problems(&self) -> u64 {
        self.failed + self.blocked + self.timeout + self.error
    }

    /// Whether every processed tile is usable.
    pub fn is_clean(&self) -> bool {
        self.problems() == 0
    }

    /// Number of network requests made.
    pub fn fetches(&self) -> u64 {
        TileOutcome::ALL
            .iter()
            .filter(|o| o.is_fetch())
            .map(|&o| self.get(o))
            .sum()
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    /// Whether the job can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a download job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJob {
    pub id: JobId,
    pub request: JobRequest,
    pub stats: JobStats,
    pub state: JobState,
    /// Tiles processed so far.
    pub completed: u64,
    /// Tiles the job will process in total.
    pub total: u64,
    /// Reason for `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl DownloadJob {
    /// Creates a pending job.
    pub fn new(id: JobId, request: JobRequest, total: u64) -> Self {
        Self {
            id,
            request,
            stats: JobStats::default(),
            state: JobState::Pending,
            completed: 0,
            total,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Records one tile outcome.
    pub fn record(&mut self, outcome: TileOutcome) {
        self.stats.record(outcome);
        self.completed += 1;
    }

    /// Moves the job to `Running`.
    pub(crate) fn start(&mut self) {
        if self.state == JobState::Pending {
            self.state = JobState::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Moves the job to a terminal state. Terminal states are final.
    pub(crate) fn finish(&mut self, state: JobState, error: Option<String>) {
        debug_assert!(state.is_terminal());
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    /// Progress as a percentage of the total.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> AreaSpec {
        AreaSpec::circle(51.6707, -1.2879, 2.0)
    }

    #[test]
    fn test_stats_record_and_total() {
        let mut stats = JobStats::default();
        stats.record(TileOutcome::Success);
        stats.record(TileOutcome::Success);
        stats.record(TileOutcome::SkippedGood);
        stats.record(TileOutcome::Timeout);

        assert_eq!(stats.get(TileOutcome::Success), 2);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.fetches(), 3);
        assert_eq!(stats.problems(), 1);
        assert!(!stats.is_clean());
    }

    #[test]
    fn test_stats_clean_with_skips() {
        let mut stats = JobStats::default();
        stats.record(TileOutcome::SkippedBlocked);
        stats.record(TileOutcome::SkippedGood);
        assert!(stats.is_clean());
    }

    #[test]
    fn test_stats_json_has_all_keys() {
        let json = serde_json::to_value(JobStats::default()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        for outcome in TileOutcome::ALL {
            assert!(keys.contains(&outcome.to_string()), "missing {}", outcome);
        }
        assert_eq!(keys.len(), 7);
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let layers = LayerSet::builtin();
        let request = JobRequest::new(area(), vec![]);
        assert_eq!(request.validate(&layers), Err(JobError::NoZoomLevels));

        let request = JobRequest::new(area(), vec![10]).with_layers(Vec::<String>::new());
        assert_eq!(request.validate(&layers), Err(JobError::NoLayers));
    }

    #[test]
    fn test_validate_rejects_unknown_layer_and_zoom() {
        let layers = LayerSet::builtin();

        let request = JobRequest::new(area(), vec![10]).with_layers(["osm", "terrain"]);
        assert_eq!(
            request.validate(&layers),
            Err(JobError::UnknownLayer("terrain".into()))
        );

        let request = JobRequest::new(area(), vec![10, 20]);
        assert_eq!(
            request.validate(&layers),
            Err(JobError::ZoomOutOfRange {
                layer: "osm".into(),
                zoom: 20,
                max: 19
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_area() {
        let layers = LayerSet::builtin();
        let request = JobRequest::new(AreaSpec::circle(95.0, 0.0, 1.0), vec![10]);
        assert!(matches!(
            request.validate(&layers),
            Err(JobError::InvalidArea(CoordError::InvalidLatitude(_)))
        ));
    }

    #[test]
    fn test_validate_dedups_in_order() {
        let layers = LayerSet::builtin();
        let request = JobRequest::new(area(), vec![12, 10, 12, 11, 10])
            .with_layers(["satellite", "osm", "satellite"]);

        let normalized = request.validate(&layers).unwrap();
        assert_eq!(normalized.zoom_levels, vec![12, 10, 11]);
        assert_eq!(normalized.layers, vec!["satellite", "osm"]);
    }

    #[test]
    fn test_request_json_defaults() {
        let request: JobRequest = serde_json::from_str(
            r#"{"area":{"type":"circle","centerLat":51.6,"centerLon":-1.2,"radiusMiles":3},"zoomLevels":[10]}"#,
        )
        .unwrap();
        assert_eq!(request.layers, vec!["osm"]);
        assert!(!request.redownload_blocked);
    }

    #[test]
    fn test_job_terminal_state_is_final() {
        let mut job = DownloadJob::new(Uuid::new_v4(), JobRequest::new(area(), vec![10]), 4);
        job.start();
        assert_eq!(job.state, JobState::Running);

        job.record(TileOutcome::Success);
        assert_eq!(job.completed, 1);
        assert_eq!(job.progress_percent(), 25.0);

        job.finish(JobState::Cancelled, None);
        job.finish(JobState::Completed, None);
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.finished_at.is_some());
    }
}
