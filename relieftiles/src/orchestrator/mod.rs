//! Download orchestration
//!
//! Runs one job as a single sequential loop over layers, zoom levels and the
//! ordered tile set of the area. For each tile the store decides whether a
//! fetch is needed; fetched tiles are persisted and every tile produces one
//! outcome and one progress event.
//!
//! # Lifecycle
//!
//! ```text
//! Pending → Running → Completed
//!                   → Cancelled   (token observed before a tile)
//!                   → Failed      (store fault)
//! ```
//!
//! Per-tile failures (`Failed`, `Timeout`, `Blocked`, `Error` from the
//! network) never end a job. Cancellation is checked once per tile, never in
//! the middle of a request.

mod progress;
mod types;

pub use progress::{
    BroadcastSink, JobEvent, NoopSink, ProgressEvent, ProgressSink, DEFAULT_PROGRESS_BUFFER,
};
pub use types::{DownloadJob, JobError, JobId, JobRequest, JobState, JobStats};

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coord::{area_range, count_tiles, tiles_in_column};
use crate::fetch::FetchClient;
use crate::provider::{AsyncHttpClient, LayerConfig, LayerSet};
use crate::store::{StoreError, TileStore};
use crate::tile::{TileKey, TileOutcome, TileState};

/// A job record shared between the task running it and its observers.
pub type SharedJob = Arc<RwLock<DownloadJob>>;

/// Why a job stopped before finishing its tiles.
#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tile enumeration failed: {0}")]
    Enumerate(String),
}

/// Executes download jobs against one store and one fetch client.
pub struct DownloadOrchestrator<C: AsyncHttpClient> {
    fetcher: FetchClient<C>,
    store: TileStore,
    layers: LayerSet,
}

impl<C: AsyncHttpClient> DownloadOrchestrator<C> {
    /// Creates a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Rate-limited fetch client
    /// * `store` - Tile store shared with other jobs
    /// * `layers` - Layers jobs may request
    pub fn new(fetcher: FetchClient<C>, store: TileStore, layers: LayerSet) -> Self {
        Self {
            fetcher,
            store,
            layers,
        }
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Validates a request and creates a pending job with its total computed.
    ///
    /// Counting scales with the area and zoom, so it runs on the blocking
    /// pool.
    pub async fn prepare(&self, request: &JobRequest) -> Result<DownloadJob, JobError> {
        let request = request.validate(&self.layers)?;
        let area = request.area;
        let zooms = request.zoom_levels.clone();
        let per_layer: u64 = tokio::task::spawn_blocking(move || {
            zooms.iter().map(|&zoom| count_tiles(&area, zoom)).sum()
        })
        .await
        .map_err(|e| JobError::Planning(e.to_string()))?;
        let total = per_layer * request.layers.len() as u64;

        Ok(DownloadJob::new(Uuid::new_v4(), request, total))
    }

    /// Runs a prepared job to a terminal state.
    ///
    /// Returns the final snapshot. The shared record is updated after every
    /// tile so observers can poll it.
    pub async fn run(
        &self,
        job: SharedJob,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> DownloadJob {
        let (id, request) = {
            let mut guard = job.write();
            guard.start();
            (guard.id, guard.request.clone())
        };

        info!(
            job_id = %id,
            layers = ?request.layers,
            zooms = ?request.zoom_levels,
            total = job.read().total,
            "Download job started"
        );

        let (state, error) = match self.run_tiles(&job, &request, sink, &cancel).await {
            Ok(true) => (JobState::Completed, None),
            Ok(false) => (JobState::Cancelled, None),
            Err(e) => (JobState::Failed, Some(e.to_string())),
        };

        let snapshot = {
            let mut guard = job.write();
            guard.finish(state, error);
            guard.clone()
        };

        match snapshot.state {
            JobState::Failed => warn!(
                job_id = %id,
                error = snapshot.error.as_deref().unwrap_or_default(),
                completed = snapshot.completed,
                "Download job failed"
            ),
            state => info!(
                job_id = %id,
                state = %state,
                completed = snapshot.completed,
                total = snapshot.total,
                success = snapshot.stats.success,
                skipped = snapshot.stats.skipped_good + snapshot.stats.skipped_blocked,
                problems = snapshot.stats.problems(),
                "Download job finished"
            ),
        }

        sink.emit(JobEvent::Complete {
            state: snapshot.state,
            stats: snapshot.stats,
            completed: snapshot.completed,
            total: snapshot.total,
            error: snapshot.error.clone(),
        });

        snapshot
    }

    /// The tile loop. Returns `Ok(false)` when cancelled.
    async fn run_tiles(
        &self,
        job: &SharedJob,
        request: &JobRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<bool, RunError> {
        for layer_name in &request.layers {
            // Validated at prepare time
            let Some(layer) = self.layers.get(layer_name) else {
                continue;
            };

            for &zoom in &request.zoom_levels {
                let range = area_range(&request.area, zoom);
                debug!(
                    layer = %layer_name,
                    zoom,
                    columns = range.max_x - range.min_x + 1,
                    "Enumerating tiles"
                );

                for x in range.min_x..=range.max_x {
                    if cancel.is_cancelled() {
                        return Ok(false);
                    }

                    let area = request.area;
                    let column =
                        tokio::task::spawn_blocking(move || tiles_in_column(&area, &range, x))
                            .await
                            .map_err(|e| RunError::Enumerate(e.to_string()))?;

                    for coord in column {
                        if cancel.is_cancelled() {
                            return Ok(false);
                        }

                        let key = TileKey::from_coord(layer_name.as_str(), coord);
                        match self.process_tile(layer, &key, request.redownload_blocked).await {
                            Ok(outcome) => record(job, sink, key, outcome),
                            Err(e) => {
                                warn!(tile = %key, error = %e, "Tile store fault, stopping job");
                                record(job, sink, key, TileOutcome::Error);
                                return Err(e.into());
                            }
                        }
                    }
                }
            }
        }

        Ok(true)
    }

    /// Decides, fetches and persists one tile.
    async fn process_tile(
        &self,
        layer: &LayerConfig,
        key: &TileKey,
        redownload_blocked: bool,
    ) -> Result<TileOutcome, StoreError> {
        match self.store.classify(key).await? {
            TileState::Good => {
                debug!(tile = %key, "Skipping stored tile");
                return Ok(TileOutcome::SkippedGood);
            }
            TileState::Blocked if !redownload_blocked => {
                debug!(tile = %key, "Skipping stored placeholder");
                return Ok(TileOutcome::SkippedBlocked);
            }
            TileState::Blocked | TileState::Missing => {}
        }

        let result = self.fetcher.fetch(layer, key).await;

        if let (TileOutcome::Success | TileOutcome::Blocked, Some(bytes)) =
            (result.outcome, result.bytes)
        {
            self.store.write(key, bytes).await?;
        }

        match result.outcome {
            TileOutcome::Success => info!(tile = %key, "Tile downloaded"),
            outcome => warn!(
                tile = %key,
                outcome = %outcome,
                url = %result.url,
                status = ?result.status,
                error = result.error.as_deref().unwrap_or_default(),
                "Tile not downloaded"
            ),
        }

        Ok(result.outcome)
    }
}

/// Updates the shared record and emits the tile's event.
fn record(job: &SharedJob, sink: &dyn ProgressSink, key: TileKey, outcome: TileOutcome) {
    let event = {
        let mut guard = job.write();
        guard.record(outcome);
        ProgressEvent {
            key,
            outcome,
            stats: guard.stats,
            completed: guard.completed,
            total: guard.total,
        }
    };
    sink.emit(JobEvent::Progress(event));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::coord::{tiles_for_area, AreaSpec};
    use crate::fetch::FetchConfig;
    use crate::provider::{HttpResponse, MockAsyncHttpClient, ProviderError};
    use crate::store::StoreConfig;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Collects every emitted event.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<JobEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn emit(&self, event: JobEvent) {
            self.events.lock().push(event);
        }
    }

    impl RecordingSink {
        fn progress(&self) -> Vec<ProgressEvent> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    JobEvent::Progress(p) => Some(p.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn orchestrator(
        dir: &TempDir,
        mock: &MockAsyncHttpClient,
    ) -> DownloadOrchestrator<MockAsyncHttpClient> {
        DownloadOrchestrator::new(
            FetchClient::new(mock.clone(), FetchConfig::default().without_delay()),
            TileStore::new(StoreConfig::new(dir.path())),
            LayerSet::builtin(),
        )
    }

    /// A bounding box holding exactly one tile at the given zoom.
    fn single_tile_area(x: u32, y: u32, zoom: u8) -> AreaSpec {
        let (lat, lon) = crate::coord::tile_center(&crate::coord::TileCoord::new(x, y, zoom));
        AreaSpec::bounding_box(lat + 0.001, lat - 0.001, lon + 0.001, lon - 0.001)
    }

    async fn run(
        orch: &DownloadOrchestrator<MockAsyncHttpClient>,
        request: JobRequest,
    ) -> (DownloadJob, RecordingSink) {
        let job = orch.prepare(&request).await.unwrap();
        let sink = RecordingSink::default();
        let shared = Arc::new(RwLock::new(job));
        let done = orch.run(shared, &sink, CancellationToken::new()).await;
        (done, sink)
    }

    #[tokio::test]
    async fn test_prepare_computes_total_across_layers() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, &MockAsyncHttpClient::ok_with_len(10));
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let request = JobRequest::new(area, vec![10, 12]).with_layers(["osm", "satellite"]);
        let job = orch.prepare(&request).await.unwrap();

        let expected = 2 * (count_tiles(&area, 10) + count_tiles(&area, 12));
        assert_eq!(job.total, expected);
        assert_eq!(job.state, JobState::Pending);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_prepare_counts_off_the_runtime_thread() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, &MockAsyncHttpClient::ok_with_len(10));

        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        // On a single-threaded runtime the ticker only runs if prepare yields
        let request = JobRequest::new(AreaSpec::circle(51.67, -1.28, 50.0), vec![14]);
        let job = orch.prepare(&request).await.unwrap();
        let seen = ticks.load(Ordering::Relaxed);
        ticker.abort();

        assert!(job.total > 0);
        assert!(seen > 0, "runtime thread was blocked while counting");
    }

    #[tokio::test]
    async fn test_events_in_order_and_counts_match() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(20_000);
        let orch = orchestrator(&dir, &mock);
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let (job, sink) = run(&orch, JobRequest::new(area, vec![11, 12])).await;

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.completed, job.total);
        assert_eq!(job.stats.success, job.total);
        assert_eq!(mock.request_count() as u64, job.total);

        let events = sink.progress();
        assert_eq!(events.len() as u64, job.total);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.completed, i as u64 + 1);
            assert_eq!(event.stats.total(), event.completed);
        }

        let expected_keys: Vec<TileKey> = [11u8, 12]
            .iter()
            .flat_map(|&z| tiles_for_area(&area, z))
            .map(|c| TileKey::from_coord("osm", c))
            .collect();
        let keys: Vec<TileKey> = events.into_iter().map(|e| e.key).collect();
        assert_eq!(keys, expected_keys);

        assert!(sink.events.lock().last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_rerun_skips_without_requests() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(50_000);
        let orch = orchestrator(&dir, &mock);
        let request = JobRequest::new(single_tile_area(8133, 5448, 14), vec![14]);

        let (first, _) = run(&orch, request.clone()).await;
        assert_eq!(first.stats.success, 1);

        let (second, _) = run(&orch, request).await;
        assert_eq!(second.stats.skipped_good, 1);
        assert_eq!(second.stats.total(), 1);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_blocked_then_skipped_then_redownloaded() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(7412);
        let orch = orchestrator(&dir, &mock);
        let request = JobRequest::new(single_tile_area(8133, 5448, 14), vec![14]);
        let key = TileKey::new("osm", 14, 8133, 5448);

        let (first, _) = run(&orch, request.clone()).await;
        assert_eq!(first.stats.blocked, 1);
        assert_eq!(orch.store().classify(&key).await.unwrap(), TileState::Blocked);

        let (second, _) = run(&orch, request.clone()).await;
        assert_eq!(second.stats.skipped_blocked, 1);
        assert_eq!(mock.request_count(), 1);

        mock.push(Ok(HttpResponse::new(200, vec![1u8; 30_000])));
        let (third, _) = run(&orch, request.with_redownload_blocked(true)).await;
        assert_eq!(third.stats.success, 1);
        assert_eq!(mock.request_count(), 2);
        assert_eq!(orch.store().classify(&key).await.unwrap(), TileState::Good);
    }

    #[tokio::test]
    async fn test_problems_do_not_abort_and_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(9_000);
        mock.push(Ok(HttpResponse::new(429, Vec::new())));
        mock.push(Err(ProviderError::Timeout("slow".into())));
        mock.push(Err(ProviderError::Transport("reset".into())));
        let orch = orchestrator(&dir, &mock);
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let (job, sink) = run(&orch, JobRequest::new(area, vec![12])).await;

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.stats.failed, 1);
        assert_eq!(job.stats.timeout, 1);
        assert_eq!(job.stats.error, 1);
        assert_eq!(job.stats.success, job.total - 3);
        assert!(!job.stats.is_clean());

        let first_three: Vec<_> = sink.progress().into_iter().take(3).collect();
        for event in &first_three {
            let state = orch.store().classify(&event.key).await.unwrap();
            assert_eq!(state, TileState::Missing, "{} should not be stored", event.key);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(9_000);
        let orch = orchestrator(&dir, &mock);
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let job = orch.prepare(&JobRequest::new(area, vec![12])).await.unwrap();
        let job = Arc::new(RwLock::new(job));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let sink = RecordingSink::default();
        let done = orch.run(job.clone(), &sink, cancel).await;

        assert_eq!(done.state, JobState::Cancelled);
        assert_eq!(done.completed, 0);
        assert_eq!(mock.request_count(), 0);
        assert_eq!(job.read().state, JobState::Cancelled);
        assert_eq!(sink.events.lock().len(), 1);
    }

    /// Cancels the token after a fixed number of progress events.
    struct CancelAfter {
        remaining: Mutex<usize>,
        cancel: CancellationToken,
    }

    impl ProgressSink for CancelAfter {
        fn emit(&self, event: JobEvent) {
            if let JobEvent::Progress(_) = event {
                let mut remaining = self.remaining.lock();
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.cancel.cancel();
                }
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_checked_per_tile() {
        let dir = TempDir::new().unwrap();
        let mock = MockAsyncHttpClient::ok_with_len(9_000);
        let orch = orchestrator(&dir, &mock);
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let job = orch.prepare(&JobRequest::new(area, vec![13])).await.unwrap();
        let job = Arc::new(RwLock::new(job));
        assert!(job.read().total > 3);

        let cancel = CancellationToken::new();
        let sink = CancelAfter {
            remaining: Mutex::new(3),
            cancel: cancel.clone(),
        };
        let done = orch.run(job, &sink, cancel).await;

        assert_eq!(done.state, JobState::Cancelled);
        assert_eq!(done.completed, 3);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_store_fault_fails_job() {
        let dir = TempDir::new().unwrap();
        // A file where the layer directory should be makes every write fail
        std::fs::write(dir.path().join("osm"), b"not a directory").unwrap();

        let mock = MockAsyncHttpClient::ok_with_len(9_000);
        let orch = orchestrator(&dir, &mock);
        let area = AreaSpec::bounding_box(51.71, 51.63, -1.22, -1.35);

        let (job, sink) = run(&orch, JobRequest::new(area, vec![12])).await;

        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.is_some());
        assert_eq!(job.stats.error, 1);
        assert_eq!(job.completed, 1);

        let events = sink.events.lock().clone();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            JobEvent::Progress(p) if p.outcome == TileOutcome::Error
        ));
        assert!(matches!(
            &events[1],
            JobEvent::Complete { state: JobState::Failed, .. }
        ));
    }
}
