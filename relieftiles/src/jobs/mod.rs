//! Job reporting
//!
//! [`JobManager`] runs download jobs on the Tokio runtime in one of two
//! modes:
//!
//! - **Polling**: [`JobManager::submit`] starts a background job and returns
//!   its id. The job survives the caller going away; its snapshot is read
//!   with [`JobManager::get`]. Finished jobs are kept up to the retention
//!   limit, oldest evicted first when a new job is submitted.
//! - **Streaming**: [`JobManager::stream`] starts a job bound to the returned
//!   [`JobStream`]. Events are delivered in order and dropping the handle
//!   cancels the job. Streaming jobs are not listed in the polling table.
//!
//! # Example
//!
//! ```ignore
//! use relieftiles::jobs::JobManager;
//!
//! let manager = JobManager::new(orchestrator, 1024).with_job_retention(100);
//! let id = manager.submit(&request).await?;
//! let snapshot = manager.get(id)?;
//! ```

mod stream;

pub use stream::JobStream;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::orchestrator::{
    BroadcastSink, DownloadJob, DownloadOrchestrator, JobError, JobId, JobRequest, NoopSink,
    SharedJob,
};
use crate::provider::AsyncHttpClient;

/// Default number of finished polling jobs kept for lookup.
pub const DEFAULT_JOB_RETENTION: usize = 100;

/// A job registered for polling.
struct JobEntry {
    job: SharedJob,
    cancel: CancellationToken,
}

/// Runs and tracks download jobs.
pub struct JobManager<C: AsyncHttpClient + 'static> {
    orchestrator: Arc<DownloadOrchestrator<C>>,
    jobs: DashMap<JobId, JobEntry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
    progress_buffer: usize,
    job_retention: usize,
}

impl<C: AsyncHttpClient + 'static> JobManager<C> {
    /// Creates a manager.
    ///
    /// # Arguments
    ///
    /// * `orchestrator` - Executes the jobs
    /// * `progress_buffer` - Capacity of each streaming job's event queue
    pub fn new(orchestrator: DownloadOrchestrator<C>, progress_buffer: usize) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            jobs: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
            progress_buffer: progress_buffer.max(1),
            job_retention: DEFAULT_JOB_RETENTION,
        }
    }

    /// Sets how many finished polling jobs stay available to
    /// [`get`](Self::get) and [`list`](Self::list). Running jobs are never
    /// evicted.
    pub fn with_job_retention(mut self, job_retention: usize) -> Self {
        self.job_retention = job_retention;
        self
    }

    /// The orchestrator shared by all jobs.
    pub fn orchestrator(&self) -> &DownloadOrchestrator<C> {
        &self.orchestrator
    }

    /// Starts a background job and returns its id.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobId, JobError> {
        let job = self.orchestrator.prepare(request).await?;
        let id = job.id;
        self.prune_finished();

        let shared: SharedJob = Arc::new(RwLock::new(job));
        let cancel = self.shutdown.child_token();

        self.jobs.insert(
            id,
            JobEntry {
                job: Arc::clone(&shared),
                cancel: cancel.clone(),
            },
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move {
            orchestrator.run(shared, &NoopSink, cancel).await;
        });
        self.track(handle);

        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Returns a snapshot of a polling job.
    pub fn get(&self, id: JobId) -> Result<DownloadJob, JobError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.job.read().clone())
            .ok_or(JobError::NotFound(id))
    }

    /// Returns snapshots of every polling job, oldest first.
    pub fn list(&self) -> Vec<DownloadJob> {
        let mut jobs: Vec<DownloadJob> = self
            .jobs
            .iter()
            .map(|entry| entry.job.read().clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Requests cooperative cancellation of a polling job.
    ///
    /// The job stops before its next tile. Cancelling a finished job has no
    /// effect.
    pub fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let entry = self.jobs.get(&id).ok_or(JobError::NotFound(id))?;
        entry.cancel.cancel();
        debug!(job_id = %id, "Job cancellation requested");
        Ok(())
    }

    /// Starts a job bound to the returned handle.
    pub async fn stream(&self, request: &JobRequest) -> Result<JobStream, JobError> {
        let job = self.orchestrator.prepare(request).await?;
        let id = job.id;
        let shared: SharedJob = Arc::new(RwLock::new(job));
        let cancel = self.shutdown.child_token();
        let (sink, events) = BroadcastSink::channel(self.progress_buffer);

        let orchestrator = Arc::clone(&self.orchestrator);
        let task_job = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run(task_job, &sink, task_cancel).await;
        });
        self.track(handle);

        info!(job_id = %id, "Streaming job started");
        Ok(JobStream::new(id, shared, events, cancel))
    }

    /// Cancels every running job and waits for their tasks to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        debug!(tasks = tasks.len(), "Waiting for jobs to stop");
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Drops the oldest finished jobs beyond the retention limit.
    fn prune_finished(&self) {
        let mut finished: Vec<(DateTime<Utc>, JobId)> = self
            .jobs
            .iter()
            .filter_map(|entry| {
                let job = entry.job.read();
                job.state
                    .is_terminal()
                    .then(|| (job.finished_at.unwrap_or(job.created_at), job.id))
            })
            .collect();
        if finished.len() <= self.job_retention {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.job_retention;
        for (_, id) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
        }
        debug!(removed = excess, kept = self.job_retention, "Pruned finished jobs");
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}
