//! Connection-bound job handle.

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::orchestrator::{DownloadJob, JobEvent, JobId, SharedJob};

/// Handle to a job running in streaming mode.
///
/// Events arrive in processing order through a bounded drop-oldest queue.
/// When the consumer falls behind, a [`JobEvent::Lagged`] tells it how many
/// events were lost. Dropping the handle cancels the job.
pub struct JobStream {
    id: JobId,
    job: SharedJob,
    events: broadcast::Receiver<JobEvent>,
    finished: bool,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl JobStream {
    pub(super) fn new(
        id: JobId,
        job: SharedJob,
        events: broadcast::Receiver<JobEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            job,
            events,
            finished: false,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// The job's id.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Requests cancellation while keeping the handle.
    ///
    /// The job still delivers its terminal event, so callers can keep
    /// reading until [`JobStream::next`] returns `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current snapshot of the job.
    pub fn snapshot(&self) -> DownloadJob {
        self.job.read().clone()
    }

    #[cfg(test)]
    pub(super) fn job_for_test(&self) -> &SharedJob {
        &self.job
    }

    /// Receives the next event.
    ///
    /// Returns `None` after the terminal [`JobEvent::Complete`] has been
    /// delivered, or if the job task ended without one.
    pub async fn next(&mut self) -> Option<JobEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv().await {
            Ok(event) => {
                if event.is_complete() {
                    self.finished = true;
                }
                Some(event)
            }
            Err(RecvError::Lagged(skipped)) => Some(JobEvent::Lagged { skipped }),
            Err(RecvError::Closed) => {
                self.finished = true;
                None
            }
        }
    }

    /// Drains events until the job completes and returns the final snapshot.
    pub async fn wait(mut self) -> DownloadJob {
        while self.next().await.is_some() {}
        self.snapshot()
    }

    /// Converts the handle into a stream of events.
    ///
    /// The job stays bound to the stream: dropping it cancels the job.
    pub fn into_stream(self) -> impl Stream<Item = JobEvent> + Send {
        stream::unfold(self, |mut handle| async move {
            handle.next().await.map(|event| (event, handle))
        })
    }
}
