//! Ordered job queue with a single active conversion slot.
//!
//! The queue owns every job record; all mutations go through its mutex so
//! readers never observe a half-updated job. Commands (`enqueue`,
//! `cancel_current`, `clear_finished`) return immediately and never wait on
//! an in-flight run: the conversion work itself happens on the blocking
//! thread pool, driven by a single spawned task that processes pending jobs
//! strictly one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::events::{self, EventReceiver, EventSender, ProgressReporter, QueueEvent};
use crate::job::{Job, JobStatus};
use crate::pipeline::{ConversionPipeline, PipelineOutcome};

/// Handle to the queue. Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    jobs: Arc<Mutex<Vec<Job>>>,
    /// Guards the single driver task; mirrors "at most one job processing".
    driving: AtomicBool,
    /// Cancellation token of the active run, if any.
    active: Mutex<Option<CancellationToken>>,
    events: EventSender,
    pipeline: ConversionPipeline,
}

impl JobQueue {
    /// Create a queue and the receiving half of its event channel.
    ///
    /// Must be called within a tokio runtime; the queue spawns its driver
    /// task on the current runtime when work arrives.
    pub fn new() -> (Self, EventReceiver) {
        Self::with_pipeline(ConversionPipeline::new())
    }

    pub fn with_pipeline(pipeline: ConversionPipeline) -> (Self, EventReceiver) {
        let (tx, rx) = events::channel();
        let queue = Self {
            inner: Arc::new(QueueInner {
                jobs: Arc::new(Mutex::new(Vec::new())),
                driving: AtomicBool::new(false),
                active: Mutex::new(None),
                events: tx,
                pipeline,
            }),
        };
        (queue, rx)
    }

    /// Enqueue zip paths, in input order. Paths without a `.zip` extension
    /// (case-insensitive) are dropped. Returns the created job records;
    /// processing starts immediately if the queue was idle.
    pub fn enqueue<I, P>(&self, paths: I) -> Vec<Job>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let accepted: Vec<Job> = paths
            .into_iter()
            .map(Into::into)
            .filter(|path: &PathBuf| {
                let ok = has_zip_extension(path);
                if !ok {
                    warn!(path = %path.display(), "rejected: not a .zip file");
                }
                ok
            })
            .map(|path| Job::new(path.to_string_lossy().into_owned()))
            .collect();

        if !accepted.is_empty() {
            self.inner.jobs.lock().extend(accepted.iter().cloned());
            self.ensure_driver();
        }
        accepted
    }

    /// Signal cancellation to the active run, if any. The job transitions to
    /// `Cancelled` once the pipeline acknowledges at its next suspension
    /// point; pending and terminal jobs are unaffected.
    pub fn cancel_current(&self) {
        if let Some(token) = self.inner.active.lock().as_ref() {
            info!("cancellation requested for active job");
            token.cancel();
        }
    }

    /// Remove every job in a terminal state. Pending and processing jobs are
    /// kept; calling this twice in a row is a no-op the second time.
    pub fn clear_finished(&self) {
        self.inner
            .jobs
            .lock()
            .retain(|job| !job.status.is_terminal());
    }

    /// Snapshot of all job records, in queue order.
    pub fn jobs(&self) -> Vec<Job> {
        self.inner.jobs.lock().clone()
    }

    fn ensure_driver(&self) {
        if self.inner.driving.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            QueueInner::drive(inner).await;
        });
    }
}

impl QueueInner {
    /// Drain pending jobs one at a time until the queue is idle.
    async fn drive(inner: Arc<Self>) {
        loop {
            let Some(job) = inner.take_next_pending() else {
                inner.driving.store(false, Ordering::SeqCst);
                // An enqueue may have raced the idle transition: it saw the
                // driver as running and did not spawn a new one. Re-check.
                if inner.has_pending() && !inner.driving.swap(true, Ordering::SeqCst) {
                    continue;
                }
                break;
            };

            let token = CancellationToken::new();
            *inner.active.lock() = Some(token.clone());
            info!(job_id = %job.id, input = %job.input_path, "job started");

            let reporter = ProgressReporter::new(
                job.id.clone(),
                Arc::clone(&inner.jobs),
                inner.events.clone(),
            );
            let pipeline = inner.pipeline.clone();
            let input = PathBuf::from(&job.input_path);
            let run_token = token.clone();
            let result = tokio::task::spawn_blocking(move || {
                pipeline.run(&input, &reporter, &run_token)
            })
            .await;

            *inner.active.lock() = None;

            match result {
                Ok(Ok(outcome)) => inner.settle_success(&job.id, outcome),
                Ok(Err(PipelineError::Cancelled)) => inner.settle_cancelled(&job.id),
                Ok(Err(err)) => inner.settle_failed(&job.id, err.to_string()),
                Err(join_err) => {
                    error!(job_id = %job.id, error = %join_err, "conversion task did not complete");
                    inner.settle_failed(&job.id, format!("conversion task panicked: {join_err}"));
                }
            }
        }
    }

    fn take_next_pending(&self) -> Option<Job> {
        let mut jobs = self.jobs.lock();
        jobs.iter_mut()
            .find(|job| job.status == JobStatus::Pending)
            .map(|job| {
                job.status = JobStatus::Processing;
                job.clone()
            })
    }

    fn has_pending(&self) -> bool {
        self.jobs
            .lock()
            .iter()
            .any(|job| job.status == JobStatus::Pending)
    }

    fn update_job(&self, id: &str, update: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            update(job);
        }
    }

    fn settle_success(&self, job_id: &str, outcome: PipelineOutcome) {
        let output_path = outcome.output_path.to_string_lossy().into_owned();
        self.update_job(job_id, |job| {
            job.status = JobStatus::Success;
            job.output_path = Some(output_path.clone());
            job.progress = None;
        });
        info!(job_id, output = %output_path, "job complete");
        let _ = self.events.send(QueueEvent::JobComplete {
            job_id: job_id.to_string(),
            output_path,
            files_skipped: outcome.stats.files_skipped,
        });
    }

    fn settle_failed(&self, job_id: &str, error: String) {
        self.update_job(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.clone());
            job.progress = None;
        });
        warn!(job_id, error = %error, "job failed");
        let _ = self.events.send(QueueEvent::JobFailed {
            job_id: job_id.to_string(),
            error,
        });
    }

    fn settle_cancelled(&self, job_id: &str) {
        let error = PipelineError::Cancelled.to_string();
        self.update_job(job_id, |job| {
            job.status = JobStatus::Cancelled;
            job.error = Some(error.clone());
            job.progress = None;
        });
        info!(job_id, "job cancelled");
        let _ = self.events.send(QueueEvent::JobFailed {
            job_id: job_id.to_string(),
            error,
        });
    }
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
