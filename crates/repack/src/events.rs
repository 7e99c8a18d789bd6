//! Outbound event channel between the queue and its consumer.
//!
//! The queue owns a single unbounded channel; the UI (or CLI) holds the
//! receiving half. Progress events are emitted while a run is active, and a
//! completion or failure event is always the last event observed for a job.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::job::{Job, Progress};

/// Event emitted by the queue and its active pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum QueueEvent {
    /// Progress snapshot for the active job.
    #[serde(rename = "processing-progress")]
    Progress(Progress),

    /// Emitted once per successful job.
    #[serde(rename = "job-complete")]
    #[serde(rename_all = "camelCase")]
    JobComplete {
        job_id: String,
        output_path: String,
        /// Entries that could not be converted and were passed through
        /// unchanged.
        files_skipped: usize,
    },

    /// Emitted once per failed or cancelled job. Cancellation reads as
    /// "cancelled by user".
    #[serde(rename = "job-failed")]
    #[serde(rename_all = "camelCase")]
    JobFailed { job_id: String, error: String },
}

pub type EventSender = mpsc::UnboundedSender<QueueEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<QueueEvent>;

/// Create the queue's outbound channel.
pub(crate) fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Progress outlet handed to a pipeline run for the duration of one job.
///
/// Each report updates the job's record in the shared table and forwards the
/// snapshot on the event channel. The reporter is dropped when the run ends;
/// the pipeline never retains a reference to the job afterwards.
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: String,
    jobs: Arc<Mutex<Vec<Job>>>,
    tx: EventSender,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: String, jobs: Arc<Mutex<Vec<Job>>>, tx: EventSender) -> Self {
        Self { job_id, jobs, tx }
    }

    /// Reporter that is not bound to a queue; progress events still flow to
    /// the returned receiver. Useful for driving the pipeline directly.
    pub fn standalone() -> (Self, EventReceiver) {
        let (tx, rx) = channel();
        (
            Self::new(String::new(), Arc::new(Mutex::new(Vec::new())), tx),
            rx,
        )
    }

    pub fn report(&self, progress: Progress) {
        {
            let mut jobs = self.jobs.lock();
            if let Some(job) = jobs.iter_mut().find(|j| j.id == self.job_id) {
                job.progress = Some(progress.clone());
            }
        }
        let _ = self.tx.send(QueueEvent::Progress(progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Phase;

    #[test]
    fn events_serialize_with_wire_names() {
        let event = QueueEvent::Progress(Progress {
            current_file: 1,
            total_files: 3,
            current_filename: "a.png".to_string(),
            phase: Phase::Converting,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "processing-progress");
        assert_eq!(value["payload"]["currentFilename"], "a.png");

        let event = QueueEvent::JobComplete {
            job_id: "j1".to_string(),
            output_path: "/out/a-converted.zip".to_string(),
            files_skipped: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "job-complete");
        assert_eq!(value["payload"]["jobId"], "j1");
        assert_eq!(value["payload"]["filesSkipped"], 1);

        let event = QueueEvent::JobFailed {
            job_id: "j2".to_string(),
            error: "cancelled by user".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "job-failed");
        assert_eq!(value["payload"]["error"], "cancelled by user");
    }
}
