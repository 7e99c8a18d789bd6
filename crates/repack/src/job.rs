//! Job records and progress payloads.
//!
//! Wire shapes match what the UI layer consumes: camelCase field names,
//! lowercase status and phase tags.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a job.
///
/// Transitions are one-directional: `Pending -> Processing` and
/// `Processing -> {Success, Failed, Cancelled}`. The three outcomes are
/// terminal; a job never re-enters `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue.
    Pending,
    /// Currently driven by the pipeline. At most one job is in this state.
    Processing,
    /// Completed with an output archive.
    Success,
    /// Aborted by a job-fatal error.
    Failed,
    /// Stopped by a cancellation request.
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal. Terminal jobs are eligible for
    /// `clear_finished` removal and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

/// Pipeline phase of the active job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Scanning,
    Converting,
    Packaging,
}

/// Progress snapshot for the active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 1-based count of image entries handled so far in the current phase;
    /// 0 while scanning.
    pub current_file: usize,
    /// Number of image entries detected during scanning. Stable for the
    /// remainder of the job once scanning completes.
    pub total_files: usize,
    /// Name of the entry currently being handled; empty while scanning and
    /// packaging.
    pub current_filename: String,
    pub phase: Phase,
}

/// One entry of the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique id, generated at enqueue time.
    pub id: String,
    /// Absolute path to the input `.zip`.
    pub input_path: String,
    pub status: JobStatus,
    /// Present only while the job is processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Set on failure or cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(input_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input_path,
            status: JobStatus::Pending,
            progress: None,
            output_path: None,
            error: None,
        }
    }
}
