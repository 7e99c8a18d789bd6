//! Error taxonomy for conversion runs.
//!
//! Only job-fatal errors live here: anything that aborts the remaining phases
//! of a run and surfaces as a `job-failed` event. Per-entry decode/encode
//! failures are deliberately not part of this enum; they are recorded as
//! skipped entries by the pipeline and never propagate (see
//! [`crate::convert::ConvertError`]).

use std::path::PathBuf;

use thiserror::Error;

/// Job-fatal pipeline error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input archive could not be opened at the filesystem level.
    #[error("failed to open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a valid zip container, or an entry could not be read.
    #[error("corrupt zip archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),

    /// The output archive could not be created, written or finalized.
    #[error("failed to write output archive: {0}")]
    Write(String),

    /// The run observed a cancellation request at a suspension point.
    ///
    /// Reported through the failure channel, but the message is kept distinct
    /// so the consumer can tell it apart from a real failure.
    #[error("cancelled by user")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn write(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Write(format!("{context}: {err}"))
    }
}
