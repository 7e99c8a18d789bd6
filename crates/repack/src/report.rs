//! Conversion report appended to every successful output archive.
//!
//! `report.json` records what happened to each entry so the user can audit a
//! converted archive after the fact. The skip records also back the
//! `filesSkipped` count on the `job-complete` event.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Entry name under which the report is stored, at the archive root.
pub const REPORT_ENTRY_NAME: &str = "report.json";

/// Aggregate counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    /// Every entry seen during scanning, directories included.
    pub files_scanned: usize,
    /// Entries written to the output archive (report excluded).
    pub files_included: usize,
    /// Image entries re-encoded as JPEG.
    pub files_converted: usize,
    /// Entries that could not be converted and were passed through unchanged.
    pub files_skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversionRecord {
    original_path: String,
    output_path: String,
    original_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkippedRecord {
    path: String,
    reason: String,
}

/// Accumulates per-entry outcomes during a run and serializes to
/// [`REPORT_ENTRY_NAME`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversionReport {
    engine_version: String,
    timestamp: String,
    input_zip: String,
    stats: ReportStats,
    conversions: Vec<ConversionRecord>,
    skipped: Vec<SkippedRecord>,
}

impl ConversionReport {
    pub fn new(input_zip: impl Into<String>) -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: String::new(),
            input_zip: input_zip.into(),
            stats: ReportStats::default(),
            conversions: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record_scanned(&mut self) {
        self.stats.files_scanned += 1;
    }

    pub fn record_converted(
        &mut self,
        original_path: impl Into<String>,
        output_path: impl Into<String>,
        original_format: impl Into<String>,
    ) {
        self.conversions.push(ConversionRecord {
            original_path: original_path.into(),
            output_path: output_path.into(),
            original_format: original_format.into(),
        });
        self.stats.files_included += 1;
        self.stats.files_converted += 1;
    }

    /// An entry written to the output without conversion (passthrough or
    /// copy-as-is).
    pub fn record_included(&mut self) {
        self.stats.files_included += 1;
    }

    pub fn record_skipped(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedRecord {
            path: path.into(),
            reason: reason.into(),
        });
        self.stats.files_skipped += 1;
    }

    pub fn stats(&self) -> ReportStats {
        self.stats
    }

    /// Serialize with the current timestamp, ready to be written as the final
    /// archive entry.
    pub fn to_json(&mut self) -> Result<String, PipelineError> {
        self.timestamp = Utc::now().to_rfc3339();
        serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::write("failed to serialize report", e))
    }
}
