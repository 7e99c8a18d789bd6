//! Three-phase conversion pipeline for one job.
//!
//! Scanning opens the archive and counts image entries; converting decodes
//! and re-encodes them one at a time with a progress event per entry;
//! packaging writes the output archive next to the input. Cancellation is
//! cooperative: the token is polled at phase boundaries and between entries
//! of the converting phase, never mid-entry.
//!
//! The run executes synchronously and is expected to be driven from a
//! blocking context (`spawn_blocking` in the queue driver).

use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::{ArchiveReader, ArchiveWriter, EntryInfo};
use crate::collision::CollisionMap;
use crate::convert::{self, Converted, ImageConverter};
use crate::error::PipelineError;
use crate::events::ProgressReporter;
use crate::job::{Phase, Progress};
use crate::report::{ConversionReport, REPORT_ENTRY_NAME, ReportStats};

/// Result of a successful run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub output_path: PathBuf,
    pub stats: ReportStats,
}

/// Where an output entry's bytes come from during packaging.
enum Source {
    /// Converted JPEG, staged on disk during the converting phase.
    Staged(PathBuf),
    /// Copied from the input archive entry at this index.
    Input(usize),
}

struct PlannedEntry {
    name: String,
    source: Source,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionPipeline {
    converter: ImageConverter,
}

impl ConversionPipeline {
    pub fn new() -> Self {
        Self {
            converter: ImageConverter::new(),
        }
    }

    pub fn with_converter(converter: ImageConverter) -> Self {
        Self { converter }
    }

    /// Run all three phases for `input`.
    ///
    /// Returns the output path and run statistics on success. Any error
    /// aborts the remaining phases; [`PipelineError::Cancelled`] means a
    /// cancellation request was observed at a suspension point. In both
    /// cases no partial output file is left behind.
    pub fn run(
        &self,
        input: &Path,
        reporter: &ProgressReporter,
        token: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Phase 1: scanning.
        let mut reader = ArchiveReader::open(input)?;
        let mut report = ConversionReport::new(
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown.zip".to_string()),
        );

        let files: Vec<EntryInfo> = reader
            .list()?
            .into_iter()
            .inspect(|_| report.record_scanned())
            .filter(|entry| !entry.is_dir)
            .collect();
        let total_images = files
            .iter()
            .filter(|entry| ImageConverter::is_image(&entry.name))
            .count();

        info!(
            input = %input.display(),
            entries = files.len(),
            images = total_images,
            "scan complete"
        );
        reporter.report(Progress {
            current_file: 0,
            total_files: total_images,
            current_filename: String::new(),
            phase: Phase::Scanning,
        });
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Phase 2: converting. Converted bytes are staged on disk so memory
        // use stays bounded by one entry at a time; passthrough entries are
        // re-read from the input archive during packaging.
        let staging = tempfile::Builder::new()
            .prefix("repack-")
            .tempdir()
            .map_err(|e| PipelineError::write("failed to create staging directory", e))?;
        let mut names = CollisionMap::new();
        // The report entry always wins its name; a colliding input entry is
        // the one that gets renamed.
        let report_entry_name = names.claim(REPORT_ENTRY_NAME);

        let mut planned: Vec<PlannedEntry> = Vec::with_capacity(files.len());
        let mut images_seen = 0usize;

        for entry in &files {
            if !ImageConverter::is_image(&entry.name) {
                planned.push(PlannedEntry {
                    name: names.claim(&entry.name),
                    source: Source::Input(entry.index),
                });
                report.record_included();
                continue;
            }

            if token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            images_seen += 1;
            reporter.report(Progress {
                current_file: images_seen,
                total_files: total_images,
                current_filename: entry.name.clone(),
                phase: Phase::Converting,
            });

            let bytes = reader.read(entry.index)?;
            match self.converter.convert(&entry.name, &bytes) {
                Ok(Converted::CopiedAsIs) => {
                    planned.push(PlannedEntry {
                        name: names.claim(&entry.name),
                        source: Source::Input(entry.index),
                    });
                    report.record_included();
                }
                Ok(Converted::ToJpeg {
                    jpeg,
                    original_format,
                }) => {
                    let output_name = names.claim(&convert::jpeg_entry_name(&entry.name));
                    let stage_file = staging.path().join(format!("{:06}.jpg", entry.index));
                    fs::write(&stage_file, &jpeg).map_err(|e| {
                        PipelineError::write("failed to stage converted entry", e)
                    })?;
                    report.record_converted(&entry.name, &output_name, original_format);
                    planned.push(PlannedEntry {
                        name: output_name,
                        source: Source::Staged(stage_file),
                    });
                }
                Err(err) => {
                    // Local failure: keep the original bytes so nothing is
                    // lost, count the entry as skipped and move on.
                    warn!(entry = %entry.name, error = %err, "conversion skipped, passing entry through");
                    report.record_skipped(&entry.name, err.to_string());
                    planned.push(PlannedEntry {
                        name: names.claim(&entry.name),
                        source: Source::Input(entry.index),
                    });
                    report.record_included();
                }
            }
        }

        // Phase 3: packaging.
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        reporter.report(Progress {
            current_file: total_images,
            total_files: total_images,
            current_filename: String::new(),
            phase: Phase::Packaging,
        });

        let output_path = reserve_output_path(input);
        let mut writer = ArchiveWriter::create(&output_path)?;
        for entry in &planned {
            let bytes = match &entry.source {
                Source::Staged(path) => fs::read(path)
                    .map_err(|e| PipelineError::write("failed to read staged entry", e))?,
                Source::Input(index) => reader.read(*index)?,
            };
            writer.write_entry(&entry.name, &bytes)?;
        }
        writer.write_entry(&report_entry_name, report.to_json()?.as_bytes())?;
        let output_path = writer.finish()?;

        let stats = report.stats();
        info!(
            output = %output_path.display(),
            converted = stats.files_converted,
            skipped = stats.files_skipped,
            "job packaged"
        );
        Ok(PipelineOutcome { output_path, stats })
    }
}

/// Deterministic output path: same directory and base name as the input, a
/// `-converted` suffix, and a numeric counter when that file already exists.
fn reserve_output_path(input: &Path) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let mut candidate = dir.join(format!("{stem}-converted.zip"));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-converted-{n}.zip"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_sits_next_to_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photos.zip");
        assert_eq!(
            reserve_output_path(&input),
            dir.path().join("photos-converted.zip")
        );
    }

    #[test]
    fn output_path_steps_around_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photos.zip");
        fs::write(dir.path().join("photos-converted.zip"), b"x").unwrap();
        assert_eq!(
            reserve_output_path(&input),
            dir.path().join("photos-converted-1.zip")
        );
        fs::write(dir.path().join("photos-converted-1.zip"), b"x").unwrap();
        assert_eq!(
            reserve_output_path(&input),
            dir.path().join("photos-converted-2.zip")
        );
    }
}
