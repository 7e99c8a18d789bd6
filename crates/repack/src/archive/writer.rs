//! Write adapter building the output zip archive.
//!
//! The writer stages into a sibling `.part` file and renames to the final
//! path on [`ArchiveWriter::finish`]. Any other exit (error, cancellation,
//! panic unwinding) drops the writer and removes the stage file, so a
//! half-written output archive is never left behind.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PipelineError;

pub struct ArchiveWriter {
    writer: Option<ZipWriter<File>>,
    stage_path: PathBuf,
    final_path: PathBuf,
    finalized: bool,
}

impl ArchiveWriter {
    /// Create the staging file next to the intended output path.
    pub fn create(final_path: &Path) -> Result<Self, PipelineError> {
        let stage_path = stage_path_for(final_path);
        let file = File::create(&stage_path).map_err(|e| {
            PipelineError::write(
                &format!("failed to create {}", stage_path.display()),
                e,
            )
        })?;
        Ok(Self {
            writer: Some(ZipWriter::new(file)),
            stage_path,
            final_path: final_path.to_path_buf(),
            finalized: false,
        })
    }

    /// Append one entry. Entries appear in the output archive in exactly the
    /// order they are written.
    pub fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PipelineError::Write("writer already finalized".to_string()));
        };
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer
            .start_file(name, options)
            .map_err(|e| PipelineError::write(&format!("failed to start entry {name}"), e))?;
        writer
            .write_all(bytes)
            .map_err(|e| PipelineError::write(&format!("failed to write entry {name}"), e))?;
        Ok(())
    }

    /// Flush the central directory and move the archive to its final path.
    pub fn finish(mut self) -> Result<PathBuf, PipelineError> {
        if let Some(writer) = self.writer.take() {
            writer
                .finish()
                .map_err(|e| PipelineError::write("failed to finalize archive", e))?;
        }
        fs::rename(&self.stage_path, &self.final_path).map_err(|e| {
            PipelineError::write(
                &format!("failed to move archive to {}", self.final_path.display()),
                e,
            )
        })?;
        self.finalized = true;
        debug!(path = %self.final_path.display(), "output archive finalized");
        Ok(self.final_path.clone())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if !self.finalized {
            // Close the file handle before unlinking; required on Windows.
            drop(self.writer.take());
            let _ = fs::remove_file(&self.stage_path);
        }
    }
}

fn stage_path_for(final_path: &Path) -> PathBuf {
    let mut os: OsString = final_path.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_entries_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.zip");

        let mut writer = ArchiveWriter::create(&out).unwrap();
        writer.write_entry("z.jpg", b"zzz").unwrap();
        writer.write_entry("a.jpg", b"aaa").unwrap();
        writer.write_entry("m/n.jpg", b"mn").unwrap();
        let path = writer.finish().unwrap();
        assert_eq!(path, out);
        assert!(out.exists());
        assert!(!dir.path().join("out.zip.part").exists());

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["z.jpg", "a.jpg", "m/n.jpg"]);
    }

    #[test]
    fn dropping_without_finish_discards_the_stage_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.zip");
        {
            let mut writer = ArchiveWriter::create(&out).unwrap();
            writer.write_entry("a.jpg", b"aaa").unwrap();
            assert!(dir.path().join("out.zip.part").exists());
        }
        assert!(!dir.path().join("out.zip.part").exists());
        assert!(!out.exists());
    }

    #[test]
    fn create_fails_cleanly_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("no/such/dir/out.zip");
        let err = ArchiveWriter::create(&out).err().unwrap();
        assert!(matches!(err, PipelineError::Write(_)));
    }
}
