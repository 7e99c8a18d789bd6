//! Read adapter over an input zip archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::PipelineError;

/// Metadata for one archive entry, captured during listing.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Position in the central directory; stable for the life of the reader.
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Opens a zip archive, lists entries and streams entry bytes.
#[derive(Debug)]
pub struct ArchiveReader {
    archive: ZipArchive<File>,
}

impl ArchiveReader {
    /// Open `path` as a zip archive.
    ///
    /// Fails with [`PipelineError::ArchiveOpen`] when the file cannot be
    /// opened and [`PipelineError::CorruptArchive`] when it is not a valid
    /// zip container (truncated header, not a zip, ...).
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|source| PipelineError::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = ZipArchive::new(file)?;
        Ok(Self { archive })
    }

    /// List all entries in central-directory order.
    pub fn list(&mut self) -> Result<Vec<EntryInfo>, PipelineError> {
        (0..self.archive.len())
            .map(|index| {
                let entry = self.archive.by_index(index)?;
                Ok(EntryInfo {
                    index,
                    name: entry.name().to_string(),
                    size: entry.size(),
                    is_dir: entry.is_dir(),
                })
            })
            .collect()
    }

    /// Read the full content of the entry at `index`.
    pub fn read(&mut self, index: usize) -> Result<Vec<u8>, PipelineError> {
        let mut entry = self.archive.by_index(index)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| PipelineError::CorruptArchive(zip::result::ZipError::Io(e)))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_zip(entries: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("input.zip")).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        dir
    }

    #[test]
    fn lists_entries_in_order_and_reads_bytes() {
        let dir = fixture_zip(&[("b.txt", b"bee"), ("a.txt", b"ay")]);
        let mut reader = ArchiveReader::open(&dir.path().join("input.zip")).unwrap();

        let entries = reader.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "b.txt");
        assert_eq!(entries[1].name, "a.txt");
        assert_eq!(entries[0].size, 3);
        assert!(!entries[0].is_dir);

        assert_eq!(reader.read(entries[1].index).unwrap(), b"ay");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveReader::open(&dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveOpen { .. }));
    }

    #[test]
    fn truncated_header_is_a_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"PK\x03\x04 not actually a zip").unwrap();
        let err = ArchiveReader::open(&path).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptArchive(_)));
    }
}
