//! Adapters over the zip container: a random-access reader for the input
//! archive and an order-preserving writer for the output archive.

mod reader;
mod writer;

pub use reader::{ArchiveReader, EntryInfo};
pub use writer::ArchiveWriter;
