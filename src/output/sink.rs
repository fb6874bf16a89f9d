//! Append-only compressed record stream
//!
//! Records are written as one JSON object per line into a gzip member.
//! Each run appends its own member; readers decode the file with a
//! multi-member gzip decoder.

use crate::record::ContentRecord;
use crate::source::PageId;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// File name of the record stream inside the output directory
pub const OUTPUT_FILE_NAME: &str = "poems.jsonl.gz";

/// Errors raised while writing the record stream
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Writes validated records and enforces the structure deduplication rule
///
/// `collection_structure` survives only on the first structure-bearing record
/// seen for each collection in this run; every other record is written with
/// it set to null.
pub struct SinkWriter<W: Write = BufWriter<File>> {
    encoder: GzEncoder<W>,
    structures_emitted: HashSet<PageId>,
    records_written: u64,
}

impl SinkWriter {
    /// Opens the stream at `path` for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SinkWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            encoder: GzEncoder::new(writer, Compression::default()),
            structures_emitted: HashSet::new(),
            records_written: 0,
        }
    }

    /// Appends one record; returns whether it kept its structure
    pub fn emit(&mut self, mut record: ContentRecord) -> Result<bool, SinkError> {
        let keeps_structure = match record.collection_page_id {
            Some(collection) if record.collection_structure.is_some() => {
                self.structures_emitted.insert(collection)
            }
            _ => false,
        };
        if !keeps_structure {
            record.collection_structure = None;
        }

        serde_json::to_writer(&mut self.encoder, &record)?;
        self.encoder.write_all(b"\n")?;
        self.records_written += 1;

        Ok(keeps_structure)
    }

    /// Pushes everything written so far down to the underlying writer
    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.encoder.flush()?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Writes the gzip trailer and returns the underlying writer
    pub fn finish(self) -> Result<W, SinkError> {
        let mut writer = self.encoder.finish()?;
        writer.flush()?;
        Ok(writer)
    }
}
