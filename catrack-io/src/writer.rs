//! File writers for track candidates and criterion diagnostics.

use crate::Result;
use catrack_algorithms::{DiagnosticRecord, Diagnostics, EventResult};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Writer for extracted track candidates as CSV.
///
/// One row per candidate: `event,track,hits,length,conflicts`, with hit
/// indices and conflicting track indices joined by `;`.
pub struct TrackFileWriter {
    writer: BufWriter<File>,
    rows: usize,
}

impl TrackFileWriter {
    /// Creates the file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "event,track,hits,length,conflicts")?;
        Ok(Self { writer, rows: 0 })
    }

    /// Writes every candidate of one event.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_event(&mut self, event: u64, result: &EventResult) -> Result<()> {
        for (track, candidate) in result.candidates.iter().enumerate() {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                event,
                track,
                join(candidate.iter()),
                candidate.len(),
                join(result.conflicts.conflicts_of(track))
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Number of candidate rows written.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct DiagnosticRow<'a> {
    event: u64,
    criterion: &'a str,
    parent: usize,
    child: usize,
    accepted: bool,
    values: &'a Diagnostics,
}

/// Streaming writer for criterion diagnostics as a JSON array.
///
/// Call [`Self::finish`] to close the array.
pub struct DiagnosticFileWriter {
    writer: BufWriter<File>,
    records: usize,
}

impl DiagnosticFileWriter {
    /// Creates the file and opens the array.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"[")?;
        Ok(Self { writer, records: 0 })
    }

    /// Appends the records of one event.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write_event(&mut self, event: u64, records: &[DiagnosticRecord]) -> Result<()> {
        for record in records {
            if self.records > 0 {
                self.writer.write_all(b",")?;
            }
            self.writer.write_all(b"\n  ")?;
            let row = DiagnosticRow {
                event,
                criterion: record.criterion,
                parent: record.parent.index(),
                child: record.child.index(),
                accepted: record.accepted,
                values: &record.values,
            };
            serde_json::to_writer(&mut self.writer, &row)?;
            self.records += 1;
        }
        Ok(())
    }

    /// Number of records written.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Closes the array and flushes.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.write_all(b"\n]\n")?;
        self.writer.flush()?;
        Ok(self.records)
    }
}
