//! catrack-io: File I/O for catrack.
//!
//! This crate provides memory-mapped reading of hit CSV files via memmap2,
//! CSV output of track candidates, JSON output of criterion diagnostics and
//! JSON run configuration.
//!

pub mod config;
mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{header, parse_events, CoordColumns, Event, HitFileReader, MappedFileReader};
pub use writer::{DiagnosticFileWriter, TrackFileWriter};
