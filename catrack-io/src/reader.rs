//! Memory-mapped hit file readers.
//!

use crate::{Error, Result};
use catrack_core::{AngularCoord, HitData, PlanarCoord, Position};
use memmap2::Mmap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file contents as UTF-8 text.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the file is not valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes())
            .map_err(|e| Error::InvalidFormat(format!("{}: {e}", self.path.display())))
    }

    /// Returns the path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

/// Detector coordinate columns of a hit CSV row.
pub trait CoordColumns: Copy + Send + Sync + Sized {
    /// Column names following `event,x,y,z`.
    const COLUMNS: &'static [&'static str];

    /// Parses the coordinate from its columns.
    ///
    /// Negative values are rejected here; range checks against a geometry
    /// happen at classification.
    ///
    /// # Errors
    /// Returns a message for a wrong field count or the first unparsable
    /// field.
    fn parse(fields: &[&str]) -> std::result::Result<Self, String>;
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> std::result::Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {name} '{}'", value.trim()))
}

fn check_count(columns: &[&str], fields: &[&str]) -> std::result::Result<(), String> {
    if fields.len() != columns.len() {
        return Err(format!(
            "expected {} coordinate fields, found {}",
            columns.len(),
            fields.len()
        ));
    }
    Ok(())
}

impl CoordColumns for PlanarCoord {
    const COLUMNS: &'static [&'static str] = &["side", "layer", "module", "sensor"];

    fn parse(fields: &[&str]) -> std::result::Result<Self, String> {
        check_count(Self::COLUMNS, fields)?;
        Ok(PlanarCoord::new(
            parse_field("side", fields[0])?,
            parse_field("layer", fields[1])?,
            parse_field("module", fields[2])?,
            parse_field("sensor", fields[3])?,
        ))
    }
}

impl CoordColumns for AngularCoord {
    const COLUMNS: &'static [&'static str] = &["layer", "phi", "theta"];

    fn parse(fields: &[&str]) -> std::result::Result<Self, String> {
        check_count(Self::COLUMNS, fields)?;
        Ok(AngularCoord::new(
            parse_field("layer", fields[0])?,
            parse_field("phi", fields[1])?,
            parse_field("theta", fields[2])?,
        ))
    }
}

/// Hits of one event, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<C> {
    /// Event id from the `event` column.
    pub id: u64,
    /// Hits; indices into this vector are the hit indices of the event.
    pub hits: Vec<HitData<C>>,
}

/// Returns the expected header for coordinate type `C`.
#[must_use]
pub fn header<C: CoordColumns>() -> String {
    let mut columns = vec!["event", "x", "y", "z"];
    columns.extend_from_slice(C::COLUMNS);
    columns.join(",")
}

fn is_skipped(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

fn parse_row<C: CoordColumns>(number: usize, line: &str) -> Result<(u64, HitData<C>)> {
    let fields: Vec<&str> = line.split(',').collect();
    let expected = 4 + C::COLUMNS.len();
    let parse_error = |message: String| Error::Parse {
        line: number,
        message,
    };
    if fields.len() != expected {
        return Err(parse_error(format!(
            "expected {expected} fields, found {}",
            fields.len()
        )));
    }

    let event: u64 = parse_field("event", fields[0]).map_err(parse_error)?;
    let x: f64 = parse_field("x", fields[1]).map_err(parse_error)?;
    let y: f64 = parse_field("y", fields[2]).map_err(parse_error)?;
    let z: f64 = parse_field("z", fields[3]).map_err(parse_error)?;
    let coord = C::parse(&fields[4..]).map_err(parse_error)?;
    Ok((event, HitData::new(Position::new(x, y, z), coord)))
}

/// Parses hit CSV text into events.
///
/// Blank lines and lines starting with `#` are ignored. The first remaining
/// line must be the header for `C`. Rows of one event need not be
/// contiguous; events come out in ascending id with hits in file order.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] for a missing or wrong header and
/// [`Error::Parse`] for the first malformed row.
pub fn parse_events<C: CoordColumns>(text: &str) -> Result<Vec<Event<C>>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !is_skipped(line));

    let expected = header::<C>();
    match lines.next() {
        Some((_, found)) => {
            let found: Vec<String> = found.split(',').map(|f| f.trim().to_lowercase()).collect();
            if found.join(",") != expected {
                return Err(Error::InvalidFormat(format!(
                    "expected header '{expected}', found '{}'",
                    found.join(",")
                )));
            }
        }
        None => return Err(Error::InvalidFormat("missing header line".to_string())),
    }

    let rows: Vec<(usize, &str)> = lines.collect();
    let parsed: Vec<(u64, HitData<C>)> = rows
        .par_iter()
        .map(|&(number, line)| parse_row::<C>(number, line))
        .collect::<Result<_>>()?;

    let mut events: BTreeMap<u64, Vec<HitData<C>>> = BTreeMap::new();
    for (event, hit) in parsed {
        events.entry(event).or_default().push(hit);
    }
    Ok(events
        .into_iter()
        .map(|(id, hits)| Event { id, hits })
        .collect())
}

/// A hit CSV file reader with memory-mapped I/O.
pub struct HitFileReader {
    reader: MappedFileReader,
}

impl HitFileReader {
    /// Opens a hit file for reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: MappedFileReader::open(path)?,
        })
    }

    /// Returns the underlying mapped file.
    #[must_use]
    pub fn file(&self) -> &MappedFileReader {
        &self.reader
    }

    /// Reads every event in the file.
    ///
    /// # Errors
    /// Returns the first format or parse error.
    pub fn read_events<C: CoordColumns>(&self) -> Result<Vec<Event<C>>> {
        let events = parse_events(self.reader.as_str()?)?;
        log::info!(
            "read {} hits in {} events from {}",
            events.iter().map(|e| e.hits.len()).sum::<usize>(),
            events.len(),
            self.reader.path().display()
        );
        Ok(events)
    }
}
