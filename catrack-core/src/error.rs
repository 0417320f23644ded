//! Error types for catrack-core.

use thiserror::Error;

/// Result type alias for catrack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for catrack operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A detector coordinate is negative or not below its configured bound.
    #[error("{field} out of range: {value} (valid range is 0..{bound})")]
    CoordinateOutOfRange {
        /// Name of the offending coordinate field.
        field: &'static str,
        /// The value that was supplied.
        value: i64,
        /// Exclusive upper bound for the field.
        bound: u32,
    },

    /// A sector id exceeds the maximum sector of the geometry.
    #[error("sector {sector} out of range (sector max is {max})")]
    SectorOutOfRange {
        /// The offending sector id.
        sector: u32,
        /// Largest valid sector id.
        max: u32,
    },

    /// A criterion received segments with the wrong number of hits.
    #[error(
        "criterion {criterion} needs {expected_parent}+{expected_child} hits, \
         got {parent}+{child}"
    )]
    BadSegmentLength {
        /// Name of the criterion.
        criterion: &'static str,
        /// Hits the criterion requires in the parent segment.
        expected_parent: usize,
        /// Hits the criterion requires in the child segment.
        expected_child: usize,
        /// Hits found in the parent segment.
        parent: usize,
        /// Hits found in the child segment.
        child: usize,
    },

    /// Geometry configuration cannot describe a detector.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A segment id does not refer to a live segment.
    #[error("invalid segment id: {0}")]
    InvalidSegment(usize),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
