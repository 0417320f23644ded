//! catrack-algorithms: Cellular-automaton track finding.
//!
//! This crate provides the pattern-recognition stages:
//! - **Connectors** - which sectors may hold the inner hit of a segment
//! - **Criteria** - pairwise compatibility tests between adjacent segments
//! - **Segment graph** - segments as nodes, compatible pairs as edges
//! - **Automaton** - double-buffered state propagation and chain extraction
//! - **Overlap** - hit-sharing conflicts between candidates
//!
#![warn(missing_docs)]

mod automaton;
mod builder;
pub mod connector;
pub mod criteria;
mod overlap;
mod processing;
pub mod segment;

pub use automaton::{AutomatonConfig, CellularAutomaton, PropagationReport};
pub use builder::{BuildStatistics, BuiltGraph, DiagnosticRecord, GraphBuilder};
pub use connector::{AngularConnector, ConnectorConfig, PlanarConnector, SectorConnector};
pub use criteria::{
    CircleDistanceToOrigin, CriteriaConfig, Criterion, Diagnostics, PtWindow, RequiredHits,
    RzRatioChange, Window,
};
pub use overlap::ConflictMatrix;
pub use processing::{EventResult, FinderConfig, TrackFinder};
pub use segment::{Segment, SegmentGraph, SegmentId};
