//! catrack-core: Core types for cellular-automaton track finding.
//!
//! This crate provides the foundational pieces shared by the track finder:
//! hit and position types, the sector address systems that map detector
//! coordinates to dense integer ids, circle geometry used by the
//! compatibility criteria, and the extracted track candidate type.
//!

pub mod error;
pub mod geometry;
pub mod hit;
pub mod sector;
pub mod track;

pub use error::{Error, Result};
pub use geometry::{fit_circle, pt_from_radius, radius_from_pt, Circle, PT_PER_TESLA_CM};
pub use hit::{AngularHit, Hit, HitData, PlanarHit, Position};
pub use sector::{
    AngularCoord, AngularSectors, GeometryConfig, PlanarCoord, PlanarSectors, Sector, SectorSystem,
    PLANAR_SIDES,
};
pub use track::TrackCandidate;
