//! Hit traits and types for tracking detector measurements.

use crate::sector::{AngularCoord, PlanarCoord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cartesian position of a measurement, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate (along the beam axis).
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance from the beam axis.
    #[inline]
    #[must_use]
    pub fn perp(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Squared transverse (x-y plane) distance to another position.
    #[inline]
    #[must_use]
    pub fn perp_distance_squared(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Signed longitudinal distance to another position.
    #[inline]
    #[must_use]
    pub fn dz(&self, other: &Self) -> f64 {
        self.z - other.z
    }
}

/// Trait for hits consumed by the track finder.
///
/// Hits are owned by the caller's event store. The finder only reads the
/// position and the detector coordinate used for sector classification.
pub trait Hit: Send + Sync {
    /// Detector coordinate type (one per geometry family).
    type Coord: Copy;

    /// Returns the measured position.
    fn position(&self) -> Position;

    /// Returns the detector coordinate the hit was recorded in.
    fn coord(&self) -> Self::Coord;

    /// Returns the x coordinate.
    #[inline]
    fn x(&self) -> f64 {
        self.position().x
    }

    /// Returns the y coordinate.
    #[inline]
    fn y(&self) -> f64 {
        self.position().y
    }

    /// Returns the z coordinate.
    #[inline]
    fn z(&self) -> f64 {
        self.position().z
    }
}

/// Plain hit record: a position plus a detector coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitData<C> {
    /// Measured position.
    pub position: Position,
    /// Detector coordinate.
    pub coord: C,
}

impl<C> HitData<C> {
    /// Creates a new hit.
    #[inline]
    pub fn new(position: Position, coord: C) -> Self {
        Self { position, coord }
    }
}

impl<C: Copy + Send + Sync> Hit for HitData<C> {
    type Coord = C;

    #[inline]
    fn position(&self) -> Position {
        self.position
    }

    #[inline]
    fn coord(&self) -> C {
        self.coord
    }
}

/// Hit from a planar (side, layer, module, sensor) detector.
pub type PlanarHit = HitData<PlanarCoord>;

/// Hit from an angular (layer, phi, theta) detector.
pub type AngularHit = HitData<AngularCoord>;
