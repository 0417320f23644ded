//! Sector addressing: dense integer ids for detector regions.
//!
//! Two geometry families are supported:
//!
//! - **Planar** detectors address a region by `(side, layer, module, sensor)`.
//!   Sector ids are mixed-radix with the side most significant:
//!   `((side * layers + layer) * modules + module) * sensors + sensor`.
//! - **Angular** detectors address a region by `(layer, phi, theta)`.
//!   Sector ids are mixed-radix with the layer least significant:
//!   `layer + layers * (phi + phi_divisions * theta)`.
//!
//! Both families validate every coordinate on encode and every sector id on
//! decode.

use crate::error::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of detector sides in the planar family.
pub const PLANAR_SIDES: u32 = 2;

/// Dense integer id of a detector region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sector(pub u32);

impl Sector {
    /// Creates a sector id.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the id as a vector index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bijective mapping between detector coordinates and sector ids.
pub trait SectorSystem: Send + Sync {
    /// Coordinate tuple addressed by this system.
    type Coord: Copy + Eq + fmt::Debug + Send + Sync;

    /// Largest valid sector id.
    fn sector_max(&self) -> Sector;

    /// Number of detector layers.
    fn num_layers(&self) -> u32;

    /// Encodes a coordinate tuple.
    ///
    /// # Errors
    /// Returns [`Error::CoordinateOutOfRange`] if any field is not below its bound.
    fn encode(&self, coord: Self::Coord) -> Result<Sector>;

    /// Decodes a sector id into its coordinate tuple.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds [`Self::sector_max`].
    fn decode(&self, sector: Sector) -> Result<Self::Coord>;

    /// Returns the layer a sector belongs to.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds [`Self::sector_max`].
    fn layer(&self, sector: Sector) -> Result<u32>;

    /// Checks that a sector id is within `[0, sector_max]`.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] otherwise.
    #[inline]
    fn check(&self, sector: Sector) -> Result<()> {
        let max = self.sector_max();
        if sector > max {
            return Err(Error::SectorOutOfRange {
                sector: sector.0,
                max: max.0,
            });
        }
        Ok(())
    }

    /// Number of addressable sector ids.
    #[inline]
    fn num_sectors(&self) -> usize {
        self.sector_max().index() + 1
    }
}

#[inline]
fn check_field(field: &'static str, value: u32, bound: u32) -> Result<u32> {
    if value >= bound {
        return Err(Error::CoordinateOutOfRange {
            field,
            value: i64::from(value),
            bound,
        });
    }
    Ok(value)
}

#[inline]
fn check_signed_field(field: &'static str, value: i64, bound: u32) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v < bound => Ok(v),
        _ => Err(Error::CoordinateOutOfRange {
            field,
            value,
            bound,
        }),
    }
}

fn geometry_product(factors: &[u32]) -> Result<u32> {
    factors.iter().try_fold(1u32, |acc, &f| {
        acc.checked_mul(f)
            .ok_or_else(|| Error::InvalidGeometry(format!("sector count overflows u32: {factors:?}")))
    })
}

fn require_nonzero(name: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidGeometry(format!("{name} must be > 0")));
    }
    Ok(())
}

/// Planar detector coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanarCoord {
    /// Detector side (0 or 1).
    pub side: u32,
    /// Layer index, 0 innermost.
    pub layer: u32,
    /// Module (ladder) index within the layer.
    pub module: u32,
    /// Sensor index within the module.
    pub sensor: u32,
}

impl PlanarCoord {
    /// Creates a planar coordinate.
    #[inline]
    #[must_use]
    pub fn new(side: u32, layer: u32, module: u32, sensor: u32) -> Self {
        Self {
            side,
            layer,
            module,
            sensor,
        }
    }
}

/// Sector addressing for planar detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanarSectors {
    layers: u32,
    modules: u32,
    sensors: u32,
    sector_max: Sector,
}

impl PlanarSectors {
    /// Creates the address system for the given geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] if a count is zero or the sector
    /// count does not fit in a `u32`.
    pub fn new(layers: u32, modules: u32, sensors: u32) -> Result<Self> {
        require_nonzero("layers", layers)?;
        require_nonzero("modules", modules)?;
        require_nonzero("sensors", sensors)?;
        let count = geometry_product(&[PLANAR_SIDES, layers, modules, sensors])?;
        Ok(Self {
            layers,
            modules,
            sensors,
            sector_max: Sector(count - 1),
        })
    }

    /// Number of modules per layer.
    #[must_use]
    pub fn num_modules(&self) -> u32 {
        self.modules
    }

    /// Number of sensors per module.
    #[must_use]
    pub fn num_sensors(&self) -> u32 {
        self.sensors
    }

    /// Encodes signed coordinates, rejecting negative values.
    ///
    /// # Errors
    /// Returns [`Error::CoordinateOutOfRange`] for any negative or too large field.
    pub fn encode_signed(&self, side: i64, layer: i64, module: i64, sensor: i64) -> Result<Sector> {
        let coord = PlanarCoord {
            side: check_signed_field("side", side, PLANAR_SIDES)?,
            layer: check_signed_field("layer", layer, self.layers)?,
            module: check_signed_field("module", module, self.modules)?,
            sensor: check_signed_field("sensor", sensor, self.sensors)?,
        };
        self.encode(coord)
    }

    /// Side of a sector.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds the sector max.
    pub fn side(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 / (self.sensors * self.modules * self.layers) % PLANAR_SIDES)
    }

    /// Module of a sector.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds the sector max.
    pub fn module(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 / self.sensors % self.modules)
    }

    /// Sensor of a sector.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds the sector max.
    pub fn sensor(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 % self.sensors)
    }
}

impl SectorSystem for PlanarSectors {
    type Coord = PlanarCoord;

    #[inline]
    fn sector_max(&self) -> Sector {
        self.sector_max
    }

    #[inline]
    fn num_layers(&self) -> u32 {
        self.layers
    }

    fn encode(&self, coord: PlanarCoord) -> Result<Sector> {
        let side = check_field("side", coord.side, PLANAR_SIDES)?;
        let layer = check_field("layer", coord.layer, self.layers)?;
        let module = check_field("module", coord.module, self.modules)?;
        let sensor = check_field("sensor", coord.sensor, self.sensors)?;
        Ok(Sector(
            ((side * self.layers + layer) * self.modules + module) * self.sensors + sensor,
        ))
    }

    fn decode(&self, sector: Sector) -> Result<PlanarCoord> {
        Ok(PlanarCoord {
            side: self.side(sector)?,
            layer: self.layer(sector)?,
            module: self.module(sector)?,
            sensor: self.sensor(sector)?,
        })
    }

    fn layer(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 / (self.sensors * self.modules) % self.layers)
    }
}

/// Angular detector coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngularCoord {
    /// Layer index, 0 innermost.
    pub layer: u32,
    /// Azimuthal division.
    pub phi: u32,
    /// Polar division.
    pub theta: u32,
}

impl AngularCoord {
    /// Creates an angular coordinate.
    #[inline]
    #[must_use]
    pub fn new(layer: u32, phi: u32, theta: u32) -> Self {
        Self { layer, phi, theta }
    }
}

/// Sector addressing for angular detectors.
///
/// The sector max is `layers + layers * phi + layers * phi * theta`, which
/// leaves headroom above the densest encoding. Every accessor reduces modulo
/// its bound, so ids inside the headroom still decode to in-range fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngularSectors {
    layers: u32,
    phi: u32,
    theta: u32,
    sector_max: Sector,
}

impl AngularSectors {
    /// Creates the address system for the given geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] if a count is zero or the sector
    /// count does not fit in a `u32`.
    pub fn new(layers: u32, phi: u32, theta: u32) -> Result<Self> {
        require_nonzero("layers", layers)?;
        require_nonzero("phi divisions", phi)?;
        require_nonzero("theta divisions", theta)?;
        let layer_phi = geometry_product(&[layers, phi])?;
        let all = geometry_product(&[layers, phi, theta])?;
        let max = layers
            .checked_add(layer_phi)
            .and_then(|v| v.checked_add(all))
            .ok_or_else(|| Error::InvalidGeometry("sector count overflows u32".to_string()))?;
        Ok(Self {
            layers,
            phi,
            theta,
            sector_max: Sector(max),
        })
    }

    /// Number of azimuthal divisions.
    #[must_use]
    pub fn num_phi(&self) -> u32 {
        self.phi
    }

    /// Number of polar divisions.
    #[must_use]
    pub fn num_theta(&self) -> u32 {
        self.theta
    }

    /// Encodes signed coordinates, rejecting negative values.
    ///
    /// # Errors
    /// Returns [`Error::CoordinateOutOfRange`] for any negative or too large field.
    pub fn encode_signed(&self, layer: i64, phi: i64, theta: i64) -> Result<Sector> {
        let coord = AngularCoord {
            layer: check_signed_field("layer", layer, self.layers)?,
            phi: check_signed_field("phi", phi, self.phi)?,
            theta: check_signed_field("theta", theta, self.theta)?,
        };
        self.encode(coord)
    }

    /// Azimuthal division of a sector.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds the sector max.
    pub fn phi(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 / self.layers % self.phi)
    }

    /// Polar division of a sector.
    ///
    /// # Errors
    /// Returns [`Error::SectorOutOfRange`] if `sector` exceeds the sector max.
    pub fn theta(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 / (self.layers * self.phi) % self.theta)
    }
}

impl SectorSystem for AngularSectors {
    type Coord = AngularCoord;

    #[inline]
    fn sector_max(&self) -> Sector {
        self.sector_max
    }

    #[inline]
    fn num_layers(&self) -> u32 {
        self.layers
    }

    fn encode(&self, coord: AngularCoord) -> Result<Sector> {
        let layer = check_field("layer", coord.layer, self.layers)?;
        let phi = check_field("phi", coord.phi, self.phi)?;
        let theta = check_field("theta", coord.theta, self.theta)?;
        Ok(Sector(layer + self.layers * (phi + self.phi * theta)))
    }

    fn decode(&self, sector: Sector) -> Result<AngularCoord> {
        Ok(AngularCoord {
            layer: self.layer(sector)?,
            phi: self.phi(sector)?,
            theta: self.theta(sector)?,
        })
    }

    fn layer(&self, sector: Sector) -> Result<u32> {
        self.check(sector)?;
        Ok(sector.0 % self.layers)
    }
}

/// Geometry configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "family", rename_all = "lowercase"))]
pub enum GeometryConfig {
    /// Planar (side, layer, module, sensor) detector.
    Planar {
        /// Number of layers.
        layers: u32,
        /// Modules per layer.
        modules: u32,
        /// Sensors per module.
        sensors: u32,
    },
    /// Angular (layer, phi, theta) detector.
    Angular {
        /// Number of layers.
        layers: u32,
        /// Azimuthal divisions.
        phi: u32,
        /// Polar divisions.
        theta: u32,
    },
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self::Planar {
            layers: 6,
            modules: 16,
            sensors: 5,
        }
    }
}

impl GeometryConfig {
    /// Number of layers in either family.
    #[must_use]
    pub fn layers(&self) -> u32 {
        match *self {
            Self::Planar { layers, .. } | Self::Angular { layers, .. } => layers,
        }
    }

    /// Builds the planar address system.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if this is not a planar geometry, or the
    /// geometry error from [`PlanarSectors::new`].
    pub fn planar(&self) -> Result<PlanarSectors> {
        match *self {
            Self::Planar {
                layers,
                modules,
                sensors,
            } => PlanarSectors::new(layers, modules, sensors),
            Self::Angular { .. } => Err(Error::ConfigError(
                "geometry family is angular, expected planar".to_string(),
            )),
        }
    }

    /// Builds the angular address system.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if this is not an angular geometry, or the
    /// geometry error from [`AngularSectors::new`].
    pub fn angular(&self) -> Result<AngularSectors> {
        match *self {
            Self::Angular { layers, phi, theta } => AngularSectors::new(layers, phi, theta),
            Self::Planar { .. } => Err(Error::ConfigError(
                "geometry family is planar, expected angular".to_string(),
            )),
        }
    }
}
