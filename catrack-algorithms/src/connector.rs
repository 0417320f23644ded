//! Sector adjacency: which sectors a segment may extend into.
//!
//! Segments always point inward, from an outer layer towards layer 0, which
//! is terminal. Besides the adjacent inward layer, layers inside the
//! configured shortcut range also connect straight to layer 0, so a chain can
//! survive inefficient middle layers.

use catrack_core::{
    AngularCoord, AngularSectors, PlanarCoord, PlanarSectors, Result, Sector, SectorSystem,
};
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Adjacency policy over sector ids.
///
/// Implementations are pure: the same sector always yields the same sorted,
/// deduplicated list, never containing the sector itself.
pub trait SectorConnector: Send + Sync {
    /// Sectors a segment starting in `sector` may extend into.
    ///
    /// # Errors
    /// Returns [`catrack_core::Error::SectorOutOfRange`] if `sector` is not
    /// a valid sector id.
    fn target_sectors(&self, sector: Sector) -> Result<Vec<Sector>>;

    /// Returns the name of the connector.
    fn name(&self) -> &'static str;
}

/// Connector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectorConfig {
    /// Inclusive layer range whose sectors also connect directly to layer 0.
    /// `None` disables shortcuts.
    pub shortcut_layers: Option<(u32, u32)>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            shortcut_layers: Some((2, 4)),
        }
    }
}

impl ConnectorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shortcut layer range.
    #[must_use]
    pub fn with_shortcut_layers(mut self, layers: RangeInclusive<u32>) -> Self {
        self.shortcut_layers = Some((*layers.start(), *layers.end()));
        self
    }

    /// Disables shortcuts to layer 0.
    #[must_use]
    pub fn without_shortcuts(mut self) -> Self {
        self.shortcut_layers = None;
        self
    }

    fn has_shortcut(&self, layer: u32) -> bool {
        // Layer 1 already targets layer 0 through plain adjacency.
        layer >= 2
            && self
                .shortcut_layers
                .is_some_and(|(lo, hi)| (lo..=hi).contains(&layer))
    }
}

/// Connector for planar detectors.
///
/// Targets stay on the same side and cover every module and sensor of the
/// target layer.
#[derive(Debug, Clone)]
pub struct PlanarConnector {
    sectors: PlanarSectors,
    config: ConnectorConfig,
}

impl PlanarConnector {
    /// Creates a connector with the default shortcut range.
    #[must_use]
    pub fn new(sectors: PlanarSectors) -> Self {
        Self::with_config(sectors, ConnectorConfig::default())
    }

    /// Creates a connector with a custom configuration.
    #[must_use]
    pub fn with_config(sectors: PlanarSectors, config: ConnectorConfig) -> Self {
        Self { sectors, config }
    }

    fn push_layer(&self, side: u32, layer: u32, out: &mut Vec<Sector>) -> Result<()> {
        for module in 0..self.sectors.num_modules() {
            for sensor in 0..self.sectors.num_sensors() {
                out.push(
                    self.sectors
                        .encode(PlanarCoord::new(side, layer, module, sensor))?,
                );
            }
        }
        Ok(())
    }
}

impl SectorConnector for PlanarConnector {
    fn target_sectors(&self, sector: Sector) -> Result<Vec<Sector>> {
        let side = self.sectors.side(sector)?;
        let layer = self.sectors.layer(sector)?;
        if layer == 0 {
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        self.push_layer(side, layer - 1, &mut targets)?;
        if self.config.has_shortcut(layer) {
            self.push_layer(side, 0, &mut targets)?;
        }
        targets.sort_unstable();
        targets.dedup();
        Ok(targets)
    }

    fn name(&self) -> &'static str {
        "Planar"
    }
}

/// Connector for angular detectors.
///
/// Targets lie within one phi division (wrapping around) and one theta
/// division (clamped at the acceptance edges) of the originating sector.
#[derive(Debug, Clone)]
pub struct AngularConnector {
    sectors: AngularSectors,
    config: ConnectorConfig,
}

impl AngularConnector {
    /// Creates a connector with the default shortcut range.
    #[must_use]
    pub fn new(sectors: AngularSectors) -> Self {
        Self::with_config(sectors, ConnectorConfig::default())
    }

    /// Creates a connector with a custom configuration.
    #[must_use]
    pub fn with_config(sectors: AngularSectors, config: ConnectorConfig) -> Self {
        Self { sectors, config }
    }

    fn push_window(&self, origin: AngularCoord, layer: u32, out: &mut Vec<Sector>) -> Result<()> {
        let n_phi = self.sectors.num_phi();
        let n_theta = self.sectors.num_theta();
        let below = if origin.phi == 0 { n_phi - 1 } else { origin.phi - 1 };
        let phis = [below, origin.phi, (origin.phi + 1) % n_phi];
        let thetas = origin.theta.saturating_sub(1)..=(origin.theta + 1).min(n_theta - 1);

        for phi in phis {
            for theta in thetas.clone() {
                out.push(self.sectors.encode(AngularCoord::new(layer, phi, theta))?);
            }
        }
        Ok(())
    }
}

impl SectorConnector for AngularConnector {
    fn target_sectors(&self, sector: Sector) -> Result<Vec<Sector>> {
        let origin = self.sectors.decode(sector)?;
        if origin.layer == 0 {
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        self.push_window(origin, origin.layer - 1, &mut targets)?;
        if self.config.has_shortcut(origin.layer) {
            self.push_window(origin, 0, &mut targets)?;
        }
        targets.sort_unstable();
        targets.dedup();
        Ok(targets)
    }

    fn name(&self) -> &'static str {
        "Angular"
    }
}
