//! JSON run configuration.
//!
//! Every field is optional; missing fields take the library defaults.
//!
//! ```json
//! {
//!   "geometry": {"family": "planar", "layers": 6, "modules": 16, "sensors": 5},
//!   "connector": {"shortcut_layers": [2, 4]},
//!   "criteria": {"pt": {"min": 0.05, "max": 10.0}, "distance_to_origin": 1.0, "max_radius": 1e5},
//!   "automaton": {"max_rounds": 100, "max_skipped_layers": 1, "min_track_hits": 3}
//! }
//! ```

use crate::{Error, Result};
use catrack_algorithms::{FinderConfig, Window};
use catrack_core::GeometryConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn check_window(name: &str, window: Option<Window>) -> Result<()> {
    match window {
        Some(w) if w.min.is_nan() || w.max.is_nan() || w.min > w.max => Err(
            Error::InvalidFormat(format!("{name} window [{}, {}] is empty", w.min, w.max)),
        ),
        _ => Ok(()),
    }
}

/// Checks a configuration for values the finder cannot run with.
///
/// # Errors
/// Returns [`Error::CoreError`] for an invalid geometry and
/// [`Error::InvalidFormat`] for inverted windows, a negative distance or a
/// non-positive radius ceiling.
pub fn validate(config: &FinderConfig) -> Result<()> {
    match config.geometry {
        GeometryConfig::Planar { .. } => {
            config.geometry.planar()?;
        }
        GeometryConfig::Angular { .. } => {
            config.geometry.angular()?;
        }
    }
    check_window("pt", config.criteria.pt)?;
    check_window("rz_ratio", config.criteria.rz_ratio)?;
    if let Some(max) = config.criteria.distance_to_origin {
        if max.is_nan() || max < 0.0 {
            return Err(Error::InvalidFormat(format!(
                "distance_to_origin must be non-negative, got {max}"
            )));
        }
    }
    let max_radius = config.criteria.max_radius;
    if max_radius.is_nan() || max_radius <= 0.0 {
        return Err(Error::InvalidFormat(format!(
            "max_radius must be positive, got {max_radius}"
        )));
    }
    if let Some((first, last)) = config.connector.shortcut_layers {
        if first > last {
            return Err(Error::InvalidFormat(format!(
                "shortcut_layers [{first}, {last}] is empty"
            )));
        }
    }
    Ok(())
}

/// Loads and validates a configuration from a JSON string.
///
/// # Errors
/// Returns [`Error::Json`] for malformed JSON and the [`validate`] errors.
pub fn from_json(json: &str) -> Result<FinderConfig> {
    let config: FinderConfig = serde_json::from_str(json)?;
    validate(&config)?;
    Ok(config)
}

/// Loads and validates a configuration from a JSON file.
///
/// # Errors
/// Returns an I/O error if the file cannot be opened, otherwise as
/// [`from_json`].
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FinderConfig> {
    let reader = BufReader::new(File::open(&path)?);
    let config: FinderConfig = serde_json::from_reader(reader)?;
    validate(&config)?;
    log::info!("loaded run configuration from {}", path.as_ref().display());
    Ok(config)
}

/// Serializes a configuration as pretty-printed JSON.
///
/// # Errors
/// Returns [`Error::Json`] if serialization fails.
pub fn to_json(config: &FinderConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
