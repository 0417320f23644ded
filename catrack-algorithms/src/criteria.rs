//! Compatibility criteria between a parent and a child segment.
//!
//! A parent segment `(outer, middle)` and a child segment `(middle, inner)`
//! share their middle hit, so every pairwise criterion sees a three-hit
//! chain. Criteria are combined by logical AND in registration order and
//! evaluation stops at the first rejection.
//!
//! Criteria never keep mutable state. Intermediate values used in a decision
//! go to an optional [`Diagnostics`] sink supplied by the caller.

use catrack_core::{fit_circle, Circle, Error, Position, Result};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of hits a criterion requires in the parent and child segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredHits {
    /// Hits in the parent segment.
    pub parent: usize,
    /// Hits in the child segment.
    pub child: usize,
}

impl RequiredHits {
    /// Two hits in each segment.
    pub const PAIR: Self = Self {
        parent: 2,
        child: 2,
    };

    /// Checks segment lengths against the requirement.
    ///
    /// # Errors
    /// Returns [`Error::BadSegmentLength`] naming `criterion` on mismatch.
    pub fn check(self, criterion: &'static str, parent: usize, child: usize) -> Result<()> {
        if parent != self.parent || child != self.child {
            return Err(Error::BadSegmentLength {
                criterion,
                expected_parent: self.parent,
                expected_child: self.child,
                parent,
                child,
            });
        }
        Ok(())
    }
}

/// Named scalar values recorded while evaluating a criterion.
///
/// Recording a name twice keeps the latest value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Diagnostics {
    values: BTreeMap<&'static str, f64>,
}

impl Diagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value, replacing any previous value under `name`.
    pub fn record(&mut self, name: &'static str, value: f64) {
        self.values.insert(name, value);
    }

    /// Returns the last value recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }

    /// Number of recorded names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[inline]
fn record(sink: &mut Option<&mut Diagnostics>, name: &'static str, value: f64) {
    if let Some(sink) = sink.as_deref_mut() {
        sink.record(name, value);
    }
}

/// Pairwise compatibility predicate over segments.
pub trait Criterion: Send + Sync {
    /// Returns the name of the criterion.
    fn name(&self) -> &'static str;

    /// Segment shape this criterion accepts.
    fn required_hits(&self) -> RequiredHits {
        RequiredHits::PAIR
    }

    /// Decides whether `child` may follow `parent`.
    ///
    /// Positions are ordered from the outer to the inner hit of each segment.
    ///
    /// # Errors
    /// Returns [`Error::BadSegmentLength`] if either segment does not match
    /// [`Self::required_hits`].
    fn is_compatible(
        &self,
        parent: &[Position],
        child: &[Position],
        diagnostics: Option<&mut Diagnostics>,
    ) -> Result<bool>;
}

/// Returns `(outer, middle, inner)` for a two-by-two junction.
fn junction(
    criterion: &dyn Criterion,
    parent: &[Position],
    child: &[Position],
) -> Result<(Position, Position, Position)> {
    criterion
        .required_hits()
        .check(criterion.name(), parent.len(), child.len())?;
    Ok((parent[0], parent[1], child[1]))
}

/// Default radius above which a circle fit counts as a straight line, in
/// centimetres.
pub const DEFAULT_MAX_RADIUS_CM: f64 = 1.0e5;

/// Circle through the junction, or `None` for a straight line.
///
/// Rounded coordinates of collinear hits fit a finite but huge circle, so
/// radii above `max_radius` are treated like an exact collinear fit.
fn curved_fit(
    outer: &Position,
    middle: &Position,
    inner: &Position,
    max_radius: f64,
) -> Option<Circle> {
    fit_circle(outer, middle, inner).filter(|circle| circle.radius <= max_radius)
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Window {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Window {
    /// Creates a window.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true if `value` lies inside the window.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Transverse-momentum window from a three-hit circle fit.
///
/// Collinear hits, or hits fitting a circle wider than the radius ceiling,
/// pass and record `pt` as 0.
#[derive(Debug, Clone)]
pub struct PtWindow {
    window: Window,
    field_tesla: f64,
    max_radius: f64,
}

impl PtWindow {
    /// Creates the criterion for a pt window in GeV and a solenoid field in tesla.
    #[must_use]
    pub fn new(window: Window, field_tesla: f64) -> Self {
        Self {
            window,
            field_tesla,
            max_radius: DEFAULT_MAX_RADIUS_CM,
        }
    }

    /// Sets the radius ceiling in centimetres.
    #[must_use]
    pub fn with_max_radius(mut self, max_radius: f64) -> Self {
        self.max_radius = max_radius;
        self
    }
}

impl Criterion for PtWindow {
    fn name(&self) -> &'static str {
        "PtWindow"
    }

    fn is_compatible(
        &self,
        parent: &[Position],
        child: &[Position],
        mut diagnostics: Option<&mut Diagnostics>,
    ) -> Result<bool> {
        let (outer, middle, inner) = junction(self, parent, child)?;
        let Some(circle) = curved_fit(&outer, &middle, &inner, self.max_radius) else {
            record(&mut diagnostics, "pt", 0.0);
            return Ok(true);
        };
        let pt = circle.pt(self.field_tesla);
        record(&mut diagnostics, "pt", pt);
        Ok(self.window.contains(pt))
    }
}

/// Change of the squared transverse/longitudinal spacing ratio.
#[derive(Debug, Clone)]
pub struct RzRatioChange {
    window: Window,
}

impl RzRatioChange {
    /// Creates the criterion for a window on `parent_ratio / child_ratio`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// Squared ratio of transverse to longitudinal spacing; 0 when `dz == 0`.
    #[inline]
    #[must_use]
    pub fn ratio_squared(a: &Position, b: &Position) -> f64 {
        let dz = a.dz(b);
        if dz == 0.0 {
            return 0.0;
        }
        a.perp_distance_squared(b) / (dz * dz)
    }
}

impl Criterion for RzRatioChange {
    fn name(&self) -> &'static str {
        "RzRatioChange"
    }

    fn is_compatible(
        &self,
        parent: &[Position],
        child: &[Position],
        mut diagnostics: Option<&mut Diagnostics>,
    ) -> Result<bool> {
        let (outer, middle, inner) = junction(self, parent, child)?;
        let parent_ratio = Self::ratio_squared(&outer, &middle);
        let child_ratio = Self::ratio_squared(&middle, &inner);
        let change = if child_ratio == 0.0 {
            0.0
        } else {
            parent_ratio / child_ratio
        };
        record(&mut diagnostics, "rz_parent", parent_ratio);
        record(&mut diagnostics, "rz_child", child_ratio);
        record(&mut diagnostics, "rz_ratio_change", change);
        Ok(self.window.contains(change))
    }
}

/// Distance between the fitted circle and the origin.
///
/// Straight junctions pass and record a distance of 0, with the same radius
/// ceiling as [`PtWindow`].
#[derive(Debug, Clone)]
pub struct CircleDistanceToOrigin {
    max_distance: f64,
    max_radius: f64,
}

impl CircleDistanceToOrigin {
    /// Creates the criterion with a maximum distance in centimetres.
    #[must_use]
    pub fn new(max_distance: f64) -> Self {
        Self {
            max_distance,
            max_radius: DEFAULT_MAX_RADIUS_CM,
        }
    }

    /// Sets the radius ceiling in centimetres.
    #[must_use]
    pub fn with_max_radius(mut self, max_radius: f64) -> Self {
        self.max_radius = max_radius;
        self
    }
}

impl Criterion for CircleDistanceToOrigin {
    fn name(&self) -> &'static str {
        "CircleDistanceToOrigin"
    }

    fn is_compatible(
        &self,
        parent: &[Position],
        child: &[Position],
        mut diagnostics: Option<&mut Diagnostics>,
    ) -> Result<bool> {
        let (outer, middle, inner) = junction(self, parent, child)?;
        let distance = curved_fit(&outer, &middle, &inner, self.max_radius)
            .map_or(0.0, |c| c.distance_to_origin());
        record(&mut diagnostics, "circle_distance", distance);
        Ok(distance <= self.max_distance)
    }
}

/// Parameter sets for the built-in criteria.
///
/// A `None` window disables that criterion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CriteriaConfig {
    /// Transverse momentum window in GeV.
    pub pt: Option<Window>,
    /// Window on the r/z ratio change.
    pub rz_ratio: Option<Window>,
    /// Maximum circle distance to the origin in centimetres.
    pub distance_to_origin: Option<f64>,
    /// Solenoid field in tesla.
    pub magnetic_field_tesla: f64,
    /// Circle fits wider than this radius (cm) count as straight lines.
    pub max_radius: f64,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            pt: Some(Window::new(0.05, 100.0)),
            rz_ratio: Some(Window::new(0.5, 2.0)),
            distance_to_origin: Some(0.5),
            magnetic_field_tesla: 1.5,
            max_radius: DEFAULT_MAX_RADIUS_CM,
        }
    }
}

impl CriteriaConfig {
    /// Configuration with every criterion disabled.
    #[must_use]
    pub fn none() -> Self {
        Self {
            pt: None,
            rz_ratio: None,
            distance_to_origin: None,
            ..Self::default()
        }
    }

    /// Sets the pt window.
    #[must_use]
    pub fn with_pt(mut self, min: f64, max: f64) -> Self {
        self.pt = Some(Window::new(min, max));
        self
    }

    /// Sets the r/z ratio change window.
    #[must_use]
    pub fn with_rz_ratio(mut self, min: f64, max: f64) -> Self {
        self.rz_ratio = Some(Window::new(min, max));
        self
    }

    /// Sets the maximum circle distance to the origin.
    #[must_use]
    pub fn with_distance_to_origin(mut self, max: f64) -> Self {
        self.distance_to_origin = Some(max);
        self
    }

    /// Sets the magnetic field.
    #[must_use]
    pub fn with_magnetic_field(mut self, tesla: f64) -> Self {
        self.magnetic_field_tesla = tesla;
        self
    }

    /// Sets the radius ceiling for circle fits.
    #[must_use]
    pub fn with_max_radius(mut self, max_radius: f64) -> Self {
        self.max_radius = max_radius;
        self
    }

    /// Instantiates the enabled criteria, cheapest first.
    #[must_use]
    pub fn build(&self) -> Vec<Box<dyn Criterion>> {
        let mut criteria: Vec<Box<dyn Criterion>> = Vec::new();
        if let Some(window) = self.rz_ratio {
            criteria.push(Box::new(RzRatioChange::new(window)));
        }
        if let Some(max) = self.distance_to_origin {
            criteria.push(Box::new(
                CircleDistanceToOrigin::new(max).with_max_radius(self.max_radius),
            ));
        }
        if let Some(window) = self.pt {
            criteria.push(Box::new(
                PtWindow::new(window, self.magnetic_field_tesla).with_max_radius(self.max_radius),
            ));
        }
        criteria
    }
}
