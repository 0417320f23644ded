//! Circle geometry in the transverse plane.

use crate::hit::Position;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Transverse momentum in GeV per tesla per centimetre of radius.
pub const PT_PER_TESLA_CM: f64 = 0.002_997_924_58;

/// Circle in the x-y plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Circle {
    /// Center x coordinate.
    pub center_x: f64,
    /// Center y coordinate.
    pub center_y: f64,
    /// Radius.
    pub radius: f64,
}

impl Circle {
    /// Distance between the circle and the coordinate origin.
    #[inline]
    #[must_use]
    pub fn distance_to_origin(&self) -> f64 {
        (self.center_x.hypot(self.center_y) - self.radius).abs()
    }

    /// Transverse momentum of a track on this circle, in GeV.
    #[inline]
    #[must_use]
    pub fn pt(&self, field_tesla: f64) -> f64 {
        pt_from_radius(self.radius, field_tesla)
    }
}

/// Transverse momentum (GeV) for a radius of curvature in centimetres.
#[inline]
#[must_use]
pub fn pt_from_radius(radius_cm: f64, field_tesla: f64) -> f64 {
    PT_PER_TESLA_CM * field_tesla * radius_cm
}

/// Radius of curvature (cm) for a transverse momentum in GeV.
#[inline]
#[must_use]
pub fn radius_from_pt(pt_gev: f64, field_tesla: f64) -> f64 {
    pt_gev / (PT_PER_TESLA_CM * field_tesla)
}

/// Fits the circle through three points projected onto the x-y plane.
///
/// Returns `None` when the points are collinear (or coincide) and no finite
/// radius exists.
#[must_use]
pub fn fit_circle(a: &Position, b: &Position, c: &Position) -> Option<Circle> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    let scale =
        a.perp_distance_squared(b) + b.perp_distance_squared(c) + c.perp_distance_squared(a);
    if scale == 0.0 || d.abs() <= scale * 1e-12 {
        return None;
    }

    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;

    let center_x = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let center_y = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let radius = (a.x - center_x).hypot(a.y - center_y);

    radius.is_finite().then_some(Circle {
        center_x,
        center_y,
        radius,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_unit_circle() {
        let a = Position::new(1.0, 0.0, 0.0);
        let b = Position::new(0.0, 1.0, 5.0);
        let c = Position::new(-1.0, 0.0, -3.0);
        let circle = fit_circle(&a, &b, &c).unwrap();
        assert_relative_eq!(circle.center_x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(circle.center_y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(circle.radius, 1.0, epsilon = 1e-12);
        assert_relative_eq!(circle.distance_to_origin(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_circle_through_origin() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(10.0, 10.0, 0.0);
        let c = Position::new(20.0, 0.0, 0.0);
        let circle = fit_circle(&a, &b, &c).unwrap();
        assert_relative_eq!(circle.center_x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(circle.center_y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(circle.radius, 10.0, epsilon = 1e-9);
        assert!(circle.distance_to_origin() < 1e-9);
    }

    #[test]
    fn test_collinear_is_degenerate() {
        let a = Position::new(1.0, 1.0, 0.0);
        let b = Position::new(2.0, 2.0, 1.0);
        let c = Position::new(3.0, 3.0, 2.0);
        assert!(fit_circle(&a, &b, &c).is_none());

        let p = Position::new(4.0, 4.0, 4.0);
        assert!(fit_circle(&p, &p, &p).is_none());
    }

    #[test]
    fn test_pt_radius_conversion() {
        let radius = radius_from_pt(0.5, 1.5);
        assert_relative_eq!(pt_from_radius(radius, 1.5), 0.5, epsilon = 1e-12);
        // 1 GeV in 1 T curls with roughly 3.3 m radius
        assert_relative_eq!(radius_from_pt(1.0, 1.0), 333.564, epsilon = 1e-3);
    }
}
