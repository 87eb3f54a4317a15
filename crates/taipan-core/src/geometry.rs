//! Sky geometry used for field membership and overlap.
//!
//! Anything that knows how to decide whether a target lies inside a field can
//! implement [`FieldGeometry`]; the crate only ships a circular field of view.

use crate::models::{Field, Target};

/// Default Taipan field-of-view radius in degrees.
pub const DEFAULT_FIELD_RADIUS_DEG: f64 = 2.842;

/// Cartesian unit vector for an equatorial position in degrees.
pub fn unit_vector(ra_deg: f64, dec_deg: f64) -> [f64; 3] {
    let (ra, dec) = (ra_deg.to_radians(), dec_deg.to_radians());
    [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()]
}

/// Angular separation in degrees between two unit vectors.
pub fn separation_deg(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    dot.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Geometry capability: containment of targets and overlap of fields.
pub trait FieldGeometry: Send + Sync {
    fn contains(&self, field: &Field, target: &Target) -> bool;

    /// True when the two field footprints share any sky area.
    fn overlaps(&self, a: &Field, b: &Field) -> bool;
}

/// Circular field of view of fixed radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeGeometry {
    pub radius_deg: f64,
}

impl ConeGeometry {
    pub fn new(radius_deg: f64) -> Self {
        Self { radius_deg }
    }
}

impl Default for ConeGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_RADIUS_DEG)
    }
}

impl FieldGeometry for ConeGeometry {
    fn contains(&self, field: &Field, target: &Target) -> bool {
        separation_deg(field.unit_vector(), target.unit_vector()) <= self.radius_deg
    }

    fn overlaps(&self, a: &Field, b: &Field) -> bool {
        separation_deg(a.unit_vector(), b.unit_vector()) < 2.0 * self.radius_deg
    }
}
