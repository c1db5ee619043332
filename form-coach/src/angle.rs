//! Joint angle calculation
//!
//! Computes the interior angle at a joint vertex from the two limb endpoints,
//! e.g. hip→knee→ankle for the knee.

use serde::{Deserialize, Serialize};

/// Limbs shorter than this (in normalized image units) are treated as collapsed
const MIN_LIMB_LENGTH: f64 = 1e-9;

/// A 2-D point in normalized image coordinates (0-1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Interior angle at `b` in degrees, always within `[0, 180]`.
///
/// `a` and `c` are the far ends of the two limbs meeting at `b`. The angle
/// between the two atan2 headings is folded back into `[0, 180]` when it
/// comes out reflex.
///
/// Returns `0.0` when either limb has zero length or a coordinate is not
/// finite, since no meaningful angle exists.
pub fn joint_angle(a: Point2D, b: Point2D, c: Point2D) -> f64 {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return 0.0;
    }
    if a.distance(&b) < MIN_LIMB_LENGTH || c.distance(&b) < MIN_LIMB_LENGTH {
        return 0.0;
    }

    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();

    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}
