//! Coordinate types. Image pixels and field feet are distinct types so a
//! projected point can never be fed back in as a pixel or the other way round.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

pub const FEET_PER_YARD: f64 = 3.0;

/// A point in image space, in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_na(self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }

    #[inline]
    pub fn distance(&self, other: &PixelPoint) -> f64 {
        na::distance(&self.to_na(), &other.to_na())
    }
}

/// A point on the playing surface, in feet. Origin at one corner of the
/// surface including end zones: x along the length, y across the width.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FieldPoint {
    pub x: f64,
    pub y: f64,
}

impl FieldPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_na(self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }

    #[inline]
    pub fn distance(&self, other: &FieldPoint) -> f64 {
        na::distance(&self.to_na(), &other.to_na())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distances() {
        let a = PixelPoint::new(0.0, 0.0);
        let b = PixelPoint::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(
            FieldPoint::new(150.0, 40.0).distance(&FieldPoint::new(150.0, 120.0)),
            80.0
        );
    }
}
