use crate::error::{Degeneracy, Error};
use crate::geometry::{FieldPoint, PixelPoint};
use nalgebra::{Matrix3, Vector3};
use serde_derive::{Deserialize, Serialize};

/// Homogeneous scale below which a projection is rejected.
pub const MIN_HOMOGENEOUS_SCALE: f64 = 1e-10;

const MIN_DETERMINANT: f64 = 1e-14;

/// Image-to-field projective transform, normalized so `h[2][2] == 1`.
///
/// Never mutated once built; re-calibration produces a new value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    /// Validates and normalizes `h`.
    pub fn new(h: Matrix3<f64>) -> Result<Self, Error> {
        if h.iter().any(|v| !v.is_finite()) {
            return Err(Error::degenerate(Degeneracy::SingularHomography));
        }

        let scale = h[(2, 2)];
        let h = if scale.abs() > MIN_HOMOGENEOUS_SCALE {
            h / scale
        } else {
            h
        };

        if h.determinant().abs() < MIN_DETERMINANT {
            return Err(Error::degenerate(Degeneracy::SingularHomography));
        }

        Ok(Self { h })
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Result<Self, Error> {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Image pixel to field feet.
    pub fn project(&self, p: PixelPoint) -> Result<FieldPoint, Error> {
        let (x, y) = apply(&self.h, p.x, p.y)?;
        Ok(FieldPoint::new(x, y))
    }

    /// Field feet back to image pixel.
    pub fn unproject(&self, p: FieldPoint) -> Result<PixelPoint, Error> {
        let inv = self
            .h
            .try_inverse()
            .ok_or(Error::degenerate(Degeneracy::SingularHomography))?;

        let (x, y) = apply(&inv, p.x, p.y)?;
        Ok(PixelPoint::new(x, y))
    }
}

fn apply(h: &Matrix3<f64>, x: f64, y: f64) -> Result<(f64, f64), Error> {
    let v = h * Vector3::new(x, y, 1.0);
    let w = v[2];

    if !w.is_finite() || w.abs() < MIN_HOMOGENEOUS_SCALE {
        return Err(Error::SingularProjection { x, y, w });
    }

    let (u, v) = (v[0] / w, v[1] / w);
    if !u.is_finite() || !v.is_finite() {
        return Err(Error::SingularProjection { x, y, w });
    }

    Ok((u, v))
}

impl TryFrom<[[f64; 3]; 3]> for Homography {
    type Error = Error;

    fn try_from(rows: [[f64; 3]; 3]) -> Result<Self, Self::Error> {
        Homography::from_array(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Homography {
        Homography::new(Matrix3::new(
            0.9, 0.05, 12.0, //
            -0.03, 1.2, 4.0, //
            0.0004, 0.0011, 1.0,
        ))
        .unwrap()
    }

    #[test]
    fn project_unproject_round_trip() {
        let h = sample();

        for p in [
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(640.0, 360.0),
            PixelPoint::new(1200.0, 50.0),
        ] {
            let back = h.unproject(h.project(p).unwrap()).unwrap();
            assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-6);
            assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn rejects_points_on_the_horizon() {
        // w = 0.001 * x - 1 vanishes at x = 1000.
        let h = Homography::new(Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            -0.001, 0.0, 1.0,
        ))
        .unwrap();

        let err = h.project(PixelPoint::new(1000.0, 10.0)).unwrap_err();
        assert!(matches!(err, Error::SingularProjection { .. }));
    }

    #[test]
    fn rejects_singular_and_non_finite_matrices() {
        assert!(Homography::new(Matrix3::zeros()).is_err());
        assert!(Homography::new(Matrix3::new(
            1.0,
            2.0,
            3.0,
            2.0,
            4.0,
            6.0,
            0.0,
            0.0,
            1.0
        ))
        .is_err());
        assert!(Homography::new(Matrix3::identity() * f64::NAN).is_err());
    }

    #[test]
    fn normalizes_scale_and_serializes_row_major() {
        let h = Homography::new(Matrix3::identity() * 2.0).unwrap();
        assert_abs_diff_eq!(h.matrix()[(2, 2)], 1.0);

        let json = serde_json::to_string(&sample()).unwrap();
        let back: Homography = serde_json::from_str(&json).unwrap();
        assert_abs_diff_eq!(back.to_array()[0][2], 12.0);
        assert_abs_diff_eq!(back.to_array()[2][1], 0.0011);
    }
}
