//! Image-to-field homography estimation from correspondence points.
//!
//! Direct linear transform on Hartley-normalized points: exactly four
//! correspondences are solved as an 8×8 linear system with `h33 = 1`, more
//! are solved in the least-squares sense as the eigenvector of `AᵀA` with the
//! smallest eigenvalue.

use crate::correspondence::CorrespondenceStore;
use crate::error::{Degeneracy, Error};
use crate::geometry::{FieldPoint, PixelPoint};
use crate::homography::Homography;
use crate::math;
use log::{debug, info, warn};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, SymmetricEigen, Vector3};
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Re-projection error (feet) above which a correspondence is reported.
    pub residual_tolerance_ft: f64,
    /// Minimum spread ratio (see [`math::spread_ratio`]) for a point set not
    /// to be considered collinear.
    pub min_spread: f64,
    /// Minimum triangle flatness for any three of exactly four points.
    pub min_flatness: f64,
    /// Relative eigenvalue gap below which the DLT system is rank deficient.
    pub rank_tolerance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            residual_tolerance_ft: 1.0,
            min_spread: 1e-3,
            min_flatness: 1e-3,
            rank_tolerance: 1e-12,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.residual_tolerance_ft > 0.0) {
            return Err(Error::InvalidConfig(
                "residual tolerance must be positive".into(),
            ));
        }

        if self.min_spread < 0.0 || self.min_flatness < 0.0 || self.rank_tolerance < 0.0 {
            return Err(Error::InvalidConfig(
                "degeneracy tolerances must be non-negative".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub homography: Homography,
    /// Per-correspondence re-projection error, in feet, store order.
    pub residuals_ft: Vec<f64>,
    pub rms_ft: f64,
    pub max_ft: f64,
    /// Indices whose residual exceeds the tolerance.
    pub outliers: Vec<usize>,
}

impl CalibrationReport {
    pub fn within_tolerance(&self) -> bool {
        self.outliers.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Estimates the homography and re-projects every correspondence through
    /// it. Residuals above tolerance are logged and reported, not fatal.
    pub fn calibrate(&self, store: &CorrespondenceStore) -> Result<CalibrationReport, Error> {
        store.validate()?;

        let img: Vec<PixelPoint> = store.image_points().collect();
        let fld: Vec<FieldPoint> = store.field_points().collect();

        let h = self.estimate(&img, &fld)?;

        let residuals_ft = img
            .iter()
            .zip(&fld)
            .map(|(p, f)| Ok(h.project(*p)?.distance(f)))
            .collect::<Result<Vec<f64>, Error>>()
            .map_err(|err| match err {
                // A correspondence on the horizon line cannot belong to a
                // consistent image-to-ground mapping.
                Error::SingularProjection { .. } => {
                    Error::degenerate(Degeneracy::SingularHomography)
                }
                other => other,
            })?;

        let n = residuals_ft.len() as f64;
        let rms_ft = (residuals_ft.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
        let max_ft = residuals_ft.iter().copied().fold(0.0, f64::max);

        let outliers: Vec<usize> = residuals_ft
            .iter()
            .enumerate()
            .filter(|(_, r)| **r > self.config.residual_tolerance_ft)
            .map(|(i, _)| i)
            .collect();

        for &i in &outliers {
            warn!(
                "correspondence #{} re-projects {:.2} ft from its field point (tolerance {:.2} ft)",
                i, residuals_ft[i], self.config.residual_tolerance_ft
            );
        }

        info!(
            "calibrated from {} correspondences on {} yard lines: rms {:.3} ft, max {:.3} ft",
            store.len(),
            store.yard_lines().len(),
            rms_ft,
            max_ft
        );

        Ok(CalibrationReport {
            homography: h,
            residuals_ft,
            rms_ft,
            max_ft,
            outliers,
        })
    }

    /// Raw estimation step: image points to field points.
    pub fn estimate(&self, img: &[PixelPoint], fld: &[FieldPoint]) -> Result<Homography, Error> {
        if img.len() != fld.len() {
            return Err(Error::degenerate(Degeneracy::MismatchedLengths {
                image: img.len(),
                field: fld.len(),
            }));
        }

        if img.len() < 4 {
            return Err(Error::InsufficientPoints {
                needed: 4,
                got: img.len(),
            });
        }

        let src: Vec<Point2<f64>> = img.iter().map(|p| p.to_na()).collect();
        let dst: Vec<Point2<f64>> = fld.iter().map(|p| p.to_na()).collect();

        self.check_spread(&src, Degeneracy::CollinearImagePoints)?;
        self.check_spread(&dst, Degeneracy::CollinearFieldPoints)?;

        let (src_n, t_src) = normalize_points(&src);
        let (dst_n, t_dst) = normalize_points(&dst);

        let hn = if src.len() == 4 {
            self.check_quad(&src, Degeneracy::CollinearImagePoints)?;
            self.check_quad(&dst, Degeneracy::CollinearFieldPoints)?;
            solve_exact(&src_n, &dst_n)?
        } else {
            self.solve_least_squares(&src_n, &dst_n)?
        };

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or(Error::degenerate(Degeneracy::SingularHomography))?;

        Homography::new(t_dst_inv * hn * t_src)
    }

    fn check_spread(&self, pts: &[Point2<f64>], kind: Degeneracy) -> Result<(), Error> {
        let spread = math::spread_ratio(pts);
        debug!("{:?} spread ratio {:.3e}", kind, spread);

        if spread < self.config.min_spread {
            return Err(Error::degenerate(kind));
        }

        Ok(())
    }

    /// With exactly four points no three may be collinear.
    fn check_quad(&self, pts: &[Point2<f64>], kind: Degeneracy) -> Result<(), Error> {
        for skip in 0..4 {
            let tri: Vec<Point2<f64>> = pts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, p)| *p)
                .collect();

            if math::triangle_flatness(tri[0], tri[1], tri[2]) < self.config.min_flatness {
                return Err(Error::degenerate(kind));
            }
        }

        Ok(())
    }

    fn solve_least_squares(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<Matrix3<f64>, Error> {
        let n = src.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 9);

        for k in 0..n {
            let (x, y) = (src[k].x, src[k].y);
            let (u, v) = (dst[k].x, dst[k].y);

            // [ x y 1  0 0 0  -u*x -u*y -u ]
            a[(2 * k, 0)] = x;
            a[(2 * k, 1)] = y;
            a[(2 * k, 2)] = 1.0;
            a[(2 * k, 6)] = -u * x;
            a[(2 * k, 7)] = -u * y;
            a[(2 * k, 8)] = -u;

            // [ 0 0 0  x y 1  -v*x -v*y -v ]
            a[(2 * k + 1, 3)] = x;
            a[(2 * k + 1, 4)] = y;
            a[(2 * k + 1, 5)] = 1.0;
            a[(2 * k + 1, 6)] = -v * x;
            a[(2 * k + 1, 7)] = -v * y;
            a[(2 * k + 1, 8)] = -v;
        }

        let ata = a.transpose() * &a;
        let eig = SymmetricEigen::new(ata);

        let mut order: Vec<usize> = (0..9).collect();
        order.sort_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .total_cmp(&eig.eigenvalues[j].abs())
        });

        let smallest = order[0];
        let second = eig.eigenvalues[order[1]].abs();
        let largest = eig.eigenvalues[order[8]].abs();

        // A second (near) null direction means the solution is not unique.
        if largest <= 0.0 || second / largest < self.config.rank_tolerance {
            return Err(Error::degenerate(Degeneracy::RankDeficient));
        }

        let h = eig.eigenvectors.column(smallest);

        Ok(Matrix3::new(
            h[0], h[1], h[2], //
            h[3], h[4], h[5], //
            h[6], h[7], h[8],
        ))
    }
}

/// Four-point solve with `h33 = 1`:
/// `h11 x + h12 y + h13 - u h31 x - u h32 y = u`,
/// `h21 x + h22 y + h23 - v h31 x - v h32 y = v`.
fn solve_exact(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Matrix3<f64>, Error> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src[k].x, src[k].y);
        let (u, v) = (dst[k].x, dst[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a
        .lu()
        .solve(&b)
        .ok_or(Error::degenerate(Degeneracy::RankDeficient))?;

    Ok(Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    ))
}

/// Translate the centroid to the origin and scale the mean distance to √2.
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();

    (out, t)
}
