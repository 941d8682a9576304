use nalgebra as na;
use num_traits::Float;

/// Least-squares line `y = a * x + b`, returns `[a, b]`.
pub fn linear_ls<T: na::ComplexField + Float>(
    x: na::DVector<T>,
    y: na::DVector<T>,
) -> Option<na::Matrix2x1<T>> {
    let n = T::from(x.len())?;
    let eps = T::from(f32::EPSILON)?;

    let s_x = x.sum() + eps;
    let x2 = x.map(|x| x * x);
    let s_x2 = x2.sum() + eps;
    let s_xy = x.zip_map(&y, |x, y| x * y).sum();
    let s_y = y.sum();

    let a = na::Matrix2::new(s_x2, s_x, s_x, n);
    let b = na::Matrix2x1::new(s_xy, s_y);

    let qr_result = a.qr();
    let qty = qr_result.q().transpose() * b;
    let beta_hat = qr_result.r().solve_upper_triangular(&qty)?;

    if beta_hat.iter().all(|v| Float::is_finite(*v)) {
        Some(beta_hat)
    } else {
        None
    }
}

/// Square root of the smallest-to-largest eigenvalue ratio of the point
/// scatter matrix: 0 for collinear (or coincident) points, 1 for isotropic.
pub fn spread_ratio(points: &[na::Point2<f64>]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let n = points.len() as f64;
    let mean = points
        .iter()
        .fold(na::Vector2::zeros(), |acc, p| acc + p.coords)
        / n;

    let scatter = points.iter().fold(na::Matrix2::zeros(), |acc, p| {
        let d = p.coords - mean;
        acc + d * d.transpose()
    });

    let eig = na::SymmetricEigen::new(scatter);
    let (lo, hi) = (eig.eigenvalues.min(), eig.eigenvalues.max());

    if hi <= f64::EPSILON {
        return 0.0;
    }

    (lo.max(0.0) / hi).sqrt()
}

/// Twice the triangle area over the squared longest side. Scale-free,
/// 0 when the three points are collinear.
pub fn triangle_flatness(a: na::Point2<f64>, b: na::Point2<f64>, c: na::Point2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;
    let cross = (ab.x * ac.y - ab.y * ac.x).abs();
    let longest = ab
        .norm_squared()
        .max(ac.norm_squared())
        .max(bc.norm_squared());

    if longest <= f64::EPSILON {
        return 0.0;
    }

    cross / longest
}

pub fn l2_normalized(mut v: Vec<f32>) -> Option<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return None;
    }

    v.iter_mut().for_each(|x| *x /= norm);
    Some(v)
}

/// `1 - cos(a, b)` for L2-normalized vectors. Mismatched lengths are
/// maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }

    1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn line_fit_recovers_slope() {
        let x = na::DVector::from_vec(vec![-2.0f64, -1.0, 0.0]);
        let y = na::DVector::from_vec(vec![1.0f64, 4.0, 7.0]);
        let ab = linear_ls(x, y).unwrap();
        assert_abs_diff_eq!(ab[0], 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(ab[1], 7.0, epsilon = 1e-4);
    }

    #[test]
    fn spread_of_collinear_points_is_zero() {
        let pts: Vec<_> = (0..5)
            .map(|i| na::Point2::new(i as f64, 2.0 * i as f64 + 1.0))
            .collect();
        assert_abs_diff_eq!(spread_ratio(&pts), 0.0, epsilon = 1e-6);

        let square = [
            na::Point2::new(0.0, 0.0),
            na::Point2::new(1.0, 0.0),
            na::Point2::new(1.0, 1.0),
            na::Point2::new(0.0, 1.0),
        ];
        assert_abs_diff_eq!(spread_ratio(&square), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn flatness() {
        let a = na::Point2::new(0.0, 0.0);
        let b = na::Point2::new(10.0, 0.0);
        assert_abs_diff_eq!(triangle_flatness(a, b, na::Point2::new(5.0, 0.0)), 0.0);
        assert!(triangle_flatness(a, b, na::Point2::new(0.0, 10.0)) > 0.4);
    }

    #[test]
    fn cosine() {
        let a = l2_normalized(vec![1.0, 0.0]).unwrap();
        let b = l2_normalized(vec![0.0, 2.0]).unwrap();
        assert_abs_diff_eq!(cosine_distance(&a, &a), 0.0);
        assert_abs_diff_eq!(cosine_distance(&a, &b), 1.0);
        assert!(l2_normalized(vec![0.0, 0.0]).is_none());
    }
}
