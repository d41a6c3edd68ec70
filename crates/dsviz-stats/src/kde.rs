//! Bivariate Gaussian kernel density estimation.
//!
//! The bandwidth follows Scott's rule: the kernel covariance is the sample
//! covariance of the data scaled by `n^(-1/6)` squared (`d = 2`).
//!
//! When the sample covariance is singular (for example every point lies on a
//! line) the estimator falls back to an isotropic kernel using the mean of
//! the two marginal variances. If the data has no spread at all, construction
//! fails with [`KdeError::ZeroVariance`].

use std::f64::consts::PI;

/// Error returned when a density estimate cannot be built.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum KdeError {
    /// At least two points are needed to estimate a covariance.
    #[display("kernel density estimation requires at least 2 points, got {count}")]
    TooFewPoints { count: usize },
    /// All points coincide.
    #[display("kernel density estimation requires points with non-zero variance")]
    ZeroVariance,
}

/// Gaussian kernel density estimate over 2D points.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    points: Vec<[f64; 2]>,
    /// Inverse of the kernel covariance, row-major 2x2.
    inv_cov: [[f64; 2]; 2],
    norm: f64,
}

impl GaussianKde {
    /// Fits a density estimate to `points`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_stats::kde::{GaussianKde, KdeError};
    ///
    /// assert_eq!(
    ///     GaussianKde::new(&[[1.0, 1.0]]).unwrap_err(),
    ///     KdeError::TooFewPoints { count: 1 }
    /// );
    /// assert_eq!(
    ///     GaussianKde::new(&[[1.0, 1.0], [1.0, 1.0]]).unwrap_err(),
    ///     KdeError::ZeroVariance
    /// );
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn new(points: &[[f64; 2]]) -> Result<Self, KdeError> {
        let count = points.len();
        if count < 2 {
            return Err(KdeError::TooFewPoints { count });
        }
        let n = count as f64;

        let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in points {
            let dx = p[0] - mean_x;
            let dy = p[1] - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        let ddof = n - 1.0;
        let (sxx, syy, sxy) = (sxx / ddof, syy / ddof, sxy / ddof);

        let factor = n.powf(-1.0 / 6.0);
        let scale = factor * factor;
        let (cxx, cyy, cxy) = (sxx * scale, syy * scale, sxy * scale);

        let det = cxx * cyy - cxy * cxy;
        let tolerance = f64::EPSILON * (cxx * cyy).abs().max(f64::MIN_POSITIVE) * 16.0;
        let (inv_cov, det) = if det > tolerance {
            ([[cyy / det, -cxy / det], [-cxy / det, cxx / det]], det)
        } else {
            let var = f64::midpoint(cxx, cyy);
            if var <= 0.0 {
                return Err(KdeError::ZeroVariance);
            }
            ([[1.0 / var, 0.0], [0.0, 1.0 / var]], var * var)
        };

        let norm = 1.0 / (2.0 * PI * det.sqrt() * n);
        Ok(Self {
            points: points.to_vec(),
            inv_cov,
            norm,
        })
    }

    /// Evaluates the estimated density at `at`.
    #[must_use]
    pub fn evaluate(&self, at: [f64; 2]) -> f64 {
        let [[a, b], [c, d]] = self.inv_cov;
        self.points
            .iter()
            .map(|p| {
                let dx = at[0] - p[0];
                let dy = at[1] - p[1];
                let mahalanobis = dx * (a * dx + b * dy) + dy * (c * dx + d * dy);
                (-0.5 * mahalanobis).exp()
            })
            .sum::<f64>()
            * self.norm
    }

    /// Evaluates the estimated density at every fitted point, in input order.
    #[must_use]
    pub fn evaluate_at_samples(&self) -> Vec<f64> {
        self.points.iter().map(|&p| self.evaluate(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [0.2, 0.1],
            [-0.1, 0.3],
            [0.1, -0.2],
            [5.0, 5.0],
        ]
    }

    #[test]
    fn test_dense_region_has_higher_density() {
        let kde = GaussianKde::new(&cloud()).unwrap();
        let densities = kde.evaluate_at_samples();
        assert_eq!(densities.len(), 5);
        assert!(densities[0] > densities[4]);
        assert!(densities.iter().all(|d| *d > 0.0));
    }

    #[test]
    fn test_density_integrates_to_one() {
        let kde = GaussianKde::new(&cloud()).unwrap();
        let step = 0.05;
        let mut total = 0.0;
        let mut x = -10.0;
        while x < 15.0 {
            let mut y = -10.0;
            while y < 15.0 {
                total += kde.evaluate([x, y]) * step * step;
                y += step;
            }
            x += step;
        }
        assert!((total - 1.0).abs() < 1e-2, "total = {total}");
    }

    #[test]
    fn test_collinear_points_fall_back_to_isotropic_kernel() {
        let points = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let kde = GaussianKde::new(&points).unwrap();
        let densities = kde.evaluate_at_samples();
        assert!(densities.iter().all(|d| d.is_finite() && *d > 0.0));
        // symmetric layout: inner points are denser than the ends
        assert!(densities[1] > densities[0]);
        assert!((densities[0] - densities[3]).abs() < 1e-12);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            KdeError::TooFewPoints { count: 0 }.to_string(),
            "kernel density estimation requires at least 2 points, got 0"
        );
    }
}
