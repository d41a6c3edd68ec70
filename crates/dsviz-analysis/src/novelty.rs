//! Novelty of solutions within the embedded design space.
//!
//! Two scores are computed per solution, both in `[0, 1]` with higher values
//! meaning more novel:
//!
//! - **density novelty** (`novelty_norm`): `(d_max − d_i) / (d_max − d_min)`
//!   where `d_i` is the Gaussian KDE density at the solution;
//! - **neighbor novelty** (`novel_nn`): `1 − c_i / (n − 1)` where `c_i` is the
//!   number of other solutions closer than `delta`.

use dsviz_stats::kde::GaussianKde;
use serde::{Deserialize, Serialize};

/// Novelty scores of every solution, in input order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoveltyScores {
    pub novelty_norm: Vec<f64>,
    pub novel_nn: Vec<f64>,
}

impl NoveltyScores {
    /// Computes both scores for the embedded points.
    #[must_use]
    pub fn new(coords: &[[f64; 2]], delta: f64) -> Self {
        Self {
            novelty_norm: density_novelty(coords),
            novel_nn: neighbor_novelty(coords, delta),
        }
    }
}

/// Density novelty of every point.
///
/// Points where the density cannot be estimated (fewer than two points, or
/// all points coincide) score 0.
///
/// # Examples
///
/// ```
/// use dsviz_analysis::novelty::density_novelty;
///
/// let points = [[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [0.1, 0.1], [5.0, 5.0]];
/// let scores = density_novelty(&points);
/// // the outlier is the most novel
/// assert_eq!(scores[4], 1.0);
/// assert!(scores[..4].iter().all(|&s| s < 1.0));
/// ```
#[must_use]
pub fn density_novelty(coords: &[[f64; 2]]) -> Vec<f64> {
    let densities = match GaussianKde::new(coords) {
        Ok(kde) => kde.evaluate_at_samples(),
        Err(err) => {
            log::debug!("density novelty is 0 for every point: {err}");
            return vec![0.0; coords.len()];
        }
    };
    let min = densities.iter().copied().fold(f64::INFINITY, f64::min);
    let max = densities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return vec![0.0; coords.len()];
    }
    densities.iter().map(|d| (max - d) / range).collect()
}

/// Neighbor novelty of every point with neighborhood radius `delta`.
///
/// # Examples
///
/// ```
/// use dsviz_analysis::novelty::neighbor_novelty;
///
/// let points = [[0.0, 0.0], [0.5, 0.0], [3.0, 0.0]];
/// assert_eq!(neighbor_novelty(&points, 0.9), vec![0.5, 0.5, 1.0]);
/// assert_eq!(neighbor_novelty(&points[..1], 0.9), vec![0.0]);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn neighbor_novelty(coords: &[[f64; 2]], delta: f64) -> Vec<f64> {
    let n = coords.len();
    if n < 2 {
        return vec![0.0; n];
    }
    coords
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let close = coords
                .iter()
                .enumerate()
                .filter(|&(j, q)| j != i && (p[0] - q[0]).hypot(p[1] - q[1]) < delta)
                .count();
            1.0 - close as f64 / (n - 1) as f64
        })
        .collect()
}
