//! Two-dimensional embedding of a distance matrix.
//!
//! This is a UMAP-style layout working directly on a precomputed distance
//! matrix:
//!
//! 1. exact k-nearest neighbors of every row,
//! 2. per-point smooth membership strengths (`rho`, `sigma`) so that each
//!    point's memberships sum to `log2(k)`,
//! 3. fuzzy union of the directed memberships into a [`NeighborGraph`],
//! 4. fit of the low-dimensional similarity curve `1 / (1 + a d^(2b))` to
//!    `min_dist`,
//! 5. spectral initialization from the normalized graph Laplacian,
//! 6. stochastic gradient descent with negative sampling,
//! 7. optionally, a density regularizer over the last epochs that pulls each
//!    point's local radius toward the radius it has in the original space.
//!
//! All randomness comes from a [`Pcg32`] seeded with
//! [`EmbeddingParams::seed`], so the same matrix and parameters always give
//! the same coordinates.
//!
//! # Examples
//!
//! ```
//! use dsviz_analysis::{
//!     embedding::{EmbeddingParams, embed},
//!     matrix::DistanceMatrix,
//! };
//!
//! let points = (0..12).map(|i| [f64::from(i % 6), f64::from(i / 6) * 10.0]).collect::<Vec<_>>();
//! let matrix = DistanceMatrix::from_points(&points);
//! let params = EmbeddingParams { n_neighbors: 4, n_epochs: Some(50), ..EmbeddingParams::default() };
//!
//! let a = embed(&matrix, &params).unwrap();
//! let b = embed(&matrix, &params).unwrap();
//! assert_eq!(a.coords.len(), 12);
//! assert_eq!(a.coords, b.coords);
//! ```

use std::collections::BTreeMap;

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{graph::NeighborGraph, matrix::DistanceMatrix};

const SPREAD: f64 = 1.0;
const NEGATIVE_SAMPLE_RATE: usize = 5;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_EXTENT: f64 = 10.0;
const SMOOTH_KNN_ITERATIONS: usize = 64;
const SMOOTH_KNN_TOLERANCE: f64 = 1e-5;
const MIN_SIGMA_SCALE: f64 = 1e-3;
const POWER_ITERATIONS: usize = 1000;
const DENSITY_START: f64 = 0.7;
const DENSITY_RATE: f64 = 0.05;
const MAX_DENSITY_STEP: f64 = 0.25;

/// Parameters of [`embed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingParams {
    /// Neighborhood size, clamped to `n - 1`.
    pub n_neighbors: usize,
    /// Minimum distance between embedded points.
    pub min_dist: f64,
    /// Strength of the density regularizer. 0 disables it.
    pub dens_lambda: f64,
    /// Number of optimization epochs. Defaults to 500 for up to 10 000
    /// points and 200 beyond.
    pub n_epochs: Option<usize>,
    pub seed: u64,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            n_neighbors: 115,
            min_dist: 0.15,
            dens_lambda: 2.0,
            n_epochs: None,
            seed: 42,
        }
    }
}

impl EmbeddingParams {
    /// Number of epochs used for `n` points.
    #[must_use]
    pub fn epochs_for(&self, n: usize) -> usize {
        self.n_epochs
            .unwrap_or(if n <= 10_000 { 500 } else { 200 })
    }

    fn validate(&self) -> Result<(), EmbeddingError> {
        let invalid = |reason: &str| {
            Err(EmbeddingError::InvalidParams {
                reason: reason.to_owned(),
            })
        };
        if self.n_neighbors < 2 {
            return invalid("n_neighbors must be at least 2");
        }
        if !self.min_dist.is_finite() || self.min_dist < 0.0 || self.min_dist > SPREAD {
            return invalid("min_dist must be in [0, 1]");
        }
        if !self.dens_lambda.is_finite() || self.dens_lambda < 0.0 {
            return invalid("dens_lambda must be non-negative");
        }
        if self.n_epochs == Some(0) {
            return invalid("n_epochs must be positive");
        }
        Ok(())
    }
}

/// Error raised by [`embed`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EmbeddingError {
    #[display("invalid embedding parameter: {reason}")]
    InvalidParams { reason: String },
    #[display("distance matrix must be symmetric, finite and non-negative with a zero diagonal")]
    InvalidMatrix,
}

/// Embedded coordinates with the neighbor graph they were laid out from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// One `[x, y]` pair per matrix row, in row order.
    pub coords: Vec<[f64; 2]>,
    pub graph: NeighborGraph,
    pub params: EmbeddingParams,
}

/// Embeds the rows of `matrix` in two dimensions.
pub fn embed(matrix: &DistanceMatrix, params: &EmbeddingParams) -> Result<Embedding, EmbeddingError> {
    params.validate()?;
    let n = matrix.len();
    let finite = (0..n).all(|i| matrix.row(i).iter().all(|d| d.is_finite() && *d >= 0.0));
    if !finite || !matrix.is_valid() {
        return Err(EmbeddingError::InvalidMatrix);
    }

    let (coords, graph) = match n {
        0 => (vec![], NeighborGraph::default()),
        1 => (vec![[0.0, 0.0]], NeighborGraph::new(1, [])),
        2 => (
            vec![[-0.5, 0.0], [0.5, 0.0]],
            NeighborGraph::new(2, [(0, 1, 1.0)]),
        ),
        _ => layout(matrix, params),
    };
    Ok(Embedding {
        coords,
        graph,
        params: params.clone(),
    })
}

fn layout(matrix: &DistanceMatrix, params: &EmbeddingParams) -> (Vec<[f64; 2]>, NeighborGraph) {
    let n = matrix.len();
    let k = params.n_neighbors.min(n - 1);
    let n_epochs = params.epochs_for(n);
    let mut rng = Pcg32::seed_from_u64(params.seed);

    let neighbors = nearest_neighbors(matrix, k);
    let memberships = smooth_knn(&neighbors, k);
    let graph = fuzzy_union(n, &memberships);
    let (a, b) = fit_ab(params.min_dist, SPREAD);
    log::debug!(
        "embedding {n} points: k={k}, epochs={n_epochs}, a={a:.4}, b={b:.4}, {} edges",
        graph.edges().len()
    );

    let mut coords = match spectral_layout(&graph, &mut rng) {
        Some(coords) => coords,
        None => {
            log::debug!("neighbor graph is disconnected; using random initialization");
            (0..n)
                .map(|_| {
                    [
                        rng.random_range(-INIT_EXTENT..INIT_EXTENT),
                        rng.random_range(-INIT_EXTENT..INIT_EXTENT),
                    ]
                })
                .collect()
        }
    };

    let density = (params.dens_lambda > 0.0).then(|| DensityTarget::new(&graph, matrix));
    let optimizer = Optimizer {
        a,
        b,
        n_epochs,
        dens_lambda: params.dens_lambda,
    };
    optimizer.run(&mut coords, &graph, density.as_ref(), &mut rng);
    (coords, graph)
}

/// The `k` nearest other rows of every row, ties broken by index.
fn nearest_neighbors(matrix: &DistanceMatrix, k: usize) -> Vec<Vec<(usize, f64)>> {
    (0..matrix.len())
        .map(|i| {
            let mut row = matrix
                .row(i)
                .iter()
                .copied()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .collect::<Vec<_>>();
            row.sort_by(|(ja, da), (jb, db)| da.total_cmp(db).then(ja.cmp(jb)));
            row.truncate(k);
            row
        })
        .collect()
}

/// Directed membership strengths `(i, j, w)` of every point to its neighbors.
#[expect(clippy::cast_precision_loss)]
fn smooth_knn(neighbors: &[Vec<(usize, f64)>], k: usize) -> Vec<(usize, usize, f64)> {
    let target = (k as f64).log2();
    let mean_distance = {
        let all = neighbors.iter().flatten().map(|&(_, d)| d);
        let count = neighbors.iter().map(Vec::len).sum::<usize>();
        if count == 0 {
            0.0
        } else {
            all.sum::<f64>() / count as f64
        }
    };

    let mut memberships = vec![];
    for (i, row) in neighbors.iter().enumerate() {
        let rho = row
            .iter()
            .map(|&(_, d)| d)
            .find(|&d| d > 0.0)
            .unwrap_or(0.0);
        let membership_sum = |sigma: f64| {
            row.iter()
                .map(|&(_, d)| (-(d - rho).max(0.0) / sigma).exp())
                .sum::<f64>()
        };

        let (mut lo, mut hi, mut sigma) = (0.0, f64::INFINITY, 1.0);
        for _ in 0..SMOOTH_KNN_ITERATIONS {
            let sum = membership_sum(sigma);
            if (sum - target).abs() < SMOOTH_KNN_TOLERANCE {
                break;
            }
            if sum > target {
                hi = sigma;
                sigma = f64::midpoint(lo, hi);
            } else {
                lo = sigma;
                sigma = if hi.is_infinite() {
                    sigma * 2.0
                } else {
                    f64::midpoint(lo, hi)
                };
            }
        }
        let row_mean = if row.is_empty() {
            0.0
        } else {
            row.iter().map(|&(_, d)| d).sum::<f64>() / row.len() as f64
        };
        let floor = MIN_SIGMA_SCALE * if rho > 0.0 { row_mean } else { mean_distance };
        let sigma = sigma.max(floor).max(f64::MIN_POSITIVE);

        memberships.extend(
            row.iter()
                .map(|&(j, d)| (i, j, (-(d - rho).max(0.0) / sigma).exp())),
        );
    }
    memberships
}

/// Symmetrizes directed memberships with the probabilistic t-conorm
/// `a + b - a * b`.
fn fuzzy_union(n: usize, memberships: &[(usize, usize, f64)]) -> NeighborGraph {
    let mut pairs = BTreeMap::<(usize, usize), (f64, f64)>::new();
    for &(i, j, w) in memberships {
        let entry = pairs.entry((i.min(j), i.max(j))).or_default();
        if i < j {
            entry.0 = w;
        } else {
            entry.1 = w;
        }
    }
    NeighborGraph::new(
        n,
        pairs
            .into_iter()
            .map(|((i, j), (a, b))| (i, j, a + b - a * b)),
    )
}

/// Fits `a` and `b` of `1 / (1 + a x^(2b))` to the offset exponential
/// defined by `min_dist` and `spread` (Levenberg-Marquardt).
#[expect(clippy::cast_precision_loss)]
fn fit_ab(min_dist: f64, spread: f64) -> (f64, f64) {
    const SAMPLES: usize = 300;
    let xs = (0..SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (SAMPLES - 1) as f64)
        .collect::<Vec<_>>();
    let ys = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect::<Vec<_>>();
    let cost = |a: f64, b: f64| {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (curve(x, a, b) - y).powi(2))
            .sum::<f64>()
    };

    let (mut a, mut b) = (1.0, 1.0);
    let mut current = cost(a, b);
    let mut damping = 1e-3;
    for _ in 0..200 {
        let mut jtj = [[0.0; 2]; 2];
        let mut jtr = [0.0; 2];
        for (&x, &y) in xs.iter().zip(&ys) {
            let u = x.powf(2.0 * b);
            let denom = 1.0 + a * u;
            let r = 1.0 / denom - y;
            let da = -u / (denom * denom);
            let db = if x > 0.0 {
                -2.0 * a * u * x.ln() / (denom * denom)
            } else {
                0.0
            };
            jtj[0][0] += da * da;
            jtj[0][1] += da * db;
            jtj[1][1] += db * db;
            jtr[0] += da * r;
            jtr[1] += db * r;
        }
        let m00 = jtj[0][0] * (1.0 + damping);
        let m11 = jtj[1][1] * (1.0 + damping);
        let m01 = jtj[0][1];
        let det = m00 * m11 - m01 * m01;
        if det.abs() < f64::EPSILON {
            break;
        }
        let step_a = -(m11 * jtr[0] - m01 * jtr[1]) / det;
        let step_b = -(m00 * jtr[1] - m01 * jtr[0]) / det;
        let (next_a, next_b) = (a + step_a, b + step_b);
        if next_a > 0.0 && next_b > 0.0 {
            let next = cost(next_a, next_b);
            if next < current {
                let improvement = current - next;
                (a, b, current) = (next_a, next_b, next);
                damping /= 10.0;
                if improvement < 1e-12 {
                    break;
                }
                continue;
            }
        }
        damping *= 10.0;
        if damping > 1e12 {
            break;
        }
    }
    (a, b)
}

fn curve(x: f64, a: f64, b: f64) -> f64 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

/// Two leading non-trivial eigenvectors of the normalized Laplacian, scaled
/// to `[-10, 10]`. `None` when the graph is disconnected or too small.
fn spectral_layout(graph: &NeighborGraph, rng: &mut Pcg32) -> Option<Vec<[f64; 2]>> {
    let n = graph.len();
    if n < 3 || !graph.is_connected() {
        return None;
    }
    let adjacency = graph.adjacency();
    let degree = adjacency
        .iter()
        .map(|row| row.iter().map(|&(_, w)| w).sum::<f64>())
        .collect::<Vec<_>>();
    if degree.iter().any(|&d| d <= 0.0) {
        return None;
    }
    let inv_sqrt = degree.iter().map(|d| d.sqrt().recip()).collect::<Vec<_>>();

    // eigenvectors of I + D^-1/2 W D^-1/2, largest first; the first one is
    // D^1/2 1 and is deflated away
    let mut basis = vec![normalized(degree.iter().map(|d| d.sqrt()).collect())?];
    for _ in 0..2 {
        let start = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
        let mut v = normalized(orthogonalized(start, &basis))?;
        for _ in 0..POWER_ITERATIONS {
            let mut next = v.clone();
            for (i, row) in adjacency.iter().enumerate() {
                for &(j, w) in row {
                    next[i] += inv_sqrt[i] * w * inv_sqrt[j] * v[j];
                }
            }
            let next = normalized(orthogonalized(next, &basis))?;
            let change = next
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            v = next;
            if change < 1e-10 {
                break;
            }
        }
        basis.push(v);
    }

    let max_abs = basis[1..]
        .iter()
        .flatten()
        .fold(0.0, |m: f64, v| m.max(v.abs()));
    if max_abs <= 0.0 {
        return None;
    }
    let scale = INIT_EXTENT / max_abs;
    Some(
        (0..n)
            .map(|i| {
                [
                    basis[1][i] * scale + rng.random_range(-1e-4..1e-4),
                    basis[2][i] * scale + rng.random_range(-1e-4..1e-4),
                ]
            })
            .collect(),
    )
}

fn orthogonalized(mut v: Vec<f64>, basis: &[Vec<f64>]) -> Vec<f64> {
    for u in basis {
        let dot = v.iter().zip(u).map(|(a, b)| a * b).sum::<f64>();
        for (x, y) in v.iter_mut().zip(u) {
            *x -= dot * y;
        }
    }
    v
}

fn normalized(mut v: Vec<f64>) -> Option<Vec<f64>> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return None;
    }
    for x in &mut v {
        *x /= norm;
    }
    Some(v)
}

/// Z-scored log local radius of every point in the original space.
struct DensityTarget {
    adjacency: Vec<Vec<(usize, f64)>>,
    target: Vec<f64>,
}

impl DensityTarget {
    fn new(graph: &NeighborGraph, matrix: &DistanceMatrix) -> Self {
        let adjacency = graph.adjacency();
        let radius = log_radius(&adjacency, |i, j| matrix.get(i, j).powi(2));
        Self {
            target: z_scores(&radius),
            adjacency,
        }
    }

    /// Moves neighbor pairs apart where the embedding is denser than the
    /// original space, and together where it is sparser.
    fn apply(&self, coords: &mut [[f64; 2]], strength: f64) {
        let radius = log_radius(&self.adjacency, |i, j| squared_distance(coords[i], coords[j]));
        let current = z_scores(&radius);
        let delta = self
            .target
            .iter()
            .zip(&current)
            .map(|(t, c)| t - c)
            .collect::<Vec<_>>();
        for (i, row) in self.adjacency.iter().enumerate() {
            for &(j, w) in row.iter().filter(|&&(j, _)| j > i) {
                let step = (strength * w * f64::midpoint(delta[i], delta[j]))
                    .clamp(-MAX_DENSITY_STEP, MAX_DENSITY_STEP)
                    / 2.0;
                let diff = [coords[i][0] - coords[j][0], coords[i][1] - coords[j][1]];
                for d in 0..2 {
                    coords[i][d] += diff[d] * step;
                    coords[j][d] -= diff[d] * step;
                }
            }
        }
    }
}

fn log_radius<F>(adjacency: &[Vec<(usize, f64)>], squared: F) -> Vec<f64>
where
    F: Fn(usize, usize) -> f64,
{
    adjacency
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let total = row.iter().map(|&(_, w)| w).sum::<f64>();
            if total <= 0.0 {
                return 0.0;
            }
            let weighted = row.iter().map(|&(j, w)| w * squared(i, j)).sum::<f64>();
            (weighted / total + 1e-12).ln()
        })
        .collect()
}

#[expect(clippy::cast_precision_loss)]
fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

fn squared_distance(p: [f64; 2], q: [f64; 2]) -> f64 {
    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)
}

struct Optimizer {
    a: f64,
    b: f64,
    n_epochs: usize,
    dens_lambda: f64,
}

impl Optimizer {
    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn run(
        &self,
        coords: &mut [[f64; 2]],
        graph: &NeighborGraph,
        density: Option<&DensityTarget>,
        rng: &mut Pcg32,
    ) {
        let n = coords.len();
        let max_weight = graph
            .edges()
            .iter()
            .map(|e| e.weight)
            .fold(0.0, f64::max);
        if max_weight <= 0.0 {
            return;
        }
        let n_epochs = self.n_epochs as f64;

        // both directions of every edge that is sampled at least once
        let edges = graph
            .edges()
            .iter()
            .filter(|e| e.weight >= max_weight / n_epochs)
            .flat_map(|e| {
                let every = max_weight / e.weight;
                [(e.source, e.target, every), (e.target, e.source, every)]
            })
            .collect::<Vec<_>>();
        let mut next_sample = edges.iter().map(|&(_, _, every)| every).collect::<Vec<_>>();
        let negative_every = edges
            .iter()
            .map(|&(_, _, every)| every / NEGATIVE_SAMPLE_RATE as f64)
            .collect::<Vec<_>>();
        let mut next_negative = negative_every.clone();

        let density_start = (n_epochs * DENSITY_START) as usize;
        for epoch in 0..self.n_epochs {
            let epoch_f = epoch as f64;
            let alpha = 1.0 - epoch_f / n_epochs;

            for (e, &(head, tail, every)) in edges.iter().enumerate() {
                if next_sample[e] > epoch_f {
                    continue;
                }
                let dist = squared_distance(coords[head], coords[tail]);
                let coeff = if dist > 0.0 {
                    -2.0 * self.a * self.b * dist.powf(self.b - 1.0)
                        / (self.a * dist.powf(self.b) + 1.0)
                } else {
                    0.0
                };
                for d in 0..2 {
                    let grad = clip(coeff * (coords[head][d] - coords[tail][d]));
                    coords[head][d] += grad * alpha;
                    coords[tail][d] -= grad * alpha;
                }
                next_sample[e] += every;

                let n_negative =
                    ((epoch_f - next_negative[e]) / negative_every[e]).max(0.0) as usize;
                for _ in 0..n_negative {
                    let other = rng.random_range(0..n);
                    if other == head {
                        continue;
                    }
                    let grad = self.repulsion(coords[head], coords[other]);
                    for d in 0..2 {
                        coords[head][d] += grad[d] * alpha;
                    }
                }
                next_negative[e] += n_negative as f64 * negative_every[e];
            }

            if let Some(density) = density
                && epoch >= density_start
            {
                density.apply(coords, self.dens_lambda * alpha * DENSITY_RATE);
            }
        }
    }

    /// Gradient pushing `head` away from a negative sample at `other`.
    ///
    /// Coincident points get the clipped maximum so duplicates separate.
    fn repulsion(&self, head: [f64; 2], other: [f64; 2]) -> [f64; 2] {
        let dist = squared_distance(head, other);
        if dist <= 0.0 {
            return [GRADIENT_CLIP; 2];
        }
        let coeff = 2.0 * self.b / ((0.001 + dist) * (self.a * dist.powf(self.b) + 1.0));
        [
            clip(coeff * (head[0] - other[0])),
            clip(coeff * (head[1] - other[1])),
        ]
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}
