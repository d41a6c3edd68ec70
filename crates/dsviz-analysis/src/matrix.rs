//! Square symmetric distance matrices.

use serde::{Deserialize, Serialize};

/// Error raised when a serialized matrix is not a valid distance matrix.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum MatrixError {
    #[display("distance matrix of size {size} needs {expected} values, got {found}")]
    Shape {
        size: usize,
        expected: usize,
        found: usize,
    },
    #[display("distance at ({row}, {column}) is not a finite non-negative number")]
    InvalidEntry { row: usize, column: usize },
    #[display("distance matrix is not symmetric at ({row}, {column})")]
    Asymmetric { row: usize, column: usize },
    #[display("distance matrix has a non-zero diagonal at {index}")]
    NonZeroDiagonal { index: usize },
}

/// A dense `n x n` distance matrix with a zero diagonal.
///
/// Matrices are always built through [`DistanceMatrix::from_fn`], which only
/// evaluates the upper triangle and mirrors it, so symmetry holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    size: usize,
    values: Vec<f64>,
}

impl TryFrom<RawMatrix> for DistanceMatrix {
    type Error = MatrixError;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        let RawMatrix { size, values } = raw;
        let expected = size * size;
        if values.len() != expected {
            return Err(MatrixError::Shape {
                size,
                expected,
                found: values.len(),
            });
        }
        for row in 0..size {
            for column in 0..size {
                let d = values[row * size + column];
                if !d.is_finite() || d < 0.0 {
                    return Err(MatrixError::InvalidEntry { row, column });
                }
                if row == column && d != 0.0 {
                    return Err(MatrixError::NonZeroDiagonal { index: row });
                }
                if column > row && d != values[column * size + row] {
                    return Err(MatrixError::Asymmetric { row, column });
                }
            }
        }
        Ok(Self { size, values })
    }
}

impl DistanceMatrix {
    /// Builds a matrix by evaluating `distance(i, j)` for every `i < j`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_analysis::matrix::DistanceMatrix;
    ///
    /// let m = DistanceMatrix::from_fn(3, |i, j| (j - i) as f64);
    /// assert_eq!(m.get(0, 2), 2.0);
    /// assert_eq!(m.get(2, 0), 2.0);
    /// assert_eq!(m.get(1, 1), 0.0);
    /// ```
    pub fn from_fn<F>(size: usize, mut distance: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            for j in (i + 1)..size {
                let d = distance(i, j);
                values[i * size + j] = d;
                values[j * size + i] = d;
            }
        }
        Self { size, values }
    }

    /// Euclidean distances between 2D points.
    #[must_use]
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        Self::from_fn(points.len(), |i, j| {
            let [xi, yi] = points[i];
            let [xj, yj] = points[j];
            (xi - xj).hypot(yi - yj)
        })
    }

    /// Number of rows (and columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance between `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.size && j < self.size, "index out of bounds");
        self.values[i * self.size + j]
    }

    /// Distances from `i` to every row.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Largest off-diagonal value, or 0 for matrices smaller than 2x2.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Divides every entry by `divisor`. A zero divisor leaves the matrix unchanged.
    pub fn normalize_by(&mut self, divisor: f64) {
        if divisor > 0.0 {
            for v in &mut self.values {
                *v /= divisor;
            }
        }
    }

    /// Returns `true` if the matrix is symmetric with a zero diagonal.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0..self.size).all(|i| {
            self.get(i, i) == 0.0 && (i + 1..self.size).all(|j| self.get(i, j) == self.get(j, i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let m = DistanceMatrix::from_points(&[[0.0, 0.0], [3.0, 4.0], [0.0, 1.0]]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(0, 1), 5.0);
        assert_eq!(m.get(2, 0), 1.0);
        assert_eq!(m.row(0), &[0.0, 5.0, 1.0]);
        assert_eq!(m.max_value(), 5.0);
        assert!(m.is_valid());
    }

    #[test]
    fn test_normalize_by() {
        let mut m = DistanceMatrix::from_fn(2, |_, _| 4.0);
        m.normalize_by(m.max_value());
        assert_eq!(m.get(0, 1), 1.0);
        let mut zero = DistanceMatrix::from_fn(2, |_, _| 0.0);
        zero.normalize_by(0.0);
        assert_eq!(zero.get(0, 1), 0.0);
    }

    #[test]
    fn test_serde_rejects_bad_shape() {
        let m = DistanceMatrix::from_fn(2, |_, _| 1.0);
        let json = serde_json::to_string(&m).unwrap();
        let back: DistanceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        let err = serde_json::from_str::<DistanceMatrix>(r#"{"size":2,"values":[0.0]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_serde_rejects_bad_values() {
        let parse = |values: &str| {
            serde_json::from_str::<DistanceMatrix>(&format!(r#"{{"size":2,"values":{values}}}"#))
                .map_err(|e| e.to_string())
        };
        assert!(parse("[0.0, 0.5, 0.5, 0.0]").is_ok());
        assert!(parse("[0.0, 0.5, 0.7, 0.0]").unwrap_err().contains("not symmetric"));
        assert!(parse("[0.1, 0.5, 0.5, 0.0]").unwrap_err().contains("non-zero diagonal"));
        assert!(parse("[0.0, -0.5, -0.5, 0.0]").unwrap_err().contains("(0, 1)"));
        // serde_json has no NaN literal; a null entry fails as well
        assert!(parse("[0.0, null, null, 0.0]").is_err());

        let raw = RawMatrix {
            size: 2,
            values: vec![0.0, f64::NAN, f64::NAN, 0.0],
        };
        assert_eq!(
            DistanceMatrix::try_from(raw),
            Err(MatrixError::InvalidEntry { row: 0, column: 1 })
        );
    }

    #[test]
    fn test_empty() {
        let m = DistanceMatrix::from_points(&[]);
        assert!(m.is_empty());
        assert_eq!(m.max_value(), 0.0);
    }
}
