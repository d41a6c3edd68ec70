//! Convex hulls of 2D point sets.
//!
//! The hull is built with Andrew's monotone chain algorithm and its area is
//! computed with the shoelace formula. Degenerate inputs never fail: fewer
//! than three distinct points, or points that are all collinear, produce a
//! hull with zero area whose vertices are the distinct extreme points.
//!
//! # Examples
//!
//! ```
//! use dsviz_stats::hull::ConvexHull;
//!
//! // Two points cannot enclose an area.
//! let hull = ConvexHull::new(&[[0.0, 0.0], [1.0, 1.0]]);
//! assert_eq!(hull.area(), 0.0);
//! assert!(hull.is_degenerate());
//!
//! let hull = ConvexHull::new(&[[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]]);
//! assert_eq!(hull.area(), 6.0);
//! ```

/// Convex hull of a set of 2D points.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    /// Hull vertices in counter-clockwise order, without repeating the first vertex.
    vertices: Vec<[f64; 2]>,
    area: f64,
}

impl ConvexHull {
    /// Builds the convex hull of `points`.
    ///
    /// Non-finite points are ignored.
    #[must_use]
    pub fn new(points: &[[f64; 2]]) -> Self {
        let mut sorted = points
            .iter()
            .copied()
            .filter(|p| p[0].is_finite() && p[1].is_finite())
            .collect::<Vec<_>>();
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        sorted.dedup();

        if sorted.len() < 3 {
            return Self {
                vertices: sorted,
                area: 0.0,
            };
        }

        let mut lower: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
        for &p in &sorted {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(p);
        }

        let mut upper: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
        for &p in sorted.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(p);
        }

        // last point of each chain is the first point of the other
        lower.pop();
        upper.pop();
        lower.extend(upper);
        let vertices = lower;

        let area = if vertices.len() < 3 {
            0.0
        } else {
            polygon_area(&vertices)
        };
        Self { vertices, area }
    }

    /// Hull vertices in counter-clockwise order.
    #[must_use]
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Area enclosed by the hull.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Returns `true` if the hull encloses no area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.area <= 0.0
    }

    /// Vertex x coordinates, in hull order.
    #[must_use]
    pub fn xs(&self) -> Vec<f64> {
        self.vertices.iter().map(|v| v[0]).collect()
    }

    /// Vertex y coordinates, in hull order.
    #[must_use]
    pub fn ys(&self) -> Vec<f64> {
        self.vertices.iter().map(|v| v[1]).collect()
    }
}

/// Absolute area of a simple polygon given by its vertices (shoelace formula).
///
/// # Examples
///
/// ```
/// # use dsviz_stats::hull::polygon_area;
/// let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
/// assert_eq!(polygon_area(&square), 1.0);
/// ```
#[must_use]
pub fn polygon_area(vertices: &[[f64; 2]]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let twice_area = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum::<f64>();
    twice_area.abs() / 2.0
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_single_point() {
        assert_eq!(ConvexHull::new(&[]).area(), 0.0);
        let hull = ConvexHull::new(&[[1.0, 2.0]]);
        assert_eq!(hull.area(), 0.0);
        assert_eq!(hull.vertices(), &[[1.0, 2.0]]);
    }

    #[test]
    fn test_collinear_points_have_zero_area() {
        let hull = ConvexHull::new(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        assert_eq!(hull.area(), 0.0);
        assert!(hull.is_degenerate());
        assert_eq!(hull.vertices(), &[[0.0, 0.0], [3.0, 3.0]]);
    }

    #[test]
    fn test_duplicate_points_are_ignored() {
        let hull = ConvexHull::new(&[[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [1.0, 0.0]]);
        assert_eq!(hull.area(), 0.0);
        assert_eq!(hull.vertices().len(), 2);
    }

    #[test]
    fn test_interior_points_are_dropped() {
        let points = [
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 4.0],
            [0.0, 4.0],
            [2.0, 2.0],
            [1.0, 3.0],
            [2.0, 0.0],
        ];
        let hull = ConvexHull::new(&points);
        assert_eq!(hull.vertices().len(), 4);
        assert_eq!(hull.area(), 16.0);
    }

    #[test]
    fn test_triangle_area_positive() {
        let hull = ConvexHull::new(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert!((hull.area() - 0.5).abs() < 1e-12);
        assert!(!hull.is_degenerate());
    }

    #[test]
    fn test_non_finite_points_are_ignored() {
        let hull = ConvexHull::new(&[[0.0, 0.0], [f64::NAN, 1.0], [1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(hull.vertices().len(), 3);
    }

    #[test]
    fn test_vertices_are_counter_clockwise() {
        let hull = ConvexHull::new(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]);
        assert_eq!(hull.xs(), vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(hull.ys(), vec![0.0, 0.0, 1.0, 1.0]);
    }
}
