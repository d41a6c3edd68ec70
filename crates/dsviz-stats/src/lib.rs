//! Numerical building blocks for design-space analysis.
//!
//! This crate provides the small, dependency-free statistical and geometric
//! tools the analysis pipeline is built on:
//!
//! - **Descriptive statistics**: min, max, sum, mean, median, variance, standard deviation
//! - **Convex hulls**: hull polygon and enclosed area of a 2D point set
//! - **Kernel density estimation**: Gaussian KDE with Scott's bandwidth in two dimensions
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`hull`]: Convex hull construction and polygon area
//! - [`kde`]: Bivariate Gaussian kernel density estimation
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use dsviz_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.sum, 15.0);
//! ```
//!
//! ## Measuring the area covered by a point set
//!
//! ```
//! use dsviz_stats::hull::ConvexHull;
//!
//! let points = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [1.0, 1.0]];
//! let hull = ConvexHull::new(&points);
//! assert_eq!(hull.vertices().len(), 4);
//! assert_eq!(hull.area(), 4.0);
//! ```
//!
//! ## Estimating density
//!
//! ```
//! use dsviz_stats::kde::GaussianKde;
//!
//! let points = [[0.0, 0.0], [1.0, 0.5], [0.5, 1.0], [3.0, 3.0]];
//! let kde = GaussianKde::new(&points).unwrap();
//! assert!(kde.evaluate([0.5, 0.5]) > kde.evaluate([3.0, 3.0]));
//! ```

pub mod descriptive;
pub mod hull;
pub mod kde;
