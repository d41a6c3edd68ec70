//! Design-space analysis of bridge solutions.
//!
//! This crate turns a table of coded solutions into the quantities the
//! visualization is built from:
//!
//! - [`distance`]: mixed Gower/Jaccard dissimilarity between solutions
//! - [`matrix`]: the symmetric distance matrix type
//! - [`embedding`]: UMAP-style 2D layout of the distance matrix
//! - [`graph`]: the weighted neighbor graph produced by the embedding
//! - [`cluster`]: Leiden (CPM) communities on the neighbor graph
//! - [`coverage`]: hull areas and design-space coverage per participant
//! - [`novelty`]: density and neighbor-count novelty scores
//! - [`exploration`]: distance travelled per participant
//! - [`features`]: readable attribute summaries, cluster symbols and counts
//! - [`record`]: records of the final solution table and its metadata
//!
//! The stages are pure functions; reading and writing files is left to the
//! caller.
//!
//! # Examples
//!
//! ```
//! use dsviz_analysis::{
//!     cluster::{ClusterParams, leiden},
//!     embedding::{EmbeddingParams, embed},
//!     matrix::DistanceMatrix,
//!     novelty::NoveltyScores,
//! };
//!
//! let points = (0..16)
//!     .map(|i| [f64::from(i % 4) + f64::from(i / 8) * 50.0, f64::from(i / 4)])
//!     .collect::<Vec<_>>();
//! let matrix = DistanceMatrix::from_points(&points);
//!
//! let params = EmbeddingParams { n_neighbors: 5, n_epochs: Some(100), ..EmbeddingParams::default() };
//! let embedding = embed(&matrix, &params).unwrap();
//! let clusters = leiden(&embedding.graph, &ClusterParams::default());
//! let novelty = NoveltyScores::new(&embedding.coords, 0.9);
//!
//! assert_eq!(clusters.len(), 16);
//! assert!(clusters.labels().iter().all(|&c| (1..=16).contains(&c)));
//! assert_eq!(novelty.novel_nn.len(), 16);
//! ```

pub mod cluster;
pub mod coverage;
pub mod distance;
pub mod embedding;
pub mod exploration;
pub mod features;
pub mod graph;
pub mod matrix;
pub mod novelty;
pub mod record;
