//! Distance travelled by each participant through the design space.
//!
//! A participant's solutions, ordered by solution number, form a path in the
//! embedding. The step lengths of that path are summarized for all solutions
//! (`FS`), the pre phase (`PRE`) and the post phase (`PST`), along with the
//! jump from the last pre solution to the first post solution.

use std::collections::BTreeMap;

use dsviz_data::solution::Phase;
use dsviz_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

/// An embedded solution with its position in the participant's sequence.
#[derive(Debug, Clone, Copy)]
pub struct ExplorationPoint<'a> {
    pub participant: &'a str,
    pub phase: Phase,
    /// Original solution number.
    pub solution: f64,
    pub coord: [f64; 2],
}

/// Step-length summary of one participant.
///
/// Totals are 0 for paths with fewer than two solutions; means and maxima are
/// then undefined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplorationMetrics {
    #[serde(rename = "totaldist_FS")]
    pub total_fs: f64,
    #[serde(rename = "avgdist_FS")]
    pub mean_fs: Option<f64>,
    #[serde(rename = "maxdist_FS")]
    pub max_fs: Option<f64>,
    #[serde(rename = "totaldist_PRE")]
    pub total_pre: f64,
    #[serde(rename = "avgdist_PRE")]
    pub mean_pre: Option<f64>,
    #[serde(rename = "maxdist_PRE")]
    pub max_pre: Option<f64>,
    #[serde(rename = "totaldist_PST")]
    pub total_post: f64,
    #[serde(rename = "avgdist_PST")]
    pub mean_post: Option<f64>,
    #[serde(rename = "maxdist_PST")]
    pub max_post: Option<f64>,
    /// Distance from the last pre solution to the first post solution.
    #[serde(rename = "dist_PRE_POST")]
    pub pre_to_post: Option<f64>,
}

/// Exploration metrics of every participant, gallery excluded.
///
/// # Examples
///
/// ```
/// use dsviz_analysis::exploration::{ExplorationPoint, exploration_metrics};
/// use dsviz_data::solution::Phase;
///
/// let point = |solution, phase, coord| ExplorationPoint { participant: "P01", phase, solution, coord };
/// let points = [
///     point(3.0, Phase::Post, [3.0, 4.0]),
///     point(1.0, Phase::Pre, [0.0, 0.0]),
///     point(2.0, Phase::Pre, [0.0, 4.0]),
/// ];
/// let metrics = exploration_metrics(&points);
/// let p01 = &metrics["P01"];
/// assert_eq!(p01.total_fs, 7.0);
/// assert_eq!(p01.max_fs, Some(4.0));
/// assert_eq!(p01.total_pre, 4.0);
/// assert_eq!(p01.total_post, 0.0);
/// assert_eq!(p01.mean_post, None);
/// assert_eq!(p01.pre_to_post, Some(3.0));
/// ```
#[must_use]
pub fn exploration_metrics(points: &[ExplorationPoint<'_>]) -> BTreeMap<String, ExplorationMetrics> {
    let mut grouped = BTreeMap::<&str, Vec<&ExplorationPoint<'_>>>::new();
    for p in points.iter().filter(|p| !p.phase.is_gallery()) {
        grouped.entry(p.participant).or_default().push(p);
    }

    grouped
        .into_iter()
        .map(|(participant, mut own)| {
            own.sort_by(|a, b| a.solution.total_cmp(&b.solution));
            let path = |keep: fn(Phase) -> bool| {
                own.iter()
                    .filter(|p| keep(p.phase))
                    .map(|p| p.coord)
                    .collect::<Vec<_>>()
            };
            let fs = step_stats(&path(|_| true));
            let pre_path = path(|p| p.is_pre());
            let post_path = path(|p| p.is_post());
            let pre = step_stats(&pre_path);
            let post = step_stats(&post_path);
            let pre_to_post = pre_path
                .last()
                .zip(post_path.first())
                .map(|(a, b)| distance(*a, *b));

            let metrics = ExplorationMetrics {
                total_fs: fs.as_ref().map_or(0.0, |s| s.sum),
                mean_fs: fs.as_ref().map(|s| s.mean),
                max_fs: fs.as_ref().map(|s| s.max),
                total_pre: pre.as_ref().map_or(0.0, |s| s.sum),
                mean_pre: pre.as_ref().map(|s| s.mean),
                max_pre: pre.as_ref().map(|s| s.max),
                total_post: post.as_ref().map_or(0.0, |s| s.sum),
                mean_post: post.as_ref().map(|s| s.mean),
                max_post: post.as_ref().map(|s| s.max),
                pre_to_post,
            };
            (participant.to_owned(), metrics)
        })
        .collect()
}

fn step_stats(path: &[[f64; 2]]) -> Option<DescriptiveStats> {
    DescriptiveStats::new(path.windows(2).map(|w| distance(w[0], w[1])))
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_is_excluded() {
        let points = [
            ExplorationPoint {
                participant: "GALL",
                phase: Phase::Gallery,
                solution: 1.0,
                coord: [0.0, 0.0],
            },
            ExplorationPoint {
                participant: "GALL",
                phase: Phase::Gallery,
                solution: 2.0,
                coord: [1.0, 0.0],
            },
        ];
        assert!(exploration_metrics(&points).is_empty());
    }

    #[test]
    fn test_single_solution() {
        let points = [ExplorationPoint {
            participant: "P02",
            phase: Phase::Pre,
            solution: 1.0,
            coord: [2.0, 2.0],
        }];
        let metrics = exploration_metrics(&points);
        assert_eq!(metrics["P02"], ExplorationMetrics::default());
    }

    #[test]
    fn test_serialized_names() {
        let metrics = ExplorationMetrics {
            total_fs: 1.5,
            ..ExplorationMetrics::default()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["totaldist_FS"], 1.5);
        assert!(json["dist_PRE_POST"].is_null());
    }
}
