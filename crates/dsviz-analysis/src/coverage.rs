//! Design-space coverage of participants.
//!
//! The design space is the convex hull of every embedded solution. A
//! participant's coverage is the area of the hull of their own solutions as a
//! percentage of the design-space area, computed for all their solutions and
//! for each phase separately.

use std::collections::BTreeMap;

use dsviz_data::solution::Phase;
use dsviz_stats::hull::ConvexHull;
use serde::{Deserialize, Serialize};

/// Key of the design-space hull in [`CoverageReport::hull_records`].
pub const FULL_DESIGN_SPACE: &str = "full_ds";

/// An embedded solution with the identifiers coverage is grouped by.
#[derive(Debug, Clone, Copy)]
pub struct CoveragePoint<'a> {
    pub participant: &'a str,
    pub phase: Phase,
    pub coord: [f64; 2],
}

/// Hull areas and coverage percentages of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantCoverage {
    pub area_fs: f64,
    pub area_pre: f64,
    pub area_post: f64,
    /// `None` when the design-space area is 0.
    pub perc_fs: Option<f64>,
    /// `None` when the participant has no pre solutions.
    pub perc_pre: Option<f64>,
    /// `None` when the participant has no post solutions.
    pub perc_post: Option<f64>,
}

/// Serialized form of a hull: vertex coordinates and area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullRecord {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub area: f64,
}

impl From<&ConvexHull> for HullRecord {
    fn from(hull: &ConvexHull) -> Self {
        Self {
            x: hull.xs(),
            y: hull.ys(),
            area: hull.area(),
        }
    }
}

/// Coverage of every participant.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    design_space: ConvexHull,
    hulls: BTreeMap<String, ConvexHull>,
    participants: BTreeMap<String, ParticipantCoverage>,
}

impl CoverageReport {
    /// Computes hulls and coverage for `points`.
    ///
    /// The design space spans every point, gallery solutions included;
    /// gallery solutions get no coverage entry of their own.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_analysis::coverage::{CoveragePoint, CoverageReport};
    /// use dsviz_data::solution::Phase;
    ///
    /// let point = |participant, phase, coord| CoveragePoint { participant, phase, coord };
    /// let points = [
    ///     point("GALL", Phase::Gallery, [0.0, 0.0]),
    ///     point("GALL", Phase::Gallery, [4.0, 0.0]),
    ///     point("GALL", Phase::Gallery, [0.0, 4.0]),
    ///     point("GALL", Phase::Gallery, [4.0, 4.0]),
    ///     point("P01", Phase::Pre, [0.0, 0.0]),
    ///     point("P01", Phase::Pre, [2.0, 0.0]),
    ///     point("P01", Phase::Post, [0.0, 2.0]),
    /// ];
    /// let report = CoverageReport::new(&points);
    /// assert_eq!(report.design_space_area(), 16.0);
    ///
    /// let p01 = report.participant("P01").unwrap();
    /// assert_eq!(p01.area_fs, 2.0);
    /// assert_eq!(p01.perc_fs, Some(12.5));
    /// assert_eq!(p01.perc_pre, Some(0.0));
    /// assert!(report.participant("GALL").is_none());
    /// ```
    #[must_use]
    pub fn new(points: &[CoveragePoint<'_>]) -> Self {
        let all = points.iter().map(|p| p.coord).collect::<Vec<_>>();
        let design_space = ConvexHull::new(&all);
        let ds_area = design_space.area();

        let mut grouped = BTreeMap::<&str, Vec<&CoveragePoint<'_>>>::new();
        for p in points.iter().filter(|p| !p.phase.is_gallery()) {
            grouped.entry(p.participant).or_default().push(p);
        }

        let percent = |area: f64| (ds_area > 0.0).then(|| area / ds_area * 100.0);
        let mut hulls = BTreeMap::new();
        let mut participants = BTreeMap::new();
        for (participant, own) in grouped {
            let coords = |filter: fn(Phase) -> bool| {
                own.iter()
                    .filter(|p| filter(p.phase))
                    .map(|p| p.coord)
                    .collect::<Vec<_>>()
            };
            let fs = ConvexHull::new(&coords(|_| true));
            let pre = coords(|p| p.is_pre());
            let post = coords(|p| p.is_post());
            let area_pre = ConvexHull::new(&pre).area();
            let area_post = ConvexHull::new(&post).area();

            participants.insert(
                participant.to_owned(),
                ParticipantCoverage {
                    area_fs: fs.area(),
                    area_pre,
                    area_post,
                    perc_fs: percent(fs.area()),
                    perc_pre: if pre.is_empty() { None } else { percent(area_pre) },
                    perc_post: if post.is_empty() { None } else { percent(area_post) },
                },
            );
            hulls.insert(participant.to_owned(), fs);
        }

        Self {
            design_space,
            hulls,
            participants,
        }
    }

    /// Area of the hull around every point.
    #[must_use]
    pub fn design_space_area(&self) -> f64 {
        self.design_space.area()
    }

    #[must_use]
    pub fn design_space(&self) -> &ConvexHull {
        &self.design_space
    }

    #[must_use]
    pub fn participant(&self, participant: &str) -> Option<&ParticipantCoverage> {
        self.participants.get(participant)
    }

    /// Coverage per participant, ordered by participant ID.
    pub fn participants(&self) -> impl Iterator<Item = (&str, &ParticipantCoverage)> {
        self.participants.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The design-space hull under [`FULL_DESIGN_SPACE`] and one full-set
    /// hull per participant.
    #[must_use]
    pub fn hull_records(&self) -> BTreeMap<String, HullRecord> {
        let mut records = self
            .hulls
            .iter()
            .map(|(k, hull)| (k.clone(), HullRecord::from(hull)))
            .collect::<BTreeMap<_, _>>();
        records.insert(
            FULL_DESIGN_SPACE.to_owned(),
            HullRecord::from(&self.design_space),
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(participant: &str, phase: Phase, coord: [f64; 2]) -> CoveragePoint<'_> {
        CoveragePoint {
            participant,
            phase,
            coord,
        }
    }

    #[test]
    fn test_missing_phase_is_undefined() {
        let points = [
            point("A", Phase::Pre, [0.0, 0.0]),
            point("A", Phase::Pre, [1.0, 0.0]),
            point("A", Phase::Pre, [0.0, 1.0]),
            point("B", Phase::Post, [5.0, 5.0]),
        ];
        let report = CoverageReport::new(&points);
        let a = report.participant("A").unwrap();
        assert!(a.perc_pre.is_some());
        assert_eq!(a.perc_post, None);
        assert_eq!(a.area_post, 0.0);
        let b = report.participant("B").unwrap();
        assert_eq!(b.perc_fs, Some(0.0));
        assert_eq!(b.perc_pre, None);
    }

    #[test]
    fn test_degenerate_design_space() {
        let points = [
            point("A", Phase::Pre, [0.0, 0.0]),
            point("A", Phase::Post, [1.0, 1.0]),
            point("A", Phase::Post, [2.0, 2.0]),
        ];
        let report = CoverageReport::new(&points);
        assert_eq!(report.design_space_area(), 0.0);
        let a = report.participant("A").unwrap();
        assert_eq!(a.perc_fs, None);
        assert_eq!(a.perc_pre, None);
        assert_eq!(a.perc_post, None);
    }

    #[test]
    fn test_hull_records() {
        let points = [
            point("A", Phase::Pre, [0.0, 0.0]),
            point("A", Phase::Pre, [2.0, 0.0]),
            point("A", Phase::Post, [0.0, 2.0]),
            point("GALL", Phase::Gallery, [3.0, 3.0]),
        ];
        let records = CoverageReport::new(&points).hull_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records["A"].area, 2.0);
        assert_eq!(records["A"].x.len(), 3);
        assert!(records[FULL_DESIGN_SPACE].area > records["A"].area);
    }
}
