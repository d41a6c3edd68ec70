//! Human-readable solution attributes and cluster labels.
//!
//! The `ca_*` ("core attribute") strings condense the coded design columns
//! of a solution into short descriptions shown next to each point.

use std::collections::{BTreeMap, BTreeSet};

use dsviz_data::{
    masking::OriginalIds,
    solution::{Phase, format_id_number},
    table::{Table, TableError},
};
use serde::{Deserialize, Serialize};

use crate::distance::is_truthy;

/// Marker symbol of clusters 1 to 16.
pub const CLUSTER_SYMBOLS: [&str; 16] = [
    "circle",
    "diamond",
    "cross",
    "x",
    "pentagon",
    "hexagon",
    "star",
    "hexagram",
    "star-triangle-up",
    "star-triangle-down",
    "star-square",
    "star-diamond",
    "diamond-tall",
    "diamond-wide",
    "circle-open",
    "square",
];

/// Budget a passing solution is scored against.
pub const REFERENCE_BUDGET: f64 = 15_000.0;

const MATERIALS: [(&str, &str); 4] = [
    ("materialRoad", "road"),
    ("materialReinfRoad", "reinforced road"),
    ("materialWood", "wood"),
    ("materialSteel", "steel"),
];

/// Marker symbol of a 1-indexed cluster, `None` past the last symbol.
///
/// # Examples
///
/// ```
/// # use dsviz_analysis::features::cluster_symbol;
/// assert_eq!(cluster_symbol(1), Some("circle"));
/// assert_eq!(cluster_symbol(16), Some("square"));
/// assert_eq!(cluster_symbol(17), None);
/// assert_eq!(cluster_symbol(0), None);
/// ```
#[must_use]
pub fn cluster_symbol(cluster_id: usize) -> Option<&'static str> {
    cluster_id
        .checked_sub(1)
        .and_then(|i| CLUSTER_SYMBOLS.get(i))
        .copied()
}

/// Error raised while deriving attributes from a table row.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FeatureError {
    #[display("{_0}")]
    #[from]
    Table(TableError),
    #[display("column `{column}` row {row}: `{value}` is not a number")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// Descriptive attributes of one solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreAttributes {
    pub ca_sol: String,
    pub ca_deck: String,
    pub ca_str: String,
    pub ca_rck: String,
    pub ca_mtr: String,
    /// 0 for failed solutions, 1 otherwise.
    pub ca_perf: u8,
    /// `ca_perf * 15000 / budgetUsed`, 0 for a zero or missing budget.
    pub performance: f64,
}

impl CoreAttributes {
    /// Derives the attributes of `row`. Missing cells read as empty strings.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_analysis::features::CoreAttributes;
    /// use dsviz_data::table::Table;
    ///
    /// let csv = "type,numAnchorsUsed,deckType_1,deckType_2,deckShape_1,deckShape_2,deckShape_3,deckShape_4,\
    ///            structurePosition_Top,structurePosition_Rock,structurePosition_Bottom,\
    ///            structureShape_1,structureShape_2,structureSize,rockSupportShape,rockSupportMat,\
    ///            materialRoad,materialReinfRoad,materialWood,materialSteel,result,budgetUsed\n\
    ///            arch,3.0,single,fully_connected,flat,-,-,-,\
    ///            top_structure,no_structure,no_structure,\
    ///            arch,beam,large,no_support,-,\
    ///            yes,no,yes,no,pass,7500\n";
    /// let table = Table::from_reader(csv.as_bytes()).unwrap();
    /// let ca = CoreAttributes::from_row(&table, 0).unwrap();
    /// assert_eq!(ca.ca_sol, "arch | 3 anchors");
    /// assert_eq!(ca.ca_deck, "fully_connected | shape: flat");
    /// assert_eq!(ca.ca_str, "top | shape: arch beam | size: large");
    /// assert_eq!(ca.ca_rck, "no_support");
    /// assert_eq!(ca.ca_mtr, "road wood");
    /// assert_eq!(ca.performance, 2.0);
    /// ```
    pub fn from_row(table: &Table, row: usize) -> Result<Self, FeatureError> {
        let text = |column: &str| -> Result<&str, TableError> {
            Ok(table.value(row, column)?.map_or("", str::trim))
        };

        let ca_sol = format!(
            "{} | {} anchors",
            text("type")?,
            format_id_number(text("numAnchorsUsed")?)
        );

        let shapes = format!(
            "{} {} {} {}",
            text("deckShape_1")?,
            text("deckShape_2")?,
            text("deckShape_3")?,
            text("deckShape_4")?
        );
        let deck_type = text("deckType_2")?;
        let ca_deck = if deck_type == "fully_connected" {
            format!("{deck_type} | shape: {shapes}")
        } else {
            format!("{} {deck_type} | shape: {shapes}", text("deckType_1")?)
        }
        .replace(" -", "");

        let ca_str = format!(
            "{} {} {} | shape: {} {} | size: {}",
            text("structurePosition_Top")?,
            text("structurePosition_Rock")?,
            text("structurePosition_Bottom")?,
            text("structureShape_1")?,
            text("structureShape_2")?,
            text("structureSize")?
        )
        .replace(" no_structure", "")
        .replace("_structure", "")
        .replace('-', "")
        .replace("no ", "");

        let support = text("rockSupportShape")?;
        let ca_rck = if support == "no_support" {
            support.to_owned()
        } else {
            format!("{support} | {}", text("rockSupportMat")?)
        };

        let mut used = vec![];
        for (column, name) in MATERIALS {
            if is_truthy(text(column)?) {
                used.push(name);
            }
        }
        let ca_mtr = used.join(" ");

        let ca_perf = u8::from(text("result")? != "fail");
        let budget = text("budgetUsed")?;
        let budget = if budget.is_empty() {
            0.0
        } else {
            budget
                .parse::<f64>()
                .map_err(|_| FeatureError::NotNumeric {
                    column: "budgetUsed".to_owned(),
                    row,
                    value: budget.to_owned(),
                })?
        };

        Ok(Self {
            ca_sol,
            ca_deck,
            ca_str,
            ca_rck,
            ca_mtr,
            ca_perf,
            performance: performance(ca_perf, budget),
        })
    }
}

/// Performance score of a solution: `ca_perf * 15000 / budget`.
///
/// # Examples
///
/// ```
/// # use dsviz_analysis::features::performance;
/// assert_eq!(performance(1, 10_000.0), 1.5);
/// assert_eq!(performance(0, 10_000.0), 0.0);
/// assert_eq!(performance(1, 0.0), 0.0);
/// ```
#[must_use]
pub fn performance(ca_perf: u8, budget: f64) -> f64 {
    if budget > 0.0 && budget.is_finite() {
        f64::from(ca_perf) * REFERENCE_BUDGET / budget
    } else {
        0.0
    }
}

/// Hover label of a solution.
///
/// # Examples
///
/// ```
/// use dsviz_analysis::features::hover_text;
/// use dsviz_data::masking::OriginalIds;
///
/// let ids = OriginalIds {
///     participant: "P07".into(),
///     group: "G1".into(),
///     phase: "Pre".into(),
///     solution: "3".into(),
/// };
/// assert_eq!(hover_text(&ids, "pass"), "<b>P07 | Sol. 3</b><br>Pre | pass");
/// ```
#[must_use]
pub fn hover_text(ids: &OriginalIds, result: &str) -> String {
    format!(
        "<b>{} | Sol. {}</b><br>{} | {result}",
        ids.participant, ids.solution, ids.phase
    )
}

/// Number of distinct clusters a participant's solutions fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterCounts {
    pub n_clusters: usize,
    pub n_clusters_pre: usize,
    pub n_clusters_post: usize,
}

/// Distinct cluster counts per participant from `(participant, phase,
/// cluster_id)` triples. Gallery solutions are skipped.
///
/// # Examples
///
/// ```
/// use dsviz_analysis::features::cluster_counts;
/// use dsviz_data::solution::Phase;
///
/// let counts = cluster_counts([
///     ("P01", Phase::Pre, 1),
///     ("P01", Phase::Pre, 1),
///     ("P01", Phase::Post, 2),
///     ("GALL", Phase::Gallery, 3),
/// ]);
/// assert_eq!(counts.len(), 1);
/// assert_eq!(counts["P01"].n_clusters, 2);
/// assert_eq!(counts["P01"].n_clusters_pre, 1);
/// ```
pub fn cluster_counts<'a, I>(solutions: I) -> BTreeMap<String, ClusterCounts>
where
    I: IntoIterator<Item = (&'a str, Phase, usize)>,
{
    #[derive(Default)]
    struct Seen {
        all: BTreeSet<usize>,
        pre: BTreeSet<usize>,
        post: BTreeSet<usize>,
    }

    let mut seen = BTreeMap::<&str, Seen>::new();
    for (participant, phase, cluster) in solutions {
        if phase.is_gallery() {
            continue;
        }
        let entry = seen.entry(participant).or_default();
        entry.all.insert(cluster);
        if phase.is_pre() {
            entry.pre.insert(cluster);
        } else {
            entry.post.insert(cluster);
        }
    }
    seen.into_iter()
        .map(|(participant, s)| {
            (
                participant.to_owned(),
                ClusterCounts {
                    n_clusters: s.all.len(),
                    n_clusters_pre: s.pre.len(),
                    n_clusters_post: s.post.len(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[(&str, &str)]) -> Table {
        let mut table = Table::new(values.iter().map(|(k, _)| *k)).unwrap();
        table
            .push_row(values.iter().map(|(_, v)| (*v).to_owned()).collect())
            .unwrap();
        table
    }

    const FULL: [(&str, &str); 22] = [
        ("type", "beam"),
        ("numAnchorsUsed", "2"),
        ("deckType_1", "double"),
        ("deckType_2", "split"),
        ("deckShape_1", "curved"),
        ("deckShape_2", "flat"),
        ("deckShape_3", "-"),
        ("deckShape_4", "-"),
        ("structurePosition_Top", "no_structure"),
        ("structurePosition_Rock", "rock_structure"),
        ("structurePosition_Bottom", "bottom_structure"),
        ("structureShape_1", "truss"),
        ("structureShape_2", "-"),
        ("structureSize", "small"),
        ("rockSupportShape", "pillar"),
        ("rockSupportMat", "steel"),
        ("materialRoad", "yes"),
        ("materialReinfRoad", "yes"),
        ("materialWood", "no"),
        ("materialSteel", "yes"),
        ("result", "fail"),
        ("budgetUsed", "12000"),
    ];

    #[test]
    fn test_split_deck_and_support() {
        let ca = CoreAttributes::from_row(&row(&FULL), 0).unwrap();
        assert_eq!(ca.ca_sol, "beam | 2 anchors");
        assert_eq!(ca.ca_deck, "double split | shape: curved flat");
        assert_eq!(ca.ca_str, "rock bottom | shape: truss  | size: small");
        assert_eq!(ca.ca_rck, "pillar | steel");
        assert_eq!(ca.ca_mtr, "road reinforced road steel");
        assert_eq!(ca.ca_perf, 0);
        assert_eq!(ca.performance, 0.0);
    }

    #[test]
    fn test_bad_budget() {
        let mut values = FULL;
        values[21] = ("budgetUsed", "lots");
        assert!(matches!(
            CoreAttributes::from_row(&row(&values), 0),
            Err(FeatureError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_missing_column() {
        assert!(matches!(
            CoreAttributes::from_row(&row(&FULL[..5]), 0),
            Err(FeatureError::Table(_))
        ));
    }

    #[test]
    fn test_symbols_are_distinct() {
        let distinct = CLUSTER_SYMBOLS.iter().collect::<BTreeSet<_>>();
        assert_eq!(distinct.len(), CLUSTER_SYMBOLS.len());
    }
}
