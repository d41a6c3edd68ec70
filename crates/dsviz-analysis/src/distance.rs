//! Mixed-type dissimilarity between solutions.
//!
//! The distance between two solutions combines two terms:
//!
//! - a weighted **Gower distance** over design attributes. Numeric attributes
//!   contribute `|a - b| / range`, categorical attributes contribute 0 when
//!   equal and 1 otherwise. Attributes missing in either row are skipped and
//!   the weighted mean is taken over the remaining ones.
//! - a weighted **Jaccard distance** over the set of materials each solution
//!   uses, `1 - w(A ∩ B) / w(A ∪ B)`. Two solutions using no material at all
//!   are identical under this term.
//!
//! The two are mixed as `(1 - alpha) * gower + alpha * jaccard`, where
//! `alpha` is [`AttributeSchema::jaccard_weight`]. When the schema lists no
//! material columns the Gower term is used alone. With
//! [`AttributeSchema::normalize`] set, the result is scaled so that the
//! largest distance is 1.
//!
//! # Examples
//!
//! ```
//! use dsviz_analysis::distance::{AttributeSchema, WeightedColumn, distance_matrix};
//! use dsviz_data::table::Table;
//!
//! let csv = "deck,anchors,materialWood,materialSteel\n\
//!            arch,2,yes,no\n\
//!            arch,3,yes,yes\n\
//!            beam,3,no,yes\n";
//! let table = Table::from_reader(csv.as_bytes()).unwrap();
//! let schema = AttributeSchema {
//!     categorical: vec![WeightedColumn::new("deck")],
//!     numeric: vec![WeightedColumn::new("anchors")],
//!     materials: vec![WeightedColumn::new("materialWood"), WeightedColumn::new("materialSteel")],
//!     jaccard_weight: 0.5,
//!     normalize: true,
//! };
//! let m = distance_matrix(&table, &schema).unwrap();
//! assert_eq!(m.len(), 3);
//! assert_eq!(m.get(0, 0), 0.0);
//! assert_eq!(m.get(0, 2), 1.0);
//! assert!(m.get(0, 1) < m.get(0, 2));
//! ```

use std::collections::HashMap;

use dsviz_data::table::{Table, TableError};
use serde::{Deserialize, Serialize};

use crate::matrix::DistanceMatrix;

/// A table column with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedColumn {
    pub column: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl WeightedColumn {
    /// A column with weight 1.
    pub fn new<S>(column: S) -> Self
    where
        S: Into<String>,
    {
        Self::with_weight(column, 1.0)
    }

    pub fn with_weight<S>(column: S, weight: f64) -> Self
    where
        S: Into<String>,
    {
        Self {
            column: column.into(),
            weight,
        }
    }
}

/// Which columns take part in the distance, and how much each counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSchema {
    /// Categorical design attributes (Gower term).
    pub categorical: Vec<WeightedColumn>,
    /// Numeric design attributes (Gower term).
    pub numeric: Vec<WeightedColumn>,
    /// Material-usage flags (Jaccard term).
    pub materials: Vec<WeightedColumn>,
    /// Mixing weight `alpha` of the Jaccard term, in `[0, 1]`.
    pub jaccard_weight: f64,
    /// Scale the matrix so that its largest entry is 1.
    pub normalize: bool,
}

impl Default for AttributeSchema {
    /// Design attributes coded in the study spreadsheet.
    fn default() -> Self {
        let columns = |names: &[&str]| names.iter().map(|&n| WeightedColumn::new(n)).collect();
        Self {
            categorical: columns(&[
                "type",
                "deckType_1",
                "deckType_2",
                "deckShape_1",
                "deckShape_2",
                "deckShape_3",
                "deckShape_4",
                "structurePosition_Top",
                "structurePosition_Rock",
                "structurePosition_Bottom",
                "structureShape_1",
                "structureShape_2",
                "structureSize",
                "rockSupportShape",
                "rockSupportMat",
            ]),
            numeric: columns(&["numAnchorsUsed"]),
            materials: columns(&[
                "materialRoad",
                "materialReinfRoad",
                "materialWood",
                "materialSteel",
            ]),
            jaccard_weight: 0.5,
            normalize: true,
        }
    }
}

impl AttributeSchema {
    /// Every column named by the schema.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.categorical
            .iter()
            .chain(&self.numeric)
            .chain(&self.materials)
            .map(|c| c.column.as_str())
    }

    /// Replaces the weight of every column listed in `weights`.
    ///
    /// Returns the names in `weights` that match no schema column.
    pub fn apply_weights(&mut self, weights: &HashMap<String, f64>) -> Vec<String> {
        let mut unused = weights.keys().cloned().collect::<Vec<_>>();
        for column in self
            .categorical
            .iter_mut()
            .chain(&mut self.numeric)
            .chain(&mut self.materials)
        {
            if let Some(&w) = weights.get(&column.column) {
                column.weight = w;
                unused.retain(|name| name != &column.column);
            }
        }
        unused.sort();
        unused
    }

    /// Checks weights and the mixing factor.
    pub fn validate(&self) -> Result<(), DistanceError> {
        if !(0.0..=1.0).contains(&self.jaccard_weight) {
            return Err(DistanceError::InvalidSchema {
                reason: format!("jaccard_weight must be in [0, 1], got {}", self.jaccard_weight),
            });
        }
        if self.categorical.is_empty() && self.numeric.is_empty() && self.materials.is_empty() {
            return Err(DistanceError::InvalidSchema {
                reason: "no attribute columns".to_owned(),
            });
        }
        for column in self
            .categorical
            .iter()
            .chain(&self.numeric)
            .chain(&self.materials)
        {
            if !column.weight.is_finite() || column.weight < 0.0 {
                return Err(DistanceError::InvalidSchema {
                    reason: format!("weight of `{}` must be non-negative", column.column),
                });
            }
        }
        Ok(())
    }
}

/// Error raised while building a distance matrix.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum DistanceError {
    #[display("{_0}")]
    #[from]
    Table(TableError),
    #[display("column `{column}` row {row}: `{value}` is not a number")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[display("invalid attribute schema: {reason}")]
    InvalidSchema { reason: String },
}

/// Returns `true` for cells that flag a material as used.
///
/// # Examples
///
/// ```
/// # use dsviz_analysis::distance::is_truthy;
/// assert!(is_truthy("yes"));
/// assert!(is_truthy("1.0"));
/// assert!(!is_truthy("no"));
/// assert!(!is_truthy("0"));
/// ```
#[must_use]
pub fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    ["yes", "y", "true"]
        .iter()
        .any(|t| cell.eq_ignore_ascii_case(t))
        || cell.parse::<f64>().is_ok_and(|v| v > 0.0)
}

struct NumericColumn {
    weight: f64,
    values: Vec<Option<f64>>,
    range: f64,
}

struct CategoricalColumn<'a> {
    weight: f64,
    values: Vec<Option<&'a str>>,
}

/// Computes the all-pairs distance matrix of `table` under `schema`.
pub fn distance_matrix(
    table: &Table,
    schema: &AttributeSchema,
) -> Result<DistanceMatrix, DistanceError> {
    schema.validate()?;

    let categorical = schema
        .categorical
        .iter()
        .map(|c| {
            Ok(CategoricalColumn {
                weight: c.weight,
                values: table
                    .column_values(&c.column)?
                    .into_iter()
                    .map(|v| v.map(str::trim))
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, DistanceError>>()?;

    let numeric = schema
        .numeric
        .iter()
        .map(|c| numeric_column(table, c))
        .collect::<Result<Vec<_>, _>>()?;

    let materials = schema
        .materials
        .iter()
        .map(|c| {
            Ok((
                c.weight,
                table
                    .column_values(&c.column)?
                    .into_iter()
                    .map(|v| v.is_some_and(is_truthy))
                    .collect::<Vec<_>>(),
            ))
        })
        .collect::<Result<Vec<_>, DistanceError>>()?;

    let alpha = if materials.is_empty() {
        0.0
    } else {
        schema.jaccard_weight
    };

    let mut matrix = DistanceMatrix::from_fn(table.len(), |i, j| {
        let gower = gower(&categorical, &numeric, i, j);
        let jaccard = jaccard(&materials, i, j);
        (1.0 - alpha) * gower + alpha * jaccard
    });
    if schema.normalize {
        let max = matrix.max_value();
        matrix.normalize_by(max);
    }
    log::debug!(
        "distance matrix: {} rows, max distance {}",
        matrix.len(),
        matrix.max_value()
    );
    Ok(matrix)
}

fn numeric_column(table: &Table, column: &WeightedColumn) -> Result<NumericColumn, DistanceError> {
    let values = table
        .column_values(&column.column)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|v| {
                v.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| DistanceError::NotNumeric {
                        column: column.column.clone(),
                        row,
                        value: v.to_owned(),
                    })
            })
            .transpose()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (min, max) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = if max > min { max - min } else { 0.0 };
    Ok(NumericColumn {
        weight: column.weight,
        values,
        range,
    })
}

fn gower(categorical: &[CategoricalColumn<'_>], numeric: &[NumericColumn], i: usize, j: usize) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;
    for c in categorical {
        if let (Some(a), Some(b)) = (c.values[i], c.values[j]) {
            total += c.weight * if a == b { 0.0 } else { 1.0 };
            weight += c.weight;
        }
    }
    for c in numeric {
        if let (Some(a), Some(b)) = (c.values[i], c.values[j]) {
            let d = if c.range > 0.0 {
                (a - b).abs() / c.range
            } else {
                0.0
            };
            total += c.weight * d;
            weight += c.weight;
        }
    }
    if weight > 0.0 { total / weight } else { 0.0 }
}

fn jaccard(materials: &[(f64, Vec<bool>)], i: usize, j: usize) -> f64 {
    let mut intersection = 0.0;
    let mut union = 0.0;
    for (w, used) in materials {
        match (used[i], used[j]) {
            (true, true) => {
                intersection += w;
                union += w;
            }
            (true, false) | (false, true) => union += w,
            (false, false) => {}
        }
    }
    if union > 0.0 {
        1.0 - intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(alpha: f64, normalize: bool) -> AttributeSchema {
        AttributeSchema {
            categorical: vec![WeightedColumn::new("a"), WeightedColumn::with_weight("b", 3.0)],
            numeric: vec![WeightedColumn::new("n")],
            materials: vec![WeightedColumn::new("m1"), WeightedColumn::new("m2")],
            jaccard_weight: alpha,
            normalize,
        }
    }

    fn table() -> Table {
        let csv = "a,b,n,m1,m2\n\
                   x,p,0,yes,no\n\
                   x,q,10,yes,yes\n\
                   y,p,5,no,no\n\
                   ,p,,no,no\n";
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_symmetric_zero_diagonal() {
        let m = distance_matrix(&table(), &schema(0.3, true)).unwrap();
        assert!(m.is_valid());
        for i in 0..m.len() {
            for j in 0..m.len() {
                assert!((0.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn test_gower_and_jaccard_terms() {
        let m = distance_matrix(&table(), &schema(0.0, false)).unwrap();
        // rows 0/1: a equal, b differs (w=3), n differs by 10/10
        assert!((m.get(0, 1) - (0.0 + 3.0 + 1.0) / 5.0).abs() < 1e-12);
        // rows 2/3: only b is comparable and equal
        assert_eq!(m.get(2, 3), 0.0);

        let m = distance_matrix(&table(), &schema(1.0, false)).unwrap();
        // {m1} vs {m1, m2}
        assert!((m.get(0, 1) - 0.5).abs() < 1e-12);
        // both empty
        assert_eq!(m.get(2, 3), 0.0);
        // {m1} vs {}
        assert_eq!(m.get(0, 2), 1.0);
    }

    #[test]
    fn test_normalized_max_is_one() {
        let m = distance_matrix(&table(), &schema(0.5, true)).unwrap();
        assert!((m.max_value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_without_materials_uses_gower_only() {
        let mut s = schema(0.8, false);
        s.materials.clear();
        let m = distance_matrix(&table(), &s).unwrap();
        assert!((m.get(0, 1) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        let bad = Table::from_reader("a,b,n,m1,m2\nx,p,abc,yes,no\n".as_bytes()).unwrap();
        let err = distance_matrix(&bad, &schema(0.5, true)).unwrap_err();
        assert_eq!(err.to_string(), "column `n` row 0: `abc` is not a number");

        let mut s = schema(0.5, true);
        s.numeric.push(WeightedColumn::new("missing"));
        assert!(matches!(
            distance_matrix(&table(), &s),
            Err(DistanceError::Table(_))
        ));

        assert!(schema(1.5, true).validate().is_err());
        let mut s = schema(0.5, true);
        s.categorical[0].weight = -1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_apply_weights() {
        let mut s = schema(0.5, true);
        let weights = HashMap::from([("b".to_owned(), 0.5), ("zzz".to_owned(), 2.0)]);
        let unused = s.apply_weights(&weights);
        assert_eq!(s.categorical[1].weight, 0.5);
        assert_eq!(unused, vec!["zzz".to_owned()]);
    }

    #[test]
    fn test_default_schema_is_valid() {
        let s = AttributeSchema::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.columns().count(), 20);
    }
}
