//! Solution identity and study phases.
//!
//! Every solution row carries masked identifiers (random IDs assigned for
//! anonymization) and a phase tag. Gallery solutions are reference designs
//! shown to participants; they belong to no participant and use the
//! [`GALLERY`] tag in place of participant, group and phase.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::table::{Table, TableError};

/// Tag used for gallery solutions in place of participant, group and phase.
pub const GALLERY: &str = "GALL";

/// Columns identifying a solution in the source sheet.
pub const IDENTITY_COLUMNS: [&str; 5] = [
    "FullID",
    "ParticipantID",
    "SolutionID",
    "GroupID",
    "PrePost",
];

/// Phase of the study a solution was produced in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::IsVariant,
)]
pub enum Phase {
    /// Before the intervention.
    #[serde(rename = "Pre")]
    Pre,
    /// After the intervention.
    #[serde(rename = "Pst", alias = "Post")]
    Post,
    /// Gallery reference solution.
    #[serde(rename = "GALL")]
    Gallery,
}

impl Phase {
    /// Code used for this phase in original (unmasked) identifiers.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Phase::Pre => "Pre",
            Phase::Post => "Pst",
            Phase::Gallery => GALLERY,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown study phase `{value}`")]
pub struct ParsePhaseError {
    value: String,
}

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("pre") => Ok(Phase::Pre),
            s if s.eq_ignore_ascii_case("pst") || s.eq_ignore_ascii_case("post") => {
                Ok(Phase::Post)
            }
            s if s.eq_ignore_ascii_case(GALLERY) || s.eq_ignore_ascii_case("gallery") => {
                Ok(Phase::Gallery)
            }
            _ => Err(ParsePhaseError {
                value: s.to_owned(),
            }),
        }
    }
}

/// Masked identifiers of one solution, as found in the source sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedIds {
    /// Masked full identifier.
    pub full_id: String,
    /// Masked participant ID.
    pub participant: String,
    /// Masked solution ID.
    pub solution: String,
    /// Masked group ID.
    pub group: String,
    /// Masked phase code.
    pub phase: String,
}

impl MaskedIds {
    /// Reads the identity columns of `row`. Missing cells become empty strings.
    pub fn from_row(table: &Table, row: usize) -> Result<Self, TableError> {
        let get = |name| {
            table
                .value(row, name)
                .map(|v| v.unwrap_or_default().to_owned())
        };
        Ok(Self {
            full_id: get("FullID")?,
            participant: get("ParticipantID")?,
            solution: get("SolutionID")?,
            group: get("GroupID")?,
            phase: get("PrePost")?,
        })
    }

    /// Reads the identity columns of every row.
    pub fn all_from_table(table: &Table) -> Result<Vec<Self>, TableError> {
        table.require_columns(IDENTITY_COLUMNS)?;
        (0..table.len())
            .map(|row| Self::from_row(table, row))
            .collect()
    }
}

/// Formats a spreadsheet number the way identifiers are written: integral
/// values lose their trailing `.0`.
///
/// # Examples
///
/// ```
/// # use dsviz_data::solution::format_id_number;
/// assert_eq!(format_id_number("3.0"), "3");
/// assert_eq!(format_id_number("12"), "12");
/// assert_eq!(format_id_number("2.5"), "2.5");
/// assert_eq!(format_id_number("S7"), "S7");
/// ```
#[must_use]
pub fn format_id_number(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
            format!("{}", v.trunc())
        }
        _ => trimmed.to_owned(),
    }
}

/// Original full identifier `participant-phase-solution`.
///
/// # Examples
///
/// ```
/// # use dsviz_data::solution::{original_full_id, Phase};
/// assert_eq!(original_full_id("P07", "Pre", "3.0"), "P07-Pre-3");
/// ```
#[must_use]
pub fn original_full_id(participant: &str, phase: &str, solution: &str) -> String {
    format!("{participant}-{phase}-{}", format_id_number(solution))
}

/// Full identifier of a save file derived from its file stem.
///
/// Save files zero-pad the solution number (`P07-Pre-03`); identifiers do not.
///
/// # Examples
///
/// ```
/// # use dsviz_data::solution::full_id_from_stem;
/// assert_eq!(full_id_from_stem("P07-Pre-03"), "P07-Pre-3");
/// assert_eq!(full_id_from_stem("P07-Pst-12"), "P07-Pst-12");
/// ```
#[must_use]
pub fn full_id_from_stem(stem: &str) -> String {
    stem.replace("-0", "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phase() {
        assert_eq!("Pre".parse::<Phase>().unwrap(), Phase::Pre);
        assert_eq!("Pst".parse::<Phase>().unwrap(), Phase::Post);
        assert_eq!("post".parse::<Phase>().unwrap(), Phase::Post);
        assert_eq!("GALL".parse::<Phase>().unwrap(), Phase::Gallery);
        let err = "KYY".parse::<Phase>().unwrap_err();
        assert_eq!(err.to_string(), "unknown study phase `KYY`");
    }

    #[test]
    fn test_phase_serde_uses_original_codes() {
        let json = serde_json::to_string(&[Phase::Pre, Phase::Post, Phase::Gallery]).unwrap();
        assert_eq!(json, r#"["Pre","Pst","GALL"]"#);
        let parsed: Vec<Phase> = serde_json::from_str(r#"["Pre","Post","GALL"]"#).unwrap();
        assert_eq!(parsed, vec![Phase::Pre, Phase::Post, Phase::Gallery]);
    }

    #[test]
    fn test_masked_ids_from_table() {
        let csv = "FullID,ParticipantID,SolutionID,GroupID,PrePost,type\n\
                   X1,R11,901,G2,KYY,arch\n\
                   X2,R12,,G2,ZSB,beam\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        let ids = MaskedIds::all_from_table(&table).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].participant, "R11");
        assert_eq!(ids[0].phase, "KYY");
        assert_eq!(ids[1].solution, "");
    }

    #[test]
    fn test_masked_ids_require_identity_columns() {
        let table = Table::from_reader("FullID,ParticipantID\nX,Y\n".as_bytes()).unwrap();
        assert!(MaskedIds::all_from_table(&table).is_err());
    }
}
