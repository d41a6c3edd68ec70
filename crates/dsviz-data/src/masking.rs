//! Masking keys and unmasking.
//!
//! The study data is anonymized: participant, group, phase and solution IDs
//! in the main sheet are random codes. Four key sheets map each random code
//! back to the original ID. Unmasking is a left join, so a code with no key
//! entry (gallery solutions, typically) simply has no original ID; the
//! gallery fallbacks of [`OriginalIds::resolve`] fill those in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    solution::{GALLERY, MaskedIds, format_id_number},
    table::{Table, TableError},
};

/// Kind of identifier a masking key translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Solution,
    Participant,
    Group,
    Phase,
}

impl KeyKind {
    pub const ALL: [KeyKind; 4] = [
        KeyKind::Solution,
        KeyKind::Participant,
        KeyKind::Group,
        KeyKind::Phase,
    ];

    /// Name of the key sheet.
    #[must_use]
    pub fn sheet_name(self) -> &'static str {
        match self {
            KeyKind::Solution => "SolutionMasking",
            KeyKind::Participant => "ParticipantMasking",
            KeyKind::Group => "GroupMasking",
            KeyKind::Phase => "PrePostMasking",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            KeyKind::Solution => "Sol",
            KeyKind::Participant => "PT",
            KeyKind::Group => "Group",
            KeyKind::Phase => "PrePost",
        }
    }

    /// Column of the key sheet holding random codes.
    #[must_use]
    pub fn random_column(self) -> String {
        format!("RandomID_{}", self.suffix())
    }

    /// Column holding original IDs, in the key sheet and in unmasked tables.
    #[must_use]
    pub fn original_column(self) -> String {
        format!("OriginalID_{}", self.suffix())
    }

    /// Column of the main sheet holding the masked code.
    #[must_use]
    pub fn masked_column(self) -> &'static str {
        match self {
            KeyKind::Solution => "SolutionID",
            KeyKind::Participant => "ParticipantID",
            KeyKind::Group => "GroupID",
            KeyKind::Phase => "PrePost",
        }
    }
}

/// A single random-to-original lookup.
#[derive(Debug, Clone, Default)]
pub struct MaskingKey {
    map: HashMap<String, String>,
}

impl MaskingKey {
    /// Builds a key from a key sheet. Rows with a missing code are skipped.
    pub fn from_table(kind: KeyKind, table: &Table) -> Result<Self, TableError> {
        let random = table.column_values(&kind.random_column())?;
        let original = table.column_values(&kind.original_column())?;
        let map = random
            .into_iter()
            .zip(original)
            .filter_map(|(r, o)| Some((normalize_code(r?), o?.trim().to_owned())))
            .collect();
        Ok(Self { map })
    }

    /// Original ID for a random code.
    #[must_use]
    pub fn unmask(&self, code: &str) -> Option<&str> {
        self.map.get(&normalize_code(code)).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// spreadsheet exports write integer codes as `901` or `901.0`
fn normalize_code(code: &str) -> String {
    format_id_number(code)
}

/// The four masking keys of the study.
#[derive(Debug, Clone, Default)]
pub struct MaskingKeys {
    keys: HashMap<KeyKind, MaskingKey>,
}

impl MaskingKeys {
    /// Builds the keys from one table per [`KeyKind`].
    ///
    /// `load` is called once per kind with the kind to load.
    pub fn load<F, E>(mut load: F) -> Result<Self, E>
    where
        F: FnMut(KeyKind) -> Result<Table, E>,
        E: From<TableError>,
    {
        let mut keys = HashMap::new();
        for kind in KeyKind::ALL {
            let table = load(kind)?;
            keys.insert(kind, MaskingKey::from_table(kind, &table)?);
        }
        Ok(Self { keys })
    }

    /// Key for one identifier kind.
    #[must_use]
    pub fn key(&self, kind: KeyKind) -> Option<&MaskingKey> {
        self.keys.get(&kind)
    }

    /// Adds one `OriginalID_*` column per key to a copy of `table`.
    ///
    /// Codes without a key entry get an empty cell.
    pub fn unmask_table(&self, table: &Table) -> Result<Table, TableError> {
        let mut unmasked = table.clone();
        for kind in KeyKind::ALL {
            let values = self.unmask_column(table, kind.masked_column(), kind)?;
            unmasked.push_column(kind.original_column(), values)?;
        }
        Ok(unmasked)
    }

    /// Adds the `OriginalID_PT` column to a copy of the colour table (keyed by `P`).
    pub fn unmask_colors(&self, colors: &Table) -> Result<Table, TableError> {
        let mut unmasked = colors.clone();
        let kind = KeyKind::Participant;
        let values = self.unmask_column(colors, "P", kind)?;
        unmasked.push_column(kind.original_column(), values)?;
        Ok(unmasked)
    }

    fn unmask_column(
        &self,
        table: &Table,
        column: &str,
        kind: KeyKind,
    ) -> Result<Vec<String>, TableError> {
        let key = self.key(kind);
        Ok(table
            .column_values(column)?
            .into_iter()
            .map(|code| {
                code.and_then(|code| key.and_then(|k| k.unmask(code)))
                    .unwrap_or_default()
                    .to_owned()
            })
            .collect())
    }
}

/// Original identifiers of a solution after gallery fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalIds {
    pub participant: String,
    pub group: String,
    pub phase: String,
    pub solution: String,
}

impl OriginalIds {
    /// Reads the `OriginalID_*` columns of an unmasked table row and applies
    /// gallery fallbacks: a missing participant, group or phase becomes
    /// [`GALLERY`], a missing solution number becomes the masked solution ID.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_data::{masking::OriginalIds, table::Table};
    ///
    /// let csv = "SolutionID,OriginalID_Sol,OriginalID_PT,OriginalID_Group,OriginalID_PrePost\n\
    ///            901,3.0,P07,G1,Pre\n\
    ///            17,,,,\n";
    /// let table = Table::from_reader(csv.as_bytes()).unwrap();
    ///
    /// let ids = OriginalIds::resolve(&table, 0).unwrap();
    /// assert_eq!(ids.solution, "3");
    /// assert_eq!(ids.participant, "P07");
    ///
    /// let gallery = OriginalIds::resolve(&table, 1).unwrap();
    /// assert_eq!(gallery.participant, "GALL");
    /// assert_eq!(gallery.phase, "GALL");
    /// assert_eq!(gallery.solution, "17");
    /// ```
    pub fn resolve(table: &Table, row: usize) -> Result<Self, TableError> {
        let original = |kind: KeyKind| -> Result<Option<String>, TableError> {
            Ok(table
                .value(row, &kind.original_column())?
                .map(|v| v.trim().to_owned()))
        };
        let or_gallery = |v: Option<String>| v.unwrap_or_else(|| GALLERY.to_owned());

        let solution = match original(KeyKind::Solution)? {
            Some(sol) => format_id_number(&sol),
            None => format_id_number(
                table
                    .value(row, KeyKind::Solution.masked_column())?
                    .unwrap_or_default(),
            ),
        };
        Ok(Self {
            participant: or_gallery(original(KeyKind::Participant)?),
            group: or_gallery(original(KeyKind::Group)?),
            phase: or_gallery(original(KeyKind::Phase)?),
            solution,
        })
    }

    /// Returns `true` for gallery solutions.
    #[must_use]
    pub fn is_gallery(&self) -> bool {
        self.participant == GALLERY
    }
}

/// Original identifiers for a masked solution, looked up directly in the keys.
///
/// This is the single-row counterpart of [`MaskingKeys::unmask_table`] followed
/// by [`OriginalIds::resolve`].
#[must_use]
pub fn unmask_ids(keys: &MaskingKeys, masked: &MaskedIds) -> OriginalIds {
    let lookup = |kind: KeyKind, code: &str| {
        keys.key(kind)
            .and_then(|k| k.unmask(code))
            .map(str::to_owned)
    };
    let or_gallery = |v: Option<String>| v.unwrap_or_else(|| GALLERY.to_owned());
    OriginalIds {
        participant: or_gallery(lookup(KeyKind::Participant, &masked.participant)),
        group: or_gallery(lookup(KeyKind::Group, &masked.group)),
        phase: or_gallery(lookup(KeyKind::Phase, &masked.phase)),
        solution: format_id_number(
            &lookup(KeyKind::Solution, &masked.solution).unwrap_or_else(|| masked.solution.clone()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> MaskingKeys {
        MaskingKeys::load(|kind| {
            let csv = match kind {
                KeyKind::Solution => "RandomID_Sol,OriginalID_Sol\n901,1\n902.0,2\n",
                KeyKind::Participant => "RandomID_PT,OriginalID_PT\nR11,P01\nR12,P02\n",
                KeyKind::Group => "RandomID_Group,OriginalID_Group,Description_Group\nG9,G1,control\n",
                KeyKind::Phase => "RandomID_PrePost,OriginalID_PrePost\nKYY,Pre\nZSB,Pst\n",
            };
            Table::from_reader(csv.as_bytes())
        })
        .unwrap()
    }

    fn masked_table() -> Table {
        let csv = "FullID,ParticipantID,SolutionID,GroupID,PrePost\n\
                   X1,R11,901,G9,KYY\n\
                   X2,R12,902,G9,ZSB\n\
                   X3,GX,55,GX,GX\n";
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_unmask_table_adds_original_columns() {
        let unmasked = keys().unmask_table(&masked_table()).unwrap();
        assert_eq!(unmasked.value(0, "OriginalID_PT").unwrap(), Some("P01"));
        assert_eq!(unmasked.value(1, "OriginalID_Sol").unwrap(), Some("2"));
        assert_eq!(unmasked.value(1, "OriginalID_PrePost").unwrap(), Some("Pst"));
        assert_eq!(unmasked.value(2, "OriginalID_PT").unwrap(), None);
        // masked columns are untouched
        assert_eq!(unmasked.value(0, "ParticipantID").unwrap(), Some("R11"));
    }

    #[test]
    fn test_gallery_fallback() {
        let unmasked = keys().unmask_table(&masked_table()).unwrap();
        let ids = OriginalIds::resolve(&unmasked, 2).unwrap();
        assert!(ids.is_gallery());
        assert_eq!(ids.group, GALLERY);
        assert_eq!(ids.phase, GALLERY);
        assert_eq!(ids.solution, "55");
    }

    #[test]
    fn test_unmask_ids_matches_table_path() {
        let keys = keys();
        let table = masked_table();
        let unmasked = keys.unmask_table(&table).unwrap();
        for (row, masked) in MaskedIds::all_from_table(&table).unwrap().iter().enumerate() {
            assert_eq!(
                unmask_ids(&keys, masked),
                OriginalIds::resolve(&unmasked, row).unwrap()
            );
        }
    }

    #[test]
    fn test_unmask_colors() {
        let colors = Table::from_reader("P,HEX-Win\nR11,#ff0000\nR99,#00ff00\n".as_bytes()).unwrap();
        let unmasked = keys().unmask_colors(&colors).unwrap();
        assert_eq!(unmasked.value(0, "OriginalID_PT").unwrap(), Some("P01"));
        assert_eq!(unmasked.value(1, "OriginalID_PT").unwrap(), None);
    }

    #[test]
    fn test_missing_key_column() {
        let table = Table::from_reader("RandomID_PT\nR1\n".as_bytes()).unwrap();
        assert!(MaskingKey::from_table(KeyKind::Participant, &table).is_err());
    }
}
