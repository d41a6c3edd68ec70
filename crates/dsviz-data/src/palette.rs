//! Participant colours.
//!
//! The colour sheet assigns each masked participant (`P`) a hex colour
//! (`HEX-Win`). Gallery solutions usually have their own entry.

use std::collections::HashMap;

use crate::table::{Table, TableError};

/// Column of the colour sheet holding masked participant IDs.
pub const PARTICIPANT_COLUMN: &str = "P";
/// Column of the colour sheet holding hex colours.
pub const COLOR_COLUMN: &str = "HEX-Win";

/// Lookup of participant colours by masked participant ID.
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    by_participant: HashMap<String, String>,
}

impl ColorTable {
    /// Builds the lookup from the colour sheet. Rows missing either cell are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_data::{palette::ColorTable, table::Table};
    ///
    /// let table = Table::from_reader("P,HEX-Win\nR11,#1f77b4\n".as_bytes()).unwrap();
    /// let colors = ColorTable::from_table(&table).unwrap();
    /// assert_eq!(colors.color_for("R11"), Some("#1f77b4"));
    /// assert_eq!(colors.color_for("R12"), None);
    /// ```
    pub fn from_table(table: &Table) -> Result<Self, TableError> {
        let participants = table.column_values(PARTICIPANT_COLUMN)?;
        let colors = table.column_values(COLOR_COLUMN)?;
        let by_participant = participants
            .into_iter()
            .zip(colors)
            .filter_map(|(p, c)| Some((p?.trim().to_owned(), c?.trim().to_owned())))
            .collect();
        Ok(Self { by_participant })
    }

    /// Colour of a masked participant.
    #[must_use]
    pub fn color_for(&self, participant: &str) -> Option<&str> {
        self.by_participant
            .get(participant.trim())
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_participant.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_participant.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_with_missing_cells_are_skipped() {
        let table = Table::from_reader("P,HEX-Win\nR1,#000000\nR2,\n,#ffffff\n".as_bytes()).unwrap();
        let colors = ColorTable::from_table(&table).unwrap();
        assert_eq!(colors.len(), 1);
        assert_eq!(colors.color_for(" R1 "), Some("#000000"));
    }

    #[test]
    fn test_missing_color_column() {
        let table = Table::from_reader("P,Color\nR1,#000000\n".as_bytes()).unwrap();
        assert!(ColorTable::from_table(&table).is_err());
    }
}
