//! String-typed tables backed by CSV.
//!
//! Spreadsheet sheets enter the pipeline as CSV exports. A [`Table`] keeps
//! every cell as text, exactly as exported, and leaves typing to the code
//! that knows what a column means. Cells that are empty, `nan` or `N/A` are
//! treated as missing.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

/// Error raised while reading, writing or querying a [`Table`].
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TableError {
    #[display("CSV error: {_0}")]
    #[from]
    Csv(csv::Error),
    #[display("I/O error: {_0}")]
    #[from]
    Io(io::Error),
    #[display("missing column `{name}`")]
    MissingColumn { name: String },
    #[display("duplicate column `{name}`")]
    DuplicateColumn { name: String },
    #[display("row {row} has {found} cells, expected {expected}")]
    RowLength {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Returns `true` if a cell represents a missing value.
///
/// # Examples
///
/// ```
/// # use dsviz_data::table::is_missing;
/// assert!(is_missing(""));
/// assert!(is_missing(" NaN "));
/// assert!(is_missing("N/A"));
/// assert!(!is_missing("0"));
/// ```
#[must_use]
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("n/a")
}

/// A rectangular table of text cells with named columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    header: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    pub fn new<I, S>(header: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header = header.into_iter().map(Into::into).collect::<Vec<String>>();
        let mut index = HashMap::with_capacity(header.len());
        for (i, name) in header.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(TableError::DuplicateColumn { name: name.clone() });
            }
        }
        Ok(Self {
            header,
            index,
            rows: vec![],
        })
    }

    /// Reads a table from CSV data with a header row.
    pub fn from_reader<R>(reader: R) -> Result<Self, TableError>
    where
        R: io::Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let mut table = Self::new(reader.headers()?.iter())?;
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(str::to_owned).collect())?;
        }
        Ok(table)
    }

    /// Reads a table from a CSV file.
    pub fn from_path<P>(path: P) -> Result<Self, TableError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Writes the table as CSV with a header row.
    pub fn write<W>(&self, writer: W) -> Result<(), TableError>
    where
        W: io::Write,
    {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table to a CSV file, replacing any existing file.
    pub fn write_path<P>(&self, path: P) -> Result<(), TableError>
    where
        P: AsRef<Path>,
    {
        let file = File::create(path)?;
        self.write(BufWriter::new(file))
    }

    /// Column names in order.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TableError::MissingColumn {
                name: name.to_owned(),
            })
    }

    /// Checks that every named column exists.
    pub fn require_columns<'a, I>(&self, names: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.column_index(name)?;
        }
        Ok(())
    }

    /// Raw cell text.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    /// Cell text of the named column, or `None` if the cell is missing.
    pub fn value(&self, row: usize, name: &str) -> Result<Option<&str>, TableError> {
        let col = self.column_index(name)?;
        let cell = self.cell(row, col);
        Ok((!is_missing(cell)).then_some(cell))
    }

    /// All values of the named column, `None` for missing cells.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&str>>, TableError> {
        let col = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| {
                let cell = row[col].as_str();
                (!is_missing(cell)).then_some(cell)
            })
            .collect())
    }

    /// Iterates over rows as slices of cells.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Appends a row. The row must have one cell per column.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), TableError> {
        if row.len() != self.header.len() {
            return Err(TableError::RowLength {
                row: self.rows.len(),
                found: row.len(),
                expected: self.header.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Appends a column. `values` must have one entry per row.
    pub fn push_column<S>(&mut self, name: S, values: Vec<String>) -> Result<(), TableError>
    where
        S: Into<String>,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TableError::DuplicateColumn { name });
        }
        if values.len() != self.rows.len() {
            return Err(TableError::RowLength {
                row: self.header.len(),
                found: values.len(),
                expected: self.rows.len(),
            });
        }
        self.index.insert(name.clone(), self.header.len());
        self.header.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }
}
