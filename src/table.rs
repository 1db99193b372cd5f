//! Cell and table types shared by every pipeline stage.
//!
//! A [`Table`] is a rectangular grid with named columns: every row holds
//! exactly [`Table::column_count`] cells. Shorter rows are padded with
//! [`Cell::Empty`] when they are added, so downstream code never has to deal
//! with ragged data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row as emitted by table detection: `None` marks a grid slot that had
/// no cell at all.
pub type RawRow = Vec<Option<String>>;

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    #[default]
    Empty,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Integer(_) | Cell::Number(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(raw: Option<String>) -> Self {
        raw.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A rectangular grid of [`Cell`]s with named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// An empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw detected rows.
    ///
    /// The column count is the width of the widest row; columns are named by
    /// position (`"0"`, `"1"`, …) since no header row is assumed.
    pub fn from_raw_rows(raw: &[RawRow]) -> Self {
        let width = raw.iter().map(Vec::len).max().unwrap_or(0);
        let mut table = Table::new(positional_names(0, width));
        for row in raw {
            table.push_row(row.iter().cloned().map(Cell::from).collect());
        }
        table
    }

    /// Build a table from column names and rows, padding short rows.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the cells of column `index`, top to bottom.
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Append a row.
    ///
    /// Short rows are padded with [`Cell::Empty`]. A row wider than the table
    /// grows the table by positional column names, padding earlier rows.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        if row.len() > self.columns.len() {
            let extra = positional_names(self.columns.len(), row.len());
            self.columns.extend(extra);
            let width = self.columns.len();
            for existing in &mut self.rows {
                existing.resize(width, Cell::Empty);
            }
        }
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Insert a column at `index`, holding `value` in every row.
    pub fn insert_column(&mut self, index: usize, name: impl Into<String>, value: Cell) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, name.into());
        for row in &mut self.rows {
            row.insert(index, value.clone());
        }
    }

    /// Apply `f` to every cell of column `index`.
    pub(crate) fn map_column(&mut self, index: usize, mut f: impl FnMut(&mut Cell)) {
        for row in &mut self.rows {
            f(&mut row[index]);
        }
    }

    /// Rename every column through `f`.
    pub(crate) fn map_column_names(&mut self, f: impl Fn(&str) -> String) {
        for name in &mut self.columns {
            *name = f(name);
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Stack `other` beneath `self`, aligning columns by name.
    ///
    /// Columns of `self` keep their order; columns only present in `other`
    /// are appended in `other`'s order. Cells missing on either side are
    /// [`Cell::Empty`]. Row order is `self` first, then `other`.
    pub fn concat(mut self, other: Table) -> Table {
        let mut mapping = Vec::with_capacity(other.columns.len());
        for name in &other.columns {
            let idx = match self.column_index(name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(name.clone());
                    self.columns.len() - 1
                }
            };
            mapping.push(idx);
        }

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, Cell::Empty);
        }
        for row in other.rows {
            let mut aligned = vec![Cell::Empty; width];
            for (cell, &target) in row.into_iter().zip(&mapping) {
                aligned[target] = cell;
            }
            self.rows.push(aligned);
        }
        self
    }
}

fn positional_names(from: usize, to: usize) -> Vec<String> {
    (from..to).map(|i| i.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[Option<&str>]) -> RawRow {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn from_raw_rows_pads_to_widest_row() {
        let t = Table::from_raw_rows(&[
            raw(&[Some("a")]),
            raw(&[Some("b"), None, Some("c")]),
        ]);
        assert_eq!(t.columns(), &["0", "1", "2"]);
        assert_eq!(
            t.rows()[0],
            vec![Cell::text("a"), Cell::Empty, Cell::Empty]
        );
        assert_eq!(
            t.rows()[1],
            vec![Cell::text("b"), Cell::Empty, Cell::text("c")]
        );
    }

    #[test]
    fn from_raw_rows_empty_input() {
        let t = Table::from_raw_rows(&[]);
        assert_eq!(t.column_count(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn push_row_wider_than_table_grows_columns() {
        let mut t = Table::new(vec!["x".into()]);
        t.push_row(vec![Cell::Integer(1)]);
        t.push_row(vec![Cell::Integer(2), Cell::Integer(3)]);
        assert_eq!(t.columns(), &["x", "1"]);
        assert_eq!(t.rows()[0], vec![Cell::Integer(1), Cell::Empty]);
    }

    #[test]
    fn insert_column_fills_every_row() {
        let mut t = Table::from_parts(
            vec!["0".into()],
            vec![vec![Cell::text("a")], vec![Cell::text("b")]],
        );
        t.insert_column(0, "Kota/Kabupaten", Cell::text("Bandung"));
        assert_eq!(t.columns(), &["Kota/Kabupaten", "0"]);
        assert!(t.rows().iter().all(|r| r[0] == Cell::text("Bandung")));
    }

    #[test]
    fn concat_aligns_columns_by_name() {
        let a = Table::from_parts(
            vec!["k".into(), "0".into()],
            vec![vec![Cell::text("A"), Cell::Integer(1)]],
        );
        let b = Table::from_parts(
            vec!["k".into(), "0".into(), "1".into()],
            vec![vec![Cell::text("B"), Cell::Integer(2), Cell::text("x")]],
        );
        let c = a.concat(b);
        assert_eq!(c.columns(), &["k", "0", "1"]);
        assert_eq!(
            c.rows(),
            &[
                vec![Cell::text("A"), Cell::Integer(1), Cell::Empty],
                vec![Cell::text("B"), Cell::Integer(2), Cell::text("x")],
            ]
        );
    }

    #[test]
    fn concat_with_reordered_columns() {
        let a = Table::from_parts(vec!["a".into(), "b".into()], vec![]);
        let b = Table::from_parts(
            vec!["b".into(), "a".into()],
            vec![vec![Cell::Integer(2), Cell::Integer(1)]],
        );
        let c = a.concat(b);
        assert_eq!(c.rows()[0], vec![Cell::Integer(1), Cell::Integer(2)]);
    }

    #[test]
    fn cell_display() {
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::Integer(2020).to_string(), "2020");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::text("Kab. Bogor").to_string(), "Kab. Bogor");
    }

    #[test]
    fn cell_serialises_untagged() {
        let row = vec![Cell::Empty, Cell::Integer(3), Cell::text("x")];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[null,3,"x"]"#);
    }
}
