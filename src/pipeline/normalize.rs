//! Cleaning and numeric reinterpretation of extracted tables.
//!
//! Every text cell is trimmed and stripped of `,` thousands separators. Then
//! each column is converted to numbers **all-or-nothing**: if every non-empty
//! cell parses, the whole column becomes numeric; otherwise every cell keeps
//! its cleaned text. A column that stays text is not an error, it is reported
//! as [`ColumnOutcome::Retained`].
//!
//! Running the normalizer on its own output changes nothing.

use crate::coerce::parse_number;
use crate::table::{Cell, RawRow, Table};
use serde::Serialize;
use tracing::debug;

/// What happened to one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ColumnOutcome {
    /// Every value parsed; the column is numeric now.
    Numeric,
    /// At least one value did not parse; the column keeps its text.
    /// `row` and `value` name the first blocking cell.
    Retained { row: usize, value: String },
}

impl ColumnOutcome {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnOutcome::Numeric)
    }
}

/// A cleaned table and the per-column outcome, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: Table,
    pub columns: Vec<ColumnOutcome>,
}

/// Build a table from raw rows and normalize it.
pub fn normalize(rows: &[RawRow]) -> Normalized {
    normalize_table(Table::from_raw_rows(rows))
}

/// Normalize an existing table in place.
pub fn normalize_table(mut table: Table) -> Normalized {
    let mut columns = Vec::with_capacity(table.column_count());

    for idx in 0..table.column_count() {
        table.map_column(idx, clean_cell);

        let outcome = classify(&table, idx);
        match &outcome {
            ColumnOutcome::Numeric => {
                table.map_column(idx, to_numeric);
                if table
                    .column_cells(idx)
                    .any(|c| matches!(c, Cell::Number(_)))
                {
                    table.map_column(idx, widen_integer);
                }
            }
            ColumnOutcome::Retained { row, value } => {
                debug!(
                    "Column '{}' kept as text: row {} holds {:?}",
                    table.columns()[idx],
                    row,
                    value
                );
            }
        }
        columns.push(outcome);
    }

    Normalized { table, columns }
}

/// Trim, drop thousands separators, trim again.
fn clean_cell(cell: &mut Cell) {
    if let Cell::Text(s) = cell {
        let cleaned = s.trim().replace(',', "");
        *s = cleaned.trim().to_string();
    }
}

fn classify(table: &Table, idx: usize) -> ColumnOutcome {
    for (row, cell) in table.column_cells(idx).enumerate() {
        if let Cell::Text(s) = cell {
            if !s.is_empty() && parse_number(s).is_none() {
                return ColumnOutcome::Retained {
                    row,
                    value: s.clone(),
                };
            }
        }
    }
    ColumnOutcome::Numeric
}

fn to_numeric(cell: &mut Cell) {
    if let Cell::Text(s) = cell {
        *cell = parse_number(s).unwrap_or(Cell::Empty);
    }
}

fn widen_integer(cell: &mut Cell) {
    if let Cell::Integer(i) = cell {
        *cell = Cell::Number(*i as f64);
    }
}
