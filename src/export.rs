//! Transposed re-export of a dataset slice.
//!
//! Rows become columns. The first transposed row (the values of the table's
//! first column, i.e. the region) becomes the header row of the exported
//! sheet; every other column becomes one body row. Column names of the
//! source table are not written.

use crate::coerce::Year;
use crate::error::{BtbError, Result};
use crate::store::{write_atomic, xlsx};
use crate::table::{Cell, Table};
use std::path::Path;
use tracing::info;

/// Sheet name of the exported workbook.
pub const TRANSPOSED_SHEET_NAME: &str = "Transposed Data";

/// A table turned on its side.
#[derive(Debug, Clone, PartialEq)]
pub struct Transposed {
    /// Values of the source table's first column.
    pub header: Vec<Cell>,
    /// One row per remaining source column.
    pub body: Vec<Vec<Cell>>,
}

impl Transposed {
    /// Header followed by body, as written to the sheet.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        std::iter::once(self.header.clone())
            .chain(self.body.iter().cloned())
            .collect()
    }
}

/// Transpose `table`; fails with [`BtbError::EmptyExport`] when there is
/// nothing to transpose.
pub fn transpose(table: &Table) -> Result<Transposed> {
    if table.is_empty() || table.column_count() == 0 {
        return Err(BtbError::EmptyExport);
    }
    let mut rows = (0..table.column_count())
        .map(|c| table.column_cells(c).cloned().collect::<Vec<Cell>>());
    let header = rows.next().unwrap_or_default();
    Ok(Transposed {
        header,
        body: rows.collect(),
    })
}

/// Encode the transposed table as workbook bytes.
pub fn export_transposed(table: &Table) -> Result<Vec<u8>> {
    let transposed = transpose(table)?;
    xlsx::write_workbook(TRANSPOSED_SHEET_NAME, &transposed.rows())
}

/// Write the transposed workbook to `path`, replacing any existing file.
pub fn save_transposed(table: &Table, path: &Path) -> Result<()> {
    let bytes = export_transposed(table)?;
    write_atomic(path, &bytes)?;
    info!("Wrote transposed export to {}", path.display());
    Ok(())
}

/// `BTB_Data_<region>_<year>_Transposed.xlsx`, with path separators replaced
/// by `_`.
pub fn download_file_name(region: &str, year: &Year) -> String {
    format!(
        "BTB_Data_{}_{}_Transposed.xlsx",
        file_safe(region),
        file_safe(&year.to_string())
    )
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_parts(
            vec!["Region".into(), "Year".into(), "Col1".into()],
            vec![
                vec![Cell::text("X"), Cell::Integer(2020), Cell::text("5")],
                vec![Cell::text("X"), Cell::Integer(2020), Cell::text("7")],
            ],
        )
    }

    #[test]
    fn transpose_turns_columns_into_rows() {
        let t = transpose(&sample()).unwrap();
        assert_eq!(t.header, vec![Cell::text("X"), Cell::text("X")]);
        assert_eq!(
            t.body,
            vec![
                vec![Cell::Integer(2020), Cell::Integer(2020)],
                vec![Cell::text("5"), Cell::text("7")],
            ]
        );
        let rows = t.rows();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn empty_table_fails_loudly() {
        let empty = Table::new(vec!["Region".into()]);
        assert!(matches!(transpose(&empty), Err(BtbError::EmptyExport)));
        assert!(matches!(
            export_transposed(&Table::default()),
            Err(BtbError::EmptyExport)
        ));
    }

    #[test]
    fn exported_workbook_has_transposed_sheet() {
        let bytes = export_transposed(&sample()).unwrap();
        let rows = xlsx::read_sheet(&bytes, "export.xlsx", TRANSPOSED_SHEET_NAME)
            .unwrap()
            .unwrap();
        assert_eq!(rows[0], vec![Cell::text("X"), Cell::text("X")]);
        assert_eq!(rows[1], vec![Cell::Integer(2020), Cell::Integer(2020)]);
        assert_eq!(rows[2], vec![Cell::text("5"), Cell::text("7")]);
    }

    #[test]
    fn save_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        save_transposed(&sample(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn file_name_replaces_path_separators() {
        assert_eq!(
            download_file_name("Kota Bandung", &Year::Numeric(2021)),
            "BTB_Data_Kota Bandung_2021_Transposed.xlsx"
        );
        assert_eq!(
            download_file_name("Kab./Kota\\X", &Year::Text("2020/2021".into())),
            "BTB_Data_Kab._Kota_X_2020_2021_Transposed.xlsx"
        );
    }
}
