//! Result types returned by the public API.

use crate::coerce::{Coercion, Year};
use crate::pipeline::normalize::ColumnOutcome;
use crate::table::{RawRow, Table};
use serde::{Deserialize, Serialize};

/// Every table found in one PDF, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub tables: Vec<DetectedTable>,
    pub stats: ExtractionStats,
}

impl ExtractedDocument {
    /// Every raw row across all tables: page order, then table order within
    /// the page, then row order within the table.
    pub fn rows(&self) -> Vec<RawRow> {
        self.tables
            .iter()
            .flat_map(|t| t.rows.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.rows_found == 0
    }
}

/// One table detected on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTable {
    /// 1-indexed page number.
    pub page: usize,
    /// 0-indexed position of the table on its page.
    pub index: usize,
    pub rows: Vec<RawRow>,
}

/// Counters gathered while scanning a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages actually scanned after applying the page selection.
    pub scanned_pages: usize,
    pub tables_found: usize,
    /// Always the sum of the row counts of `tables`.
    pub rows_found: usize,
    pub duration_ms: u64,
}

/// A normalized table together with what happened to each column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub table: Table,
    pub columns: Vec<ColumnOutcome>,
    pub stats: ExtractionStats,
}

/// What one append did to the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendReport {
    pub rows_appended: usize,
    /// Rows in the dataset after the append.
    pub total_rows: usize,
    /// `true` when this append created the dataset.
    pub created: bool,
    pub region: String,
    /// The year as stored.
    pub year: Year,
    /// Whether the year input parsed as an integer.
    #[serde(skip)]
    pub year_coercion: Coercion<i64>,
}

/// One distinct (region, year) batch in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchKey {
    pub region: String,
    pub year: Year,
}

/// Result of a full PDF import: extraction, normalization and append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub extraction: ExtractionStats,
    pub columns: Vec<ColumnOutcome>,
    pub append: AppendReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| Some(c.to_string())).collect()
    }

    #[test]
    fn rows_flatten_in_document_order() {
        let doc = ExtractedDocument {
            tables: vec![
                DetectedTable {
                    page: 1,
                    index: 0,
                    rows: vec![raw(&["a"]), raw(&["b"])],
                },
                DetectedTable {
                    page: 2,
                    index: 0,
                    rows: vec![raw(&["c", "d"])],
                },
            ],
            stats: ExtractionStats {
                rows_found: 3,
                tables_found: 2,
                ..Default::default()
            },
        };
        let rows = doc.rows();
        assert_eq!(rows.len(), doc.stats.rows_found);
        assert_eq!(rows[0], raw(&["a"]));
        assert_eq!(rows[2], raw(&["c", "d"]));
        assert!(!doc.is_empty());
    }

    #[test]
    fn batch_key_serialises_year_untagged() {
        let k = BatchKey {
            region: "Kota Bandung".into(),
            year: Year::Numeric(2021),
        };
        assert_eq!(
            serde_json::to_string(&k).unwrap(),
            r#"{"region":"Kota Bandung","year":2021}"#
        );
    }
}
