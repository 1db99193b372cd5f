//! Top-level entry points: extract, preview, import.
//!
//! These glue the pipeline stages and the store together for the three user
//! actions. Everything runs synchronously on the calling thread.
//!
//! ```text
//! extract_tables ──▶ preview ──▶ (confirm) ──▶ Store::append
//! ```

use crate::config::ExtractionConfig;
use crate::error::{BtbError, Result};
use crate::output::{ExtractedDocument, ImportReport, Preview};
use crate::pipeline::extract::extract_document;
use crate::pipeline::input::PdfInput;
use crate::pipeline::normalize::normalize;
use crate::store::Store;
use std::path::Path;
use tracing::{info, warn};

/// Detect every ruled table in a PDF file.
///
/// # Errors
/// Input validation errors, [`BtbError::Format`] when pdfium cannot parse
/// the document, password errors, and [`BtbError::PageOutOfRange`] when the
/// page selection misses the document entirely.
pub fn extract_tables(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractedDocument> {
    extract_document(PdfInput::Path(path.as_ref()), config)
}

/// Detect every ruled table in an in-memory PDF, e.g. an uploaded file.
pub fn extract_tables_from_bytes(
    name: &str,
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractedDocument> {
    extract_document(PdfInput::Bytes { name, data: bytes }, config)
}

/// Extract and normalize a PDF file without touching the dataset.
///
/// A document without tables yields an empty preview, not an error.
pub fn preview(path: impl AsRef<Path>, config: &ExtractionConfig) -> Result<Preview> {
    let doc = extract_tables(path, config)?;
    Ok(preview_document(&doc))
}

/// [`preview`] for an in-memory PDF.
pub fn preview_bytes(name: &str, bytes: &[u8], config: &ExtractionConfig) -> Result<Preview> {
    let doc = extract_tables_from_bytes(name, bytes, config)?;
    Ok(preview_document(&doc))
}

/// Normalize the rows of an already extracted document.
pub fn preview_document(doc: &ExtractedDocument) -> Preview {
    let normalized = normalize(&doc.rows());
    let retained = normalized
        .columns
        .iter()
        .filter(|c| !c.is_numeric())
        .count();
    info!(
        "Normalized {} rows x {} columns ({} kept as text)",
        normalized.table.row_count(),
        normalized.table.column_count(),
        retained
    );
    Preview {
        table: normalized.table,
        columns: normalized.columns,
        stats: doc.stats.clone(),
    }
}

/// Extract, normalize and append a PDF to the dataset in one step.
///
/// Callers that want the user to confirm first should call [`preview`] and
/// then [`Store::append`] themselves.
///
/// # Errors
/// Everything [`extract_tables`] and [`Store::append`] return, plus
/// [`BtbError::NoTablesFound`] when there is nothing to append.
pub fn import_pdf(
    path: impl AsRef<Path>,
    region: &str,
    year: &str,
    config: &ExtractionConfig,
    store: &Store,
) -> Result<ImportReport> {
    let path = path.as_ref();
    let preview = preview(path, config)?;
    import_preview(&path.display().to_string(), preview, region, year, store)
}

/// Append a confirmed preview to the dataset.
pub fn import_preview(
    source_name: &str,
    preview: Preview,
    region: &str,
    year: &str,
    store: &Store,
) -> Result<ImportReport> {
    if preview.table.is_empty() {
        warn!("Nothing to import from {}", source_name);
        return Err(BtbError::NoTablesFound {
            source_name: source_name.to_string(),
        });
    }
    let append = store.append(&preview.table, region, year)?;
    Ok(ImportReport {
        extraction: preview.stats,
        columns: preview.columns,
        append,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::output::{DetectedTable, ExtractionStats};
    use crate::table::Cell;

    fn doc() -> ExtractedDocument {
        let raw = |cells: &[&str]| cells.iter().map(|c| Some(c.to_string())).collect();
        ExtractedDocument {
            tables: vec![
                DetectedTable {
                    page: 1,
                    index: 0,
                    rows: vec![raw(&["Semen", "1,200"]), raw(&["Pasir", "800"])],
                },
                DetectedTable {
                    page: 2,
                    index: 0,
                    rows: vec![raw(&["Batu", "15", "extra"])],
                },
            ],
            stats: ExtractionStats {
                total_pages: 2,
                scanned_pages: 2,
                tables_found: 2,
                rows_found: 3,
                duration_ms: 1,
            },
        }
    }

    #[test]
    fn preview_flattens_and_normalizes() {
        let p = preview_document(&doc());
        assert_eq!(p.table.row_count(), 3);
        assert_eq!(p.table.column_count(), 3);
        assert_eq!(p.table.rows()[0][1], Cell::Integer(1200));
        assert_eq!(p.table.rows()[2][2], Cell::text("extra"));
        assert!(p.columns[1].is_numeric());
    }

    #[test]
    fn import_preview_appends_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(
            StoreConfig::builder()
                .data_dir(dir.path())
                .build()
                .unwrap(),
        )
        .unwrap();
        let report =
            import_preview("report.pdf", preview_document(&doc()), "Kota Bandung", "2021", &store)
                .unwrap();
        assert_eq!(report.append.rows_appended, 3);
        assert_eq!(report.extraction.rows_found, 3);
        assert_eq!(store.read_all().unwrap().table().row_count(), 3);
    }

    #[test]
    fn import_of_empty_preview_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(
            StoreConfig::builder()
                .data_dir(dir.path())
                .build()
                .unwrap(),
        )
        .unwrap();
        let empty = preview_document(&ExtractedDocument::default());
        let err = import_preview("blank.pdf", empty, "Kota Bandung", "2021", &store).unwrap_err();
        assert!(matches!(err, BtbError::NoTablesFound { .. }));
        assert!(!store.exists());
    }
}
