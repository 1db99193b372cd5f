//! # btb-tables
//!
//! Pull ruled tables out of PDF reports, clean them up, and keep them in one
//! spreadsheet dataset keyed by region (`Kota/Kabupaten`) and year (`Tahun`).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate a local file or an in-memory upload
//!  ├─ 2. Extract    pdfium page geometry → ruled tables → raw rows
//!  ├─ 3. Normalize  trim, drop thousands separators, numeric columns
//!  ├─ 4. Store      append to data_btb/btb_data.xlsx (locked, atomic)
//!  └─ 5. Export     filter one region/year batch, transpose, write xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use btb_tables::{preview, ExtractionConfig, Store, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let preview = preview("laporan.pdf", &config)?;
//!     println!("{} rows found", preview.table.row_count());
//!
//!     let store = Store::open(StoreConfig::default())?;
//!     let report = store.append(&preview.table, "Kota Bandung", "2021")?;
//!     eprintln!("dataset now holds {} rows", report.total_rows);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `btb` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! btb-tables = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Extraction needs a pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` at the library or its directory, or place it in the
//! working directory; otherwise the system library path is searched.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod coerce;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use coerce::{coerce_year, Coercion, Year};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, PageSelection, StoreConfig, StoreConfigBuilder,
    TableSettings,
};
pub use convert::{
    extract_tables, extract_tables_from_bytes, import_pdf, import_preview, preview, preview_bytes,
    preview_document,
};
pub use error::{BtbError, Result};
pub use export::{download_file_name, export_transposed, save_transposed, transpose, Transposed};
pub use output::{
    AppendReport, BatchKey, DetectedTable, ExtractedDocument, ExtractionStats, ImportReport,
    Preview,
};
pub use pipeline::normalize::{normalize, ColumnOutcome, Normalized};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{Dataset, Store};
pub use table::{Cell, RawRow, Table};
