//! Error types for the btb-tables library.
//!
//! Every fatal failure is a [`BtbError`]. Failures are terminal for the user
//! action that triggered them: nothing is retried automatically, and the
//! caller decides whether to surface the message or try again.
//!
//! Best-effort numeric coercion is deliberately *not* an error. Its fallback
//! path is reported through [`crate::coerce::Coercion`] and
//! [`crate::pipeline::normalize::ColumnOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, BtbError>;

/// All fatal errors returned by the btb-tables library.
#[derive(Debug, Error)]
pub enum BtbError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input was read, but is not a PDF.
    #[error("'{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF engine could not parse the document.
    #[error("PDF '{source_name}' could not be read: {detail}")]
    Format { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// The page selection does not match any page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// No ruled table was found on the selected pages.
    #[error("No tables found in '{source_name}'\nOnly tables drawn with ruling lines are detected.")]
    NoTablesFound { source_name: String },

    /// pdfium returned an error while reading one page.
    #[error("Reading page {page} failed: {detail}")]
    PageReadFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Point PDFIUM_LIB_PATH (or --pdfium-lib) at a libpdfium shared library,\n\
or at the directory containing it. Prebuilt binaries are published at\n\
https://github.com/bblanchon/pdfium-binaries.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Dataset errors ────────────────────────────────────────────────────
    /// An import was tagged with a blank region or year.
    #[error("The {field} of an import must not be blank")]
    BlankBatchKey { field: String },

    /// The dataset workbook has not been created yet.
    #[error("No dataset at '{path}' yet. Import a PDF first.")]
    DatasetMissing { path: PathBuf },

    /// The dataset exists but does not have the expected sheet or columns.
    #[error("Dataset '{path}' has an unexpected layout: {detail}")]
    Schema { path: PathBuf, detail: String },

    /// Another writer holds the dataset lock.
    #[error(
        "Dataset '{path}' is being written by another session (lock held by {holder}).\n\
Retry once it finishes, or delete '{lock_path}' if that session is gone."
    )]
    WriteConflict {
        path: PathBuf,
        lock_path: PathBuf,
        holder: String,
    },

    /// Reading or encoding a workbook failed.
    #[error("Workbook '{name}' could not be processed: {detail}")]
    Workbook { name: String, detail: String },

    /// A transposed export was requested for a table without rows.
    #[error("Nothing to export: the selected table has no rows")]
    EmptyExport,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation on the dataset or an output file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BtbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BtbError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn workbook(name: impl Into<String>, detail: impl ToString) -> Self {
        BtbError::Workbook {
            name: name.into(),
            detail: detail.to_string(),
        }
    }
}
