//! Pipeline stages from PDF to a normalized table.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ tablefinder ──▶ normalize
//! (path/bytes) (pdfium)   (geometry)     (clean + numeric)
//! ```
//!
//! 1. [`input`]       — validate a path or byte buffer as a PDF
//! 2. [`pdfium`]      — bind the pdfium shared library
//! 3. [`extract`]     — load the document and collect edges and glyphs per page
//! 4. [`tablefinder`] — turn ruling lines into tables of cell text
//! 5. [`normalize`]   — trim, drop thousands separators, convert numeric columns

pub mod extract;
pub mod input;
pub mod normalize;
pub mod pdfium;
pub mod tablefinder;
