//! Binding to the pdfium shared library.
//!
//! Lookup order:
//!
//! 1. the explicit path from [`crate::config::ExtractionConfig::pdfium_lib_path`]
//! 2. the `PDFIUM_LIB_PATH` environment variable
//! 3. the platform library name in the current directory
//! 4. the system library search path
//!
//! A path may name the library file itself or the directory that holds it.

use crate::error::BtbError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a pdfium library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium, trying each location in turn.
pub fn bind(explicit: Option<&Path>) -> Result<Pdfium, BtbError> {
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    if let Some(path) = requested {
        let lib = library_file(&path);
        debug!("Binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| BtbError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())));
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    Pdfium::bind_to_library(&local)
        .or_else(|local_err| {
            debug!(
                "No pdfium at {} ({local_err:?}), trying system library",
                local.display()
            );
            Pdfium::bind_to_system_library()
        })
        .map(Pdfium::new)
        .map_err(|e| BtbError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Resolve a directory to the platform library inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}
