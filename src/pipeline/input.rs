//! Input resolution: validate a user-supplied PDF before pdfium sees it.
//!
//! A PDF arrives either as a path on disk (the CLI) or as an in-memory byte
//! buffer (an upload). Both are checked for the `%PDF` magic bytes up front
//! so callers get a meaningful error rather than an opaque pdfium failure.

use crate::error::BtbError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A validated PDF source.
#[derive(Debug, Clone, Copy)]
pub enum PdfInput<'a> {
    /// A local file.
    Path(&'a Path),
    /// An in-memory document, e.g. an uploaded file.
    Bytes { name: &'a str, data: &'a [u8] },
}

impl PdfInput<'_> {
    /// Human-readable name used in errors and logs.
    pub fn display_name(&self) -> String {
        match self {
            PdfInput::Path(p) => p.display().to_string(),
            PdfInput::Bytes { name, .. } => (*name).to_string(),
        }
    }
}

/// Resolve a local file path, validating existence, readability and magic bytes.
pub fn resolve_local(path: &Path) -> Result<PathBuf, BtbError> {
    if !path.exists() {
        return Err(BtbError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let n = f.read(&mut magic).map_err(|e| BtbError::io(path, e))?;
            if &magic[..n] != PDF_MAGIC {
                return Err(BtbError::NotAPdf {
                    source_name: path.display().to_string(),
                    magic: magic[..n].to_vec(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BtbError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(BtbError::io(path, e)),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path.to_path_buf())
}

/// Validate an in-memory PDF.
pub fn validate_bytes(name: &str, data: &[u8]) -> Result<(), BtbError> {
    if !data.starts_with(PDF_MAGIC) {
        return Err(BtbError::NotAPdf {
            source_name: name.to_string(),
            magic: data.iter().take(4).copied().collect(),
        });
    }
    debug!("Validated in-memory PDF '{}' ({} bytes)", name, data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_file_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, BtbError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04rest-of-zip").unwrap();
        let err = resolve_local(f.path()).unwrap_err();
        match err {
            BtbError::NotAPdf { magic, .. } => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_local(f.path()),
            Err(BtbError::NotAPdf { .. })
        ));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_local(f.path()).unwrap(), f.path());
    }

    #[test]
    fn bytes_validation() {
        assert!(validate_bytes("upload.pdf", b"%PDF-1.4 ...").is_ok());
        assert!(matches!(
            validate_bytes("upload.pdf", b""),
            Err(BtbError::NotAPdf { .. })
        ));
        assert!(matches!(
            validate_bytes("notes.txt", b"hello"),
            Err(BtbError::NotAPdf { .. })
        ));
    }

    #[test]
    fn display_name() {
        let p = PdfInput::Path(Path::new("a/b.pdf"));
        assert_eq!(p.display_name(), "a/b.pdf");
        let b = PdfInput::Bytes {
            name: "upload.pdf",
            data: b"%PDF",
        };
        assert_eq!(b.display_name(), "upload.pdf");
    }
}
