//! Page scanning: load a PDF with pdfium and collect the geometry the
//! table finder needs.
//!
//! For each selected page we gather ruling lines from path objects and every
//! character with its box, flip both into top-down coordinates, and hand
//! them to [`tablefinder`]. pdfium is synchronous and the whole scan runs on
//! the calling thread.

use crate::config::{ExtractionConfig, PageSelection, TableSettings};
use crate::error::BtbError;
use crate::output::{DetectedTable, ExtractedDocument, ExtractionStats};
use crate::pipeline::input::{self, PdfInput};
use crate::pipeline::pdfium;
use crate::pipeline::tablefinder::{self, BBox, Edge, Glyph};
use pdfium_render::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Scan the selected pages of a PDF for ruled tables.
pub fn extract_document(
    source: PdfInput<'_>,
    config: &ExtractionConfig,
) -> Result<ExtractedDocument, BtbError> {
    let start = Instant::now();
    let name = source.display_name();
    match source {
        PdfInput::Path(path) => {
            input::resolve_local(path)?;
        }
        PdfInput::Bytes { name, data } => input::validate_bytes(name, data)?,
    }

    let pdfium = pdfium::bind(config.pdfium_lib_path.as_deref())?;
    let password = config.password.as_deref();
    let loaded = match source {
        PdfInput::Path(path) => pdfium.load_pdf_from_file(path, password),
        PdfInput::Bytes { data, .. } => pdfium.load_pdf_from_byte_slice(data, password),
    };
    let document = loaded.map_err(|e| load_error(&name, password.is_some(), e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} ({} pages)", name, total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() && total_pages > 0 {
        return Err(BtbError::PageOutOfRange {
            page: first_requested_page(&config.pages),
            total: total_pages,
        });
    }
    let selected = page_indices.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(selected);
    }

    let mut tables = Vec::new();
    for &idx in &page_indices {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, selected);
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| BtbError::PageReadFailed {
                page: page_num,
                detail: format!("{e:?}"),
            })?;

        let edges = page_edges(&page, &config.table);
        let glyphs = page_glyphs(&page, page_num)?;
        let found = tablefinder::extract_page_tables(&edges, &glyphs, &config.table);
        debug!(
            "Page {}: {} edges, {} glyphs, {} tables",
            page_num,
            edges.len(),
            glyphs.len(),
            found.len()
        );

        let on_page = found.len();
        tables.extend(
            found
                .into_iter()
                .enumerate()
                .map(|(index, rows)| DetectedTable {
                    page: page_num,
                    index,
                    rows,
                }),
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, selected, on_page);
        }
    }

    let rows_found = tables.iter().map(|t| t.rows.len()).sum();
    let stats = ExtractionStats {
        total_pages,
        scanned_pages: selected,
        tables_found: tables.len(),
        rows_found,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} tables, {} rows from {} pages in {}ms",
        stats.tables_found, stats.rows_found, stats.scanned_pages, stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(selected, rows_found);
    }

    Ok(ExtractedDocument { tables, stats })
}

fn load_error(name: &str, has_password: bool, e: PdfiumError) -> BtbError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        if has_password {
            BtbError::WrongPassword {
                source_name: name.to_string(),
            }
        } else {
            BtbError::PasswordRequired {
                source_name: name.to_string(),
            }
        }
    } else {
        BtbError::Format {
            source_name: name.to_string(),
            detail,
        }
    }
}

fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}

// ── Geometry collection ──────────────────────────────────────────────────

/// Ruling lines drawn by the page's path objects.
fn page_edges(page: &PdfPage<'_>, settings: &TableSettings) -> Vec<Edge> {
    let height = page.height().value;
    let mut edges = Vec::new();

    for object in page.objects().iter() {
        let Some(path) = object.as_path_object() else {
            continue;
        };
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let bbox = BBox::new(
            bounds.left().value,
            height - bounds.top().value,
            bounds.right().value,
            height - bounds.bottom().value,
        );
        path_edges(path, bbox, height, settings.snap_tolerance, &mut edges);
    }
    edges
}

struct PathWalk {
    edges: Vec<Edge>,
    lines: usize,
    curves: usize,
}

impl PathWalk {
    fn is_rectangle(&self) -> bool {
        self.curves == 0 && (3..=5).contains(&self.lines)
    }
}

fn path_edges(path: &PdfPagePathObject, bbox: BBox, page_height: f32, tol: f32, out: &mut Vec<Edge>) {
    // A thin path is a rule, whether stroked as a line or filled as a rectangle.
    if bbox.height() <= tol && bbox.width() > tol {
        out.push(Edge::horizontal(bbox.center().1, bbox.x0, bbox.x1));
        return;
    }
    if bbox.width() <= tol && bbox.height() > tol {
        out.push(Edge::vertical(bbox.center().0, bbox.top, bbox.bottom));
        return;
    }

    let walk = walk_segments(path, page_height, tol);
    let in_page_space = walk.edges.iter().all(|e| edge_within(e, &bbox, tol));
    if !walk.edges.is_empty() && in_page_space {
        out.extend(walk.edges);
    } else if walk.is_rectangle() {
        // Segment points are in the object's own space; fall back to its
        // page-space bounds.
        out.extend(Edge::rect_sides(&bbox));
    }
}

fn walk_segments(path: &PdfPagePathObject, page_height: f32, tol: f32) -> PathWalk {
    let mut walk = PathWalk {
        edges: Vec::new(),
        lines: 0,
        curves: 0,
    };
    let mut current: Option<(f32, f32)> = None;
    let mut subpath_start: Option<(f32, f32)> = None;

    for segment in path.segments().iter() {
        let point = (segment.x().value, page_height - segment.y().value);
        match segment.segment_type() {
            PdfPathSegmentType::MoveTo => {
                current = Some(point);
                subpath_start = Some(point);
            }
            PdfPathSegmentType::LineTo => {
                walk.lines += 1;
                if let Some(from) = current {
                    walk.edges.extend(Edge::from_segment(from, point, tol));
                }
                current = Some(point);
            }
            PdfPathSegmentType::BezierTo => {
                walk.curves += 1;
                current = Some(point);
            }
            _ => {}
        }
        if segment.is_close() {
            if let (Some(from), Some(to)) = (current, subpath_start) {
                walk.lines += 1;
                walk.edges.extend(Edge::from_segment(from, to, tol));
                current = subpath_start;
            }
        }
    }
    walk
}

fn edge_within(edge: &Edge, bbox: &BBox, tol: f32) -> bool {
    let (x0, top, x1, bottom) = match edge.orientation {
        tablefinder::Orientation::Horizontal => (edge.start, edge.position, edge.end, edge.position),
        tablefinder::Orientation::Vertical => (edge.position, edge.start, edge.position, edge.end),
    };
    x0 >= bbox.x0 - tol && x1 <= bbox.x1 + tol && top >= bbox.top - tol && bottom <= bbox.bottom + tol
}

/// Every character on the page with its loose box.
fn page_glyphs(page: &PdfPage<'_>, page_num: usize) -> Result<Vec<Glyph>, BtbError> {
    let height = page.height().value;
    let text = page.text().map_err(|e| BtbError::PageReadFailed {
        page: page_num,
        detail: format!("{e:?}"),
    })?;

    let glyphs = text
        .chars()
        .iter()
        .filter_map(|c| {
            let ch = c.unicode_char()?;
            let b = c.loose_bounds().ok()?;
            Some(Glyph {
                ch,
                bbox: BBox::new(
                    b.left().value,
                    height - b.top().value,
                    b.right().value,
                    height - b.bottom().value,
                ),
            })
        })
        .collect();
    Ok(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_requested_page_per_selection() {
        assert_eq!(first_requested_page(&PageSelection::Single(9)), 9);
        assert_eq!(first_requested_page(&PageSelection::Range(4, 6)), 4);
        assert_eq!(first_requested_page(&PageSelection::Set(vec![7, 5])), 5);
        assert_eq!(first_requested_page(&PageSelection::All), 1);
    }

    #[test]
    fn edge_within_bounds() {
        let bbox = BBox::new(10.0, 10.0, 110.0, 60.0);
        assert!(edge_within(&Edge::horizontal(10.0, 10.0, 110.0), &bbox, 1.0));
        assert!(edge_within(&Edge::vertical(110.5, 10.0, 60.0), &bbox, 1.0));
        assert!(!edge_within(&Edge::horizontal(500.0, 0.0, 50.0), &bbox, 1.0));
    }

    #[test]
    fn rectangle_walk_detection() {
        let rect = PathWalk {
            edges: vec![],
            lines: 4,
            curves: 0,
        };
        assert!(rect.is_rectangle());
        let curved = PathWalk {
            edges: vec![],
            lines: 4,
            curves: 2,
        };
        assert!(!curved.is_rectangle());
    }

    #[test]
    fn missing_file_fails_before_binding_pdfium() {
        let err = extract_document(
            PdfInput::Path(std::path::Path::new("/no/such/report.pdf")),
            &ExtractionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BtbError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_bytes_fail_before_binding_pdfium() {
        let err = extract_document(
            PdfInput::Bytes {
                name: "upload.xlsx",
                data: b"PK\x03\x04",
            },
            &ExtractionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BtbError::NotAPdf { .. }));
    }
}
