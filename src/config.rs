//! Configuration types for extraction and for the dataset store.
//!
//! Extraction behaviour is controlled through [`ExtractionConfig`] and the
//! table-detection tolerances in [`TableSettings`]; where the dataset lives
//! and how it is laid out is controlled through [`StoreConfig`]. All three
//! are built via builders that validate on `build()`.

use crate::error::BtbError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default directory holding the dataset workbook.
pub const DEFAULT_DATA_DIR: &str = "data_btb";
/// Default dataset file name inside the data directory.
pub const DEFAULT_FILE_NAME: &str = "btb_data.xlsx";
/// Name of the single sheet holding the dataset.
pub const DEFAULT_SHEET_NAME: &str = "BTB Data";
/// Column holding the region label of each import.
pub const REGION_COLUMN: &str = "Kota/Kabupaten";
/// Column holding the year of each import.
pub const YEAR_COLUMN: &str = "Tahun";

// ── Extraction ───────────────────────────────────────────────────────────

/// Configuration for PDF table extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use btb_tables::{ExtractionConfig, PageSelection};
///
/// let config = ExtractionConfig::builder()
///     .pages(PageSelection::Range(1, 3))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct ExtractionConfig {
    /// Pages to scan. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Table-detection tolerances.
    pub table: TableSettings,

    /// Explicit pdfium shared library, or the directory containing it.
    ///
    /// When `None`, the library is looked up next to the executable's
    /// working directory and then on the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn table_settings(mut self, settings: TableSettings) -> Self {
        self.config.table = settings;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, BtbError> {
        self.config.table.validate()?;
        if let PageSelection::Range(start, end) = self.config.pages {
            if start == 0 || start > end {
                return Err(BtbError::InvalidConfig(format!(
                    "page range {start}-{end} is invalid (pages are 1-indexed, start <= end)"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Tolerances for ruling-line table detection, in PDF points.
///
/// The defaults match what mainstream PDF table extractors use for
/// line-ruled tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Parallel edges closer than this are snapped to one position.
    pub snap_tolerance: f32,
    /// Collinear edges with a gap up to this are merged.
    pub join_tolerance: f32,
    /// Edges shorter than this are ignored.
    pub edge_min_length: f32,
    /// Slack allowed when intersecting vertical and horizontal edges.
    pub intersection_tolerance: f32,
    /// Horizontal gap between characters that becomes a space.
    pub x_tolerance: f32,
    /// Vertical distance within which characters share a text line.
    pub y_tolerance: f32,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            edge_min_length: 3.0,
            intersection_tolerance: 3.0,
            x_tolerance: 3.0,
            y_tolerance: 3.0,
        }
    }
}

impl TableSettings {
    fn validate(&self) -> Result<(), BtbError> {
        let fields = [
            ("snap_tolerance", self.snap_tolerance),
            ("join_tolerance", self.join_tolerance),
            ("edge_min_length", self.edge_min_length),
            ("intersection_tolerance", self.intersection_tolerance),
            ("x_tolerance", self.x_tolerance),
            ("y_tolerance", self.y_tolerance),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(BtbError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Specifies which pages of the PDF to scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Scan all pages (default).
    #[default]
    All,
    /// Scan a single page (1-indexed).
    Single(usize),
    /// Scan a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Scan specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Whether 1-indexed `page` is selected.
    pub fn contains(&self, page: usize) -> bool {
        match self {
            PageSelection::All => page >= 1,
            PageSelection::Single(p) => page == *p,
            PageSelection::Range(start, end) => (*start..=*end).contains(&page),
            PageSelection::Set(pages) => pages.contains(&page),
        }
    }

    /// Selected pages of a `total_pages` document as ascending 0-indexed
    /// page numbers; pages past the end are ignored.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        (1..=total_pages)
            .filter(|&page| self.contains(page))
            .map(|page| page - 1)
            .collect()
    }
}

/// Parses `all`, `5`, `3-15` or `1,3,5`. Pages are 1-indexed.
impl FromStr for PageSelection {
    type Err = BtbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let page = |p: &str| -> Result<usize, BtbError> {
            match p.trim().parse::<usize>() {
                Ok(0) => Err(BtbError::InvalidConfig(
                    "pages are numbered from 1".to_string(),
                )),
                Ok(n) => Ok(n),
                Err(_) => Err(BtbError::InvalidConfig(format!(
                    "'{}' is not a page number",
                    p.trim()
                ))),
            }
        };

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(BtbError::InvalidConfig(format!(
                    "page range {start}-{end} runs backwards"
                )));
            }
            Ok(PageSelection::Range(start, end))
        } else if s.contains(',') {
            s.split(',')
                .map(page)
                .collect::<Result<Vec<_>, _>>()
                .map(PageSelection::Set)
        } else {
            page(s).map(PageSelection::Single)
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────

/// Where the dataset lives and how its sheet is laid out.
///
/// The dataset path is always `data_dir/file_name`; it is owned by the
/// [`crate::store::Store`] built from this config rather than by any
/// process-wide setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the dataset. Created when the store is opened.
    pub data_dir: PathBuf,
    /// Dataset workbook file name.
    pub file_name: String,
    /// The one sheet holding every imported row.
    pub sheet_name: String,
    /// Header of the leading region column.
    pub region_column: String,
    /// Header of the year column following the region.
    pub year_column: String,
    /// A writer lock older than this many seconds is treated as abandoned.
    pub stale_lock_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_name: DEFAULT_FILE_NAME.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            region_column: REGION_COLUMN.to_string(),
            year_column: YEAR_COLUMN.to_string(),
            stale_lock_secs: 600,
        }
    }
}

impl StoreConfig {
    /// Create a new builder for `StoreConfig`.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full path of the dataset workbook.
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.file_name = name.into();
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    pub fn region_column(mut self, name: impl Into<String>) -> Self {
        self.config.region_column = name.into();
        self
    }

    pub fn year_column(mut self, name: impl Into<String>) -> Self {
        self.config.year_column = name.into();
        self
    }

    pub fn stale_lock_secs(mut self, secs: u64) -> Self {
        self.config.stale_lock_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StoreConfig, BtbError> {
        let c = &self.config;
        if c.file_name.trim().is_empty() || c.file_name.contains(['/', '\\']) {
            return Err(BtbError::InvalidConfig(format!(
                "file name must be a plain, non-empty name, got {:?}",
                c.file_name
            )));
        }
        // Excel limits sheet names to 31 characters and forbids a few symbols.
        if c.sheet_name.is_empty()
            || c.sheet_name.chars().count() > 31
            || c.sheet_name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        {
            return Err(BtbError::InvalidConfig(format!(
                "sheet name {:?} is not a valid worksheet name",
                c.sheet_name
            )));
        }
        if c.region_column.trim().is_empty()
            || c.year_column.trim().is_empty()
            || c.region_column == c.year_column
        {
            return Err(BtbError::InvalidConfig(
                "region and year columns must be distinct, non-empty names".into(),
            ));
        }
        Ok(self.config)
    }
}
