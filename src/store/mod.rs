//! The persistent dataset: one workbook, one sheet, every import appended.
//!
//! The dataset path is owned by [`Store`], built from a [`StoreConfig`].
//! Writes are whole-file rewrites inside a transaction: take the writer lock,
//! read what is there, concatenate, encode, write a temp file in the data
//! directory and rename it over the dataset. Readers never see a partial
//! file.

pub mod lock;
pub mod xlsx;

use crate::coerce::{coerce_year, Coercion, Year};
use crate::config::StoreConfig;
use crate::error::{BtbError, Result};
use crate::output::{AppendReport, BatchKey};
use crate::table::{Cell, Table};
use lock::WriteLock;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handle on the dataset workbook.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
    path: PathBuf,
}

impl Store {
    /// Open the store, creating the data directory if needed.
    ///
    /// The workbook itself is only created by the first [`Store::append`].
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| BtbError::io(&config.data_dir, e))?;
        let path = config.dataset_path();
        debug!("Dataset at {}", path.display());
        Ok(Self { config, path })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Full path of the dataset workbook.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an import has created the dataset yet.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Tag every row of `table` with `region` and `year` and append it.
    ///
    /// The year is stored as an integer when it parses as one and as its
    /// trimmed text otherwise; the fallback is logged and reported. Existing
    /// rows come first and are never reordered.
    ///
    /// A blank `region` or `year` is rejected with [`BtbError::BlankBatchKey`]
    /// before anything is written.
    pub fn append(&self, table: &Table, region: &str, year: &str) -> Result<AppendReport> {
        let keys = [
            (&self.config.region_column, region),
            (&self.config.year_column, year),
        ];
        for (field, value) in keys {
            if value.trim().is_empty() {
                return Err(BtbError::BlankBatchKey {
                    field: field.clone(),
                });
            }
        }
        let year_coercion = coerce_year(year);
        let year_value = match &year_coercion {
            Coercion::Parsed(y) => Year::Numeric(*y),
            Coercion::Fallback(text) => {
                warn!("Year {:?} is not an integer; storing it as text", text);
                Year::Text(text.clone())
            }
        };

        let mut batch = table.clone();
        batch.insert_column(0, &self.config.region_column, Cell::text(region));
        batch.insert_column(1, &self.config.year_column, year_value.to_cell());
        let rows_appended = batch.row_count();

        let _lock = WriteLock::acquire(
            &self.path,
            Duration::from_secs(self.config.stale_lock_secs),
        )?;

        let created = !self.exists();
        let combined = if created {
            batch
        } else {
            self.read_all()?.into_table().concat(batch)
        };

        let bytes = xlsx::write_workbook(&self.config.sheet_name, &sheet_rows(&combined))?;
        write_atomic(&self.path, &bytes)?;

        info!(
            "Appended {} rows for {} / {} to {} ({} rows total)",
            rows_appended,
            region,
            year_value,
            self.path.display(),
            combined.row_count()
        );

        Ok(AppendReport {
            rows_appended,
            total_rows: combined.row_count(),
            created,
            region: region.to_string(),
            year: year_value,
            year_coercion,
        })
    }

    /// Read the whole dataset sheet.
    pub fn read_all(&self) -> Result<Dataset> {
        if !self.exists() {
            return Err(BtbError::DatasetMissing {
                path: self.path.clone(),
            });
        }
        let bytes = std::fs::read(&self.path).map_err(|e| BtbError::io(&self.path, e))?;
        let rows = xlsx::read_sheet(&bytes, &self.config.file_name, &self.config.sheet_name)?
            .ok_or_else(|| self.schema_error(format!("sheet '{}' not found", self.config.sheet_name)))?;

        let mut rows = rows.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| self.schema_error("sheet is empty".to_string()))?;
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, c)| match c {
                Cell::Empty => format!("Unnamed: {i}"),
                other => other.to_string(),
            })
            .collect();

        let mut table = Table::from_parts(columns, rows.collect());
        table.map_column_names(|name| name.trim().to_string());

        let region_idx = table
            .column_index(&self.config.region_column)
            .ok_or_else(|| self.schema_error(format!("column '{}' not found", self.config.region_column)))?;
        let year_idx = table
            .column_index(&self.config.year_column)
            .ok_or_else(|| self.schema_error(format!("column '{}' not found", self.config.year_column)))?;

        table.map_column(year_idx, |cell| {
            if let Some(year) = Year::from_cell(cell) {
                *cell = year.to_cell();
            }
        });

        debug!(
            "Read {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            self.path.display()
        );
        Ok(Dataset {
            table,
            region_idx,
            year_idx,
        })
    }

    /// Distinct (region, year) batches, in first-occurrence order.
    pub fn summary(&self) -> Result<Vec<BatchKey>> {
        Ok(self.read_all()?.summary())
    }

    /// Every row of one batch.
    pub fn filter(&self, region: &str, year: &Year) -> Result<Table> {
        Ok(self.read_all()?.filter(region, year))
    }

    fn schema_error(&self, detail: String) -> BtbError {
        BtbError::Schema {
            path: self.path.clone(),
            detail,
        }
    }
}

/// Write `bytes` to a temp file beside `path`, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BtbError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| BtbError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| BtbError::io(path, e.error))?;
    Ok(())
}

/// Header row followed by the table's rows.
fn sheet_rows(table: &Table) -> Vec<Vec<Cell>> {
    let mut rows = Vec::with_capacity(table.row_count() + 1);
    rows.push(table.columns().iter().map(Cell::text).collect());
    rows.extend(table.rows().iter().cloned());
    rows
}

/// The whole dataset, with its region and year columns located.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    table: Table,
    region_idx: usize,
    year_idx: usize,
}

impl Dataset {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Distinct (region, year) pairs in first-occurrence order.
    pub fn summary(&self) -> Vec<BatchKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for row in self.table.rows() {
            let Some(year) = Year::from_cell(&row[self.year_idx]) else {
                continue;
            };
            let key = BatchKey {
                region: row[self.region_idx].to_string(),
                year,
            };
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Rows whose region equals `region` exactly and whose year equals
    /// `year` after coercion.
    pub fn filter(&self, region: &str, year: &Year) -> Table {
        let (r, y) = (self.region_idx, self.year_idx);
        let mut table = self.table.clone();
        table.retain_rows(|row| row[r].to_string() == region && year.matches(&row[y]));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Store {
        let config = StoreConfig::builder()
            .data_dir(dir.path().join("data_btb"))
            .build()
            .unwrap();
        Store::open(config).unwrap()
    }

    fn table(rows: &[&[Cell]]) -> Table {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        Table::from_parts(
            (0..width).map(|i| i.to_string()).collect(),
            rows.iter().map(|r| r.to_vec()).collect(),
        )
    }

    #[test]
    fn open_creates_data_dir() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(dir.path().join("data_btb").is_dir());
        assert!(!store.exists());
        assert!(store.path().ends_with("btb_data.xlsx"));
    }

    #[test]
    fn read_all_without_file_is_dataset_missing() {
        let dir = TempDir::new().unwrap();
        let err = store_in(&dir).read_all().unwrap_err();
        assert!(matches!(err, BtbError::DatasetMissing { .. }));
    }

    #[test]
    fn first_append_creates_file_with_exactly_those_rows() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let t = table(&[
            &[Cell::text("Semen"), Cell::Integer(1200)],
            &[Cell::text("Pasir"), Cell::Integer(35000)],
        ]);
        let report = store.append(&t, "Kota Bandung", "2021").unwrap();
        assert!(report.created);
        assert_eq!(report.rows_appended, 2);
        assert_eq!(report.year, Year::Numeric(2021));

        let ds = store.read_all().unwrap();
        assert_eq!(ds.table().columns(), &["Kota/Kabupaten", "Tahun", "0", "1"]);
        assert_eq!(
            ds.table().rows()[0],
            vec![
                Cell::text("Kota Bandung"),
                Cell::Integer(2021),
                Cell::text("Semen"),
                Cell::Integer(1200)
            ]
        );
        assert_eq!(ds.table().row_count(), 2);
        assert!(!lock::lock_path(store.path()).exists());
    }

    #[test]
    fn later_appends_keep_prior_rows_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .append(&table(&[&[Cell::text("a")]]), "Kab. Bogor", "2020")
            .unwrap();
        let report = store
            .append(
                &table(&[&[Cell::text("b"), Cell::Integer(5)]]),
                "Kota Bandung",
                "2021",
            )
            .unwrap();
        assert!(!report.created);
        assert_eq!(report.total_rows, 2);

        let ds = store.read_all().unwrap();
        let rows = ds.table().rows();
        assert_eq!(rows[0][0], Cell::text("Kab. Bogor"));
        assert_eq!(rows[0][3], Cell::Empty);
        assert_eq!(rows[1][0], Cell::text("Kota Bandung"));
        assert_eq!(rows[1][3], Cell::Integer(5));
    }

    #[test]
    fn year_fallback_is_reported_and_stored_as_text() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let report = store
            .append(&table(&[&[Cell::text("x")]]), "Kota Bandung", " 2020/2021 ")
            .unwrap();
        assert!(report.year_coercion.is_fallback());
        assert_eq!(report.year, Year::Text("2020/2021".into()));

        let ds = store.read_all().unwrap();
        assert_eq!(ds.table().rows()[0][1], Cell::text("2020/2021"));
    }

    #[test]
    fn duplicate_imports_are_appended_and_summarised_once() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let t = table(&[&[Cell::Integer(1)]]);
        store.append(&t, "Kota Bandung", "2021").unwrap();
        store.append(&t, "Kab. Bogor", "2021").unwrap();
        store.append(&t, "Kota Bandung", "2021").unwrap();

        assert_eq!(store.read_all().unwrap().table().row_count(), 3);
        let summary = store.summary().unwrap();
        assert_eq!(
            summary,
            vec![
                BatchKey {
                    region: "Kota Bandung".into(),
                    year: Year::Numeric(2021)
                },
                BatchKey {
                    region: "Kab. Bogor".into(),
                    year: Year::Numeric(2021)
                },
            ]
        );
    }

    #[test]
    fn filter_matches_region_and_coerced_year_exactly() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .append(&table(&[&[Cell::text("a")]]), "Kota Bandung", "2020")
            .unwrap();
        store
            .append(&table(&[&[Cell::text("b")]]), "Kota Bandung", "2021")
            .unwrap();
        store
            .append(&table(&[&[Cell::text("c")]]), "Kota Bandung Barat", "2020")
            .unwrap();

        let hit = store.filter("Kota Bandung", &Year::parse("2020")).unwrap();
        assert_eq!(hit.row_count(), 1);
        assert_eq!(hit.rows()[0][2], Cell::text("a"));

        let none = store.filter("kota bandung", &Year::parse("2020")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn held_lock_blocks_append() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let _held = WriteLock::acquire(store.path(), Duration::from_secs(3600)).unwrap();
        let err = store
            .append(&table(&[&[Cell::Integer(1)]]), "Kota Bandung", "2021")
            .unwrap_err();
        assert!(matches!(err, BtbError::WriteConflict { .. }));
        assert!(!store.exists());
    }

    #[test]
    fn blank_region_or_year_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let t = table(&[&[Cell::text("Semen")]]);

        match store.append(&t, "Kota Bandung", "  ").unwrap_err() {
            BtbError::BlankBatchKey { field } => assert_eq!(field, "Tahun"),
            other => panic!("unexpected error: {other}"),
        }
        match store.append(&t, "", "2021").unwrap_err() {
            BtbError::BlankBatchKey { field } => assert_eq!(field, "Kota/Kabupaten"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.exists());
        assert!(!lock::lock_path(store.path()).exists());
    }

    #[test]
    fn failed_append_releases_lock_and_keeps_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let bytes = xlsx::write_workbook(
            "BTB Data",
            &[
                vec![Cell::text("Kota/Kabupaten"), Cell::text("0")],
                vec![Cell::text("Kota Bandung"), Cell::Integer(1)],
            ],
        )
        .unwrap();
        std::fs::write(store.path(), &bytes).unwrap();

        let err = store
            .append(&table(&[&[Cell::Integer(2)]]), "Kota Bandung", "2021")
            .unwrap_err();
        assert!(matches!(err, BtbError::Schema { .. }));
        assert!(!lock::lock_path(store.path()).exists());
        assert_eq!(std::fs::read(store.path()).unwrap(), bytes);
    }

    #[test]
    fn wrong_sheet_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let bytes = xlsx::write_workbook("Other", &[vec![Cell::text("x")]]).unwrap();
        std::fs::write(store.path(), bytes).unwrap();
        assert!(matches!(
            store.read_all().unwrap_err(),
            BtbError::Schema { .. }
        ));
    }

    #[test]
    fn missing_year_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let bytes = xlsx::write_workbook(
            "BTB Data",
            &[
                vec![Cell::text("Kota/Kabupaten"), Cell::text("0")],
                vec![Cell::text("Kota Bandung"), Cell::Integer(1)],
            ],
        )
        .unwrap();
        std::fs::write(store.path(), bytes).unwrap();
        match store.read_all().unwrap_err() {
            BtbError::Schema { detail, .. } => assert!(detail.contains("Tahun")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn headers_are_trimmed_and_text_years_coerced() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let bytes = xlsx::write_workbook(
            "BTB Data",
            &[
                vec![Cell::text(" Kota/Kabupaten "), Cell::text("Tahun "), Cell::text("0")],
                vec![Cell::text("Kota Bandung"), Cell::text(" 2022 "), Cell::Integer(1)],
            ],
        )
        .unwrap();
        std::fs::write(store.path(), bytes).unwrap();
        let ds = store.read_all().unwrap();
        assert_eq!(ds.table().rows()[0][1], Cell::Integer(2022));
        assert_eq!(
            ds.summary(),
            vec![BatchKey {
                region: "Kota Bandung".into(),
                year: Year::Numeric(2022)
            }]
        );
    }
}
