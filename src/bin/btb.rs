//! CLI binary for btb-tables.
//!
//! A thin shim over the library crate: maps flags to `ExtractionConfig` and
//! `StoreConfig`, asks for confirmation before an import and prints results.

use anyhow::{Context, Result};
use btb_tables::{
    download_file_name, import_preview, preview, save_transposed, BtbError, Cell, ColumnOutcome,
    ExtractionConfig, ExtractionProgressCallback, PageSelection, ProgressCallback, Store,
    StoreConfig, Table, Year,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a spinner while the PDF opens, then a page bar
/// with one log line per page that had tables.
struct CliProgressCallback {
    bar: ProgressBar,
    tables: AtomicUsize,
}

impl CliProgressCallback {
    /// Length is set by `on_extraction_start` once the page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            tables: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, tables_found: usize) {
        if tables_found > 0 {
            self.tables.fetch_add(tables_found, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}",
                green("✓"),
                page_num,
                total_pages,
                dim(&format!("{tables_found} table(s)")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, rows_found: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} tables, {} rows across {} pages",
            if rows_found > 0 { green("✔") } else { cyan("⚠") },
            bold(&self.tables.load(Ordering::SeqCst).to_string()),
            bold(&rows_found.to_string()),
            total_pages,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Look at what would be imported
  btb preview laporan_2021.pdf

  # Import pages 3-10 for one region and year, without the prompt
  btb import laporan_2021.pdf --region "Kota Bandung" --year 2021 --pages 3-10 --yes

  # Which region/year batches are stored?
  btb summary

  # Show one batch, then download it transposed
  btb show --region "Kota Bandung" --year 2021
  btb export --region "Kota Bandung" --year 2021

  # Machine-readable output
  btb --json summary > batches.json

DATASET:
  Imports are appended to <data-dir>/btb_data.xlsx (sheet "BTB Data") with
  the region in "Kota/Kabupaten" and the year in "Tahun". A sibling
  btb_data.xlsx.lock file is held while the dataset is rewritten.

ENVIRONMENT VARIABLES:
  BTB_DATA_DIR       Dataset directory (default: data_btb)
  PDFIUM_LIB_PATH    Path to libpdfium or the directory holding it
  RUST_LOG           Overrides the log filter chosen by -v / -q
"#;

/// Extract ruled tables from PDF reports into a region/year dataset.
#[derive(Parser, Debug)]
#[command(
    name = "btb",
    version,
    about = "Extract ruled tables from PDF reports into a region/year spreadsheet dataset",
    long_about = "Extract tables drawn with ruling lines from PDF reports, clean them into \
numeric columns, and append them to a single spreadsheet keyed by region (Kota/Kabupaten) \
and year (Tahun). Stored batches can be listed, previewed, and downloaded transposed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding btb_data.xlsx.
    #[arg(long, global = true, env = "BTB_DATA_DIR", default_value = "data_btb")]
    data_dir: PathBuf,

    /// Path to libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, global = true, env = "BTB_PAGES", default_value = "all")]
    pages: PageSelection,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "BTB_PASSWORD")]
    password: Option<String>,

    /// Print JSON instead of text tables.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and normalize a PDF without saving anything.
    Preview {
        /// PDF file to read.
        pdf: PathBuf,
    },
    /// Extract a PDF, show it, and append it to the dataset.
    Import {
        /// PDF file to read.
        pdf: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// List the region/year batches already stored.
    Summary,
    /// Print the stored rows of one batch.
    Show {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Write one batch, transposed, to an xlsx file.
    Export {
        #[command(flatten)]
        batch: BatchArgs,
        /// Output file (default: BTB_Data_<region>_<year>_Transposed.xlsx).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Region name (Kota/Kabupaten).
    #[arg(long)]
    region: String,
    /// Year (Tahun); non-integer input is kept as text.
    #[arg(long)]
    year: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Only extraction commands draw a bar; INFO logs would tear through it.
    let extracting = matches!(cli.command, Command::Preview { .. } | Command::Import { .. });
    let show_progress = extracting && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store_config = StoreConfig::builder()
        .data_dir(&cli.data_dir)
        .build()
        .context("Invalid dataset configuration")?;
    let store = Store::open(store_config).context("Failed to open dataset directory")?;

    match &cli.command {
        Command::Preview { pdf } => run_preview(&cli, pdf, show_progress),
        Command::Import { pdf, batch, yes } => {
            run_import(&cli, &store, pdf, batch, *yes, show_progress)
        }
        Command::Summary => run_summary(&cli, &store),
        Command::Show { batch } => run_show(&cli, &store, batch),
        Command::Export { batch, output } => run_export(&cli, &store, batch, output.as_deref()),
    }
}

fn run_preview(cli: &Cli, pdf: &Path, show_progress: bool) -> Result<()> {
    let config = build_config(cli, show_progress)?;
    let preview = preview(pdf, &config).context("Extraction failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&preview).context("Failed to serialise preview")?
        );
        return Ok(());
    }
    if preview.table.is_empty() {
        println!("No tables found in {}", pdf.display());
        return Ok(());
    }
    print_table(&preview.table);
    if !cli.quiet {
        print_retained(&preview.columns);
    }
    Ok(())
}

fn run_import(
    cli: &Cli,
    store: &Store,
    pdf: &Path,
    batch: &BatchArgs,
    yes: bool,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(cli, show_progress)?;
    let preview = preview(pdf, &config).context("Extraction failed")?;
    let source_name = pdf.display().to_string();

    if !preview.table.is_empty() && !cli.json {
        print_table(&preview.table);
        if !cli.quiet {
            print_retained(&preview.columns);
        }
    }

    if !preview.table.is_empty() && !yes {
        let question = format!(
            "Append {} rows for {} / {} to {}?",
            preview.table.row_count(),
            batch.region,
            batch.year,
            store.path().display()
        );
        if !confirm(&question)? {
            eprintln!("Nothing saved.");
            return Ok(());
        }
    }

    let report = import_preview(&source_name, preview, &batch.region, &batch.year, store)
        .context("Import failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        let append = &report.append;
        if append.year_coercion.is_fallback() {
            eprintln!(
                "{} year {:?} is not an integer; stored as text",
                cyan("⚠"),
                batch.year.trim()
            );
        }
        eprintln!(
            "{}  {} rows for {} / {}  →  {}  ({} rows total{})",
            green("✔"),
            append.rows_appended,
            bold(&append.region),
            bold(&append.year.to_string()),
            store.path().display(),
            append.total_rows,
            if append.created { ", new dataset" } else { "" },
        );
    }
    Ok(())
}

fn run_summary(cli: &Cli, store: &Store) -> Result<()> {
    let Some(batches) = or_no_data(store.summary(), store)? else {
        return Ok(());
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&batches).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    let columns = vec![
        store.config().region_column.clone(),
        store.config().year_column.clone(),
    ];
    let rows = batches
        .into_iter()
        .map(|b| vec![Cell::Text(b.region), b.year.to_cell()])
        .collect();
    print_table(&Table::from_parts(columns, rows));
    Ok(())
}

fn run_show(cli: &Cli, store: &Store, batch: &BatchArgs) -> Result<()> {
    let year = Year::parse(&batch.year);
    let Some(table) = or_no_data(store.filter(&batch.region, &year), store)? else {
        return Ok(());
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&table).context("Failed to serialise rows")?
        );
    } else if table.is_empty() {
        println!("No rows for {} / {}", batch.region, year);
    } else {
        print_table(&table);
    }
    Ok(())
}

fn run_export(cli: &Cli, store: &Store, batch: &BatchArgs, output: Option<&Path>) -> Result<()> {
    let year = Year::parse(&batch.year);
    let Some(table) = or_no_data(store.filter(&batch.region, &year), store)? else {
        return Ok(());
    };

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(download_file_name(&batch.region, &year)));
    save_transposed(&table, &path)
        .with_context(|| format!("Failed to export {} / {}", batch.region, year))?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "path": path, "rows": table.row_count() })
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} rows transposed  →  {}",
            green("✔"),
            table.row_count(),
            bold(&path.display().to_string())
        );
    }
    Ok(())
}

/// `Ok(None)` after telling the user there is nothing stored yet.
fn or_no_data<T>(result: btb_tables::Result<T>, store: &Store) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(BtbError::DatasetMissing { .. }) => {
            println!("No data yet ({} does not exist).", store.path().display());
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to read dataset"),
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, show_progress: bool) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder().pages(cli.pages.clone());
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Ask a yes/no question on stderr; anything but `y`/`yes` is a no.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_retained(columns: &[ColumnOutcome]) {
    for (i, outcome) in columns.iter().enumerate() {
        if let ColumnOutcome::Retained { row, value } = outcome {
            eprintln!(
                "{}",
                dim(&format!(
                    "  column {i} kept as text (row {row}: {value:?} is not a number)"
                ))
            );
        }
    }
}

const MAX_CELL_WIDTH: usize = 32;

/// Render a table as aligned plain-text columns on stdout.
fn print_table(table: &Table) {
    let render = |s: String| -> String {
        let flat = s.replace('\n', " ");
        if flat.chars().count() > MAX_CELL_WIDTH {
            let cut: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
            format!("{cut}…")
        } else {
            flat
        }
    };
    let header: Vec<String> = table.columns().iter().cloned().map(render).collect();
    let body: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|r| r.iter().map(|c| render(c.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", line(&header)).ok();
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    writeln!(out, "{}", line(&rule)).ok();
    for row in &body {
        writeln!(out, "{}", line(row)).ok();
    }
}
