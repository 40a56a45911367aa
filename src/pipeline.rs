//! Per-file orchestration: scan the source directory, normalize each
//! workbook, reconcile each batch. One file is one unit of work; a failing
//! file never stops the run.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ImportError, Result};
use crate::normalize;
use crate::sheet;
use crate::store::SessionStore;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_seen: usize,
    pub files_imported: usize,
    pub files_failed: usize,
    pub records_upserted: usize,
    pub rows_skipped: usize,
}

/// Runs a full import: open storage once, ensure the schema, then process
/// every spreadsheet in the source directory strictly in sequence.
///
/// Only storage-connection failure is fatal; schema, workbook and batch
/// errors are logged per file and the run continues.
pub fn run_import(config: &Config) -> Result<RunSummary> {
    let import = &config.import;

    let mut store = SessionStore::open(&import.database)?;
    store.ensure_schema()?;

    if !import.source_dir.is_dir() {
        return Err(ImportError::Config(format!(
            "source directory '{}' does not exist",
            import.source_dir.display()
        )));
    }

    let files = spreadsheet_files(&import.source_dir)?;
    if files.is_empty() {
        warn!(
            dir = %import.source_dir.display(),
            "no .xlsx or .xls files found in source directory"
        );
    }

    let mut summary = RunSummary::default();
    for path in files {
        summary.files_seen += 1;
        info!(file = %path.display(), "processing file");

        match import_file(&mut store, &path, import.sheet.as_deref()) {
            Ok(outcome) => {
                summary.files_imported += 1;
                summary.records_upserted += outcome.upserted;
                summary.rows_skipped += outcome.skipped;
                info!(
                    file = %path.display(),
                    upserted = outcome.upserted,
                    skipped = outcome.skipped,
                    "file imported"
                );
            }
            Err(e) => {
                summary.files_failed += 1;
                error!(file = %path.display(), error = %e, "file import failed");
            }
        }
    }

    info!(
        files_seen = summary.files_seen,
        files_imported = summary.files_imported,
        files_failed = summary.files_failed,
        records_upserted = summary.records_upserted,
        "import run complete"
    );
    Ok(summary)
}

struct FileOutcome {
    upserted: usize,
    skipped: usize,
}

fn import_file(store: &mut SessionStore, path: &Path, sheet: Option<&str>) -> Result<FileOutcome> {
    let dataset = sheet::read_dataset(path, sheet)?;
    let batch = normalize::normalize_dataset(&dataset)?;

    if batch.records.is_empty() {
        warn!(file = %path.display(), "no valid records in file");
        return Ok(FileOutcome {
            upserted: 0,
            skipped: batch.skipped_rows,
        });
    }

    let upserted = store.upsert_batch(&batch.records)?;
    Ok(FileOutcome {
        upserted,
        skipped: batch.skipped_rows,
    })
}

/// Spreadsheet entries of the directory, sorted for a deterministic run
/// order. Excel lock files (`~$...`) are ignored.
fn spreadsheet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_spreadsheet(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_spreadsheet(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with("~$") {
            return false;
        }
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls")
    )
}
