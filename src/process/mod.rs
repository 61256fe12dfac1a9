// src/process/mod.rs
pub mod date_parser;
pub mod utils;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

use utils::{clean_str, is_index_column, sanitize_headers};

/// What to do with a row that cannot be loaded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicy {
    /// Log a warning, count the row as malformed and carry on.
    #[default]
    Skip,
    /// Fail the whole run; nothing is committed.
    Abort,
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Sanitized name of the identifier column.
    pub key_column: String,
    pub policy: RowPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1-based record number in the source file; the header is record 1.
    pub line: u64,
    /// Cleaned cells, one per kept header; blank cells are `""`.
    pub cells: Vec<String>,
}

#[derive(Debug)]
pub struct CsvTable {
    /// Sanitized column names, index columns already dropped.
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    /// Position of the key column within `headers`.
    pub key_index: usize,
    /// Rows rejected while reading under `RowPolicy::Skip`.
    pub malformed: u64,
}

impl CsvTable {
    pub fn key_column(&self) -> &str {
        &self.headers[self.key_index]
    }
}

/// Read `path` into memory:
/// - the first record is the header; index spill-over columns are dropped
/// - headers are sanitized into SQL-safe names
/// - every data row must have exactly one cell per raw header and a non-blank key
///
/// Rows that break those rules are skipped or abort the read according to `opts.policy`.
#[tracing::instrument(level = "info", skip(path, opts), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P, opts: &ReadOptions) -> Result<CsvTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening CSV file {}", path.display()))?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // column-count checks are ours, so they follow the row policy
        .from_reader(BufReader::new(file));

    let raw_headers = rdr
        .headers()
        .with_context(|| format!("reading CSV header of {}", path.display()))?
        .clone();
    if raw_headers.is_empty() {
        bail!("{} has no header row", path.display());
    }

    let kept: Vec<usize> = raw_headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_index_column(h))
        .map(|(i, _)| i)
        .collect();
    let dropped = raw_headers.len() - kept.len();
    if dropped > 0 {
        debug!(dropped, "dropping unnamed index columns");
    }

    let headers = sanitize_headers(kept.iter().map(|&i| &raw_headers[i]));
    let key_index = headers
        .iter()
        .position(|h| h == &opts.key_column)
        .with_context(|| {
            format!(
                "key column `{}` not in CSV header {:?}",
                opts.key_column, headers
            )
        })?;

    let mut rows = Vec::new();
    let mut malformed = 0u64;

    for (idx, result) in rdr.records().enumerate() {
        let line = idx as u64 + 2;
        let problem = match result {
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
            Err(err) => format!("unparseable record: {}", err),
            Ok(record) if record.len() != raw_headers.len() => format!(
                "expected {} fields, found {}",
                raw_headers.len(),
                record.len()
            ),
            Ok(record) => {
                let cells: Vec<String> = kept
                    .iter()
                    .map(|&i| clean_str(record.get(i).unwrap_or("")))
                    .collect();
                if cells[key_index].is_empty() {
                    format!("blank key column `{}`", opts.key_column)
                } else {
                    rows.push(CsvRow { line, cells });
                    continue;
                }
            }
        };

        match opts.policy {
            RowPolicy::Abort => bail!("{} line {}: {}", path.display(), line, problem),
            RowPolicy::Skip => {
                warn!(line, "skipping malformed row: {}", problem);
                malformed += 1;
            }
        }
    }

    info!(
        rows = rows.len(),
        columns = headers.len(),
        malformed,
        "read CSV"
    );

    Ok(CsvTable {
        headers,
        rows,
        key_index,
        malformed,
    })
}
