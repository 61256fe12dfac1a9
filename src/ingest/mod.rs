pub mod record;

pub use record::{convert_cell, Record, Value};

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::db::{BatchOutcome, Destination, InsertOutcome};
use crate::process::{read_csv, CsvTable, ReadOptions, RowPolicy};
use crate::schema::{derive_types, Column, TableRef};

/// Rows per multi-row insert.
const BATCH_ROWS: usize = 500;
/// PostgreSQL's limit on bind parameters in one statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// How a CSV maps onto the destination.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Sanitized identifier column.
    pub key_column: String,
    pub policy: RowPolicy,
    /// DATE columns whose unparseable cells load as NULL.
    pub date_columns: Vec<String>,
}

impl LoadOptions {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            key_column: self.key_column.clone(),
            policy: self.policy,
        }
    }
}

/// Columns the CSV writes to, in CSV order, plus whether this run created the table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: String,
    /// Data rows seen in the file, malformed ones included.
    pub rows_read: u64,
    pub inserted: u64,
    /// Rows skipped because their key was already present.
    pub existing: u64,
    pub malformed: u64,
    pub table_created: bool,
}

/// Reads a CSV and appends the rows it has not seen before to one table.
pub struct Ingester<D> {
    dest: D,
    target: TableRef,
    opts: LoadOptions,
}

impl<D: Destination> Ingester<D> {
    pub fn new(dest: D, target: TableRef, opts: LoadOptions) -> Self {
        Self { dest, target, opts }
    }

    pub fn destination(&self) -> &D {
        &self.dest
    }

    /// Make sure the destination table exists; create it from the CSV header if not.
    ///
    /// Safe to call on every run: an existing table is only inspected. Its
    /// column types win over anything the CSV would suggest.
    #[tracing::instrument(level = "info", skip_all, fields(table = %self.target))]
    pub async fn ensure_schema(&mut self, csv: &CsvTable) -> Result<TableSchema> {
        if let Some(existing) = self.dest.table_columns(&self.target).await? {
            info!("table {} exists -- will append rows", self.target);
            let mut columns = Vec::with_capacity(csv.headers.len());
            for name in &csv.headers {
                let Some(found) = existing.iter().find(|c| &c.name == name) else {
                    bail!(
                        "CSV column `{}` is not a column of {} (has {:?})",
                        name,
                        self.target,
                        existing.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
                    );
                };
                match found.to_column() {
                    Some(c) => columns.push(c),
                    None => bail!(
                        "column `{}` of {} has type `{}`, which CSV cells cannot be loaded into",
                        name,
                        self.target,
                        found.data_type
                    ),
                }
            }
            return Ok(TableSchema {
                columns,
                created: false,
            });
        }

        info!("table {} does not exist, creating", self.target);
        let table_name = self.target.to_string();
        let columns = derive_types(&table_name, &csv.headers, &csv.rows, &self.opts.date_columns)?;
        self.dest
            .create_table(&self.target, &columns, csv.key_column())
            .await?;
        Ok(TableSchema {
            columns,
            created: true,
        })
    }

    /// Insert every row whose key is not in the table yet; first write wins.
    ///
    /// Rows go out in batches. A batch the database refuses is replayed row by
    /// row so only the offending rows are skipped (or abort the run).
    pub async fn insert(&mut self, csv: &CsvTable, schema: &TableSchema) -> Result<LoadReport> {
        let mut report = LoadReport {
            table: self.target.to_string(),
            rows_read: csv.rows.len() as u64 + csv.malformed,
            malformed: csv.malformed,
            table_created: schema.created,
            ..Default::default()
        };

        let batch_rows = (MAX_BIND_PARAMS / schema.columns.len().max(1)).clamp(1, BATCH_ROWS);
        let mut batch = Batch::default();

        for row in &csv.rows {
            let record = match Record::from_row(
                row,
                &schema.columns,
                csv.key_index,
                &self.opts.date_columns,
            ) {
                Ok(r) => r,
                Err(problem) => {
                    self.malformed(row.line, &problem, &mut report)?;
                    continue;
                }
            };

            // a repeated key waits until its first occurrence has been written
            if batch.keys.contains(&record.key) || batch.records.len() == batch_rows {
                self.flush(&mut batch, schema, csv.key_index, &mut report).await?;
            }
            batch.push(row.line, record);
        }
        self.flush(&mut batch, schema, csv.key_index, &mut report).await?;

        info!(
            inserted = report.inserted,
            existing = report.existing,
            malformed = report.malformed,
            "rows applied to {}",
            self.target
        );
        Ok(report)
    }

    async fn flush(
        &mut self,
        batch: &mut Batch,
        schema: &TableSchema,
        key_index: usize,
        report: &mut LoadReport,
    ) -> Result<()> {
        if batch.records.is_empty() {
            return Ok(());
        }
        let outcome = self
            .dest
            .insert_batch(&self.target, &schema.columns, key_index, &batch.records)
            .await?;
        match outcome {
            BatchOutcome::Applied(inserted) => {
                report.inserted += inserted;
                report.existing += batch.records.len() as u64 - inserted;
            }
            BatchOutcome::Rejected => {
                for (line, record) in batch.lines.iter().zip(&batch.records) {
                    let outcome = self
                        .dest
                        .insert_if_absent(&self.target, &schema.columns, key_index, record)
                        .await?;
                    match outcome {
                        InsertOutcome::Inserted => report.inserted += 1,
                        InsertOutcome::Existing => {
                            debug!(key = %record.key, line = *line, "already present");
                            report.existing += 1;
                        }
                        InsertOutcome::Rejected(problem) => {
                            self.malformed(*line, &problem, report)?;
                        }
                    }
                }
            }
        }
        batch.clear();
        Ok(())
    }

    /// Apply the row policy to a row that cannot be loaded.
    fn malformed(&self, line: u64, problem: &str, report: &mut LoadReport) -> Result<()> {
        match self.opts.policy {
            RowPolicy::Abort => bail!("line {}: {}", line, problem),
            RowPolicy::Skip => {
                warn!(line, "skipping malformed row: {}", problem);
                report.malformed += 1;
                Ok(())
            }
        }
    }

    /// `ensure_schema` followed by `insert`, for a CSV already in memory.
    pub async fn ingest(&mut self, csv: &CsvTable) -> Result<LoadReport> {
        let schema = self.ensure_schema(csv).await?;
        self.insert(csv, &schema).await
    }

    /// Parse `path`, ensure the table and insert the new rows.
    ///
    /// The file is read completely before the destination is touched, so a
    /// missing or (under `RowPolicy::Abort`) malformed file changes nothing.
    #[tracing::instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport> {
        let csv = read_csv(path, &self.opts.read_options())?;
        self.ingest(&csv).await
    }

    /// Commit everything done so far in one go.
    pub async fn commit(self) -> Result<()> {
        self.dest.commit().await
    }
}

/// Records waiting for the next multi-row insert; keys are distinct.
#[derive(Default)]
struct Batch {
    lines: Vec<u64>,
    records: Vec<Record>,
    keys: HashSet<String>,
}

impl Batch {
    fn push(&mut self, line: u64, record: Record) {
        self.keys.insert(record.key.clone());
        self.lines.push(line);
        self.records.push(record);
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.records.clear();
        self.keys.clear();
    }
}
