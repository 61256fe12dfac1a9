//! In-memory destination with commit/rollback semantics, for exercising the
//! ingester without a PostgreSQL server.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::{BatchOutcome, Destination, InsertOutcome};
use crate::ingest::{Record, Value};
use crate::schema::{Column, TableColumn, TableRef};

#[derive(Debug, Clone)]
pub struct MemTable {
    pub columns: Vec<TableColumn>,
    pub key: String,
    /// key → full row in `columns` order
    pub rows: BTreeMap<String, Vec<Value>>,
}

type Tables = HashMap<TableRef, MemTable>;

/// Committed state shared by every transaction opened on it.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    committed: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn begin(&self) -> MemoryDestination {
        let staged = self.committed.lock().unwrap().clone();
        MemoryDestination {
            committed: Arc::clone(&self.committed),
            staged,
            ddl_count: 0,
            batch_count: 0,
            reject_batches: false,
        }
    }

    /// Create a table directly, as if someone else had made it.
    pub fn seed_table(&self, table: &TableRef, key: &str, columns: Vec<TableColumn>) {
        self.committed.lock().unwrap().insert(
            table.clone(),
            MemTable {
                columns,
                key: key.to_string(),
                rows: BTreeMap::new(),
            },
        );
    }

    pub fn table(&self, table: &TableRef) -> Option<MemTable> {
        self.committed.lock().unwrap().get(table).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.lock().unwrap().is_empty()
    }
}

pub struct MemoryDestination {
    committed: Arc<Mutex<Tables>>,
    staged: Tables,
    /// Number of `create_table` calls in this transaction.
    pub ddl_count: usize,
    /// Number of `insert_batch` calls in this transaction.
    pub batch_count: usize,
    /// Answer every `insert_batch` with `BatchOutcome::Rejected`.
    pub reject_batches: bool,
}

impl MemoryDestination {
    fn table_mut(&mut self, table: &TableRef) -> Result<&mut MemTable> {
        match self.staged.get_mut(table) {
            Some(t) => Ok(t),
            None => bail!("relation {} does not exist", table),
        }
    }
}

/// Lay `record` out in table order; unlisted columns stay NULL.
fn table_row(
    t: &MemTable,
    table: &TableRef,
    columns: &[Column],
    record: &Record,
) -> Result<Vec<Value>> {
    let mut row = vec![Value::Null; t.columns.len()];
    for (col, value) in columns.iter().zip(&record.values) {
        match t.columns.iter().position(|c| c.name == col.name) {
            Some(i) => row[i] = value.clone(),
            None => bail!("column {} of {} does not exist", col.name, table),
        }
    }
    Ok(row)
}

impl Destination for MemoryDestination {
    async fn table_columns(&mut self, table: &TableRef) -> Result<Option<Vec<TableColumn>>> {
        Ok(self.staged.get(table).map(|t| t.columns.clone()))
    }

    async fn create_table(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key: &str,
    ) -> Result<()> {
        self.ddl_count += 1;
        self.staged.entry(table.clone()).or_insert_with(|| MemTable {
            columns: columns.iter().map(TableColumn::from).collect(),
            key: key.to_string(),
            rows: BTreeMap::new(),
        });
        Ok(())
    }

    async fn insert_if_absent(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        _key_index: usize,
        record: &Record,
    ) -> Result<InsertOutcome> {
        let t = self.table_mut(table)?;
        if t.rows.contains_key(&record.key) {
            return Ok(InsertOutcome::Existing);
        }
        let row = table_row(t, table, columns, record)?;
        t.rows.insert(record.key.clone(), row);
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_batch(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        _key_index: usize,
        records: &[Record],
    ) -> Result<BatchOutcome> {
        self.batch_count += 1;
        if self.reject_batches {
            return Ok(BatchOutcome::Rejected);
        }
        let t = self.table_mut(table)?;
        let mut fresh = Vec::new();
        for record in records {
            if !t.rows.contains_key(&record.key) {
                fresh.push((record.key.clone(), table_row(t, table, columns, record)?));
            }
        }
        let inserted = fresh.len() as u64;
        t.rows.extend(fresh);
        Ok(BatchOutcome::Applied(inserted))
    }

    async fn commit(self) -> Result<()> {
        *self.committed.lock().unwrap() = self.staged;
        Ok(())
    }
}
