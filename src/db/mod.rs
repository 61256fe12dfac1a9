pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;

use crate::ingest::Record;
use crate::schema::{Column, TableColumn, TableRef};

pub use postgres::{connect, PgDestination};

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key was already there, or the row hit an integrity
    /// constraint; nothing was written.
    Existing,
    /// A value did not fit its column (out of range, too long); nothing was
    /// written. Carries the database's message.
    Rejected(String),
}

/// Result of a multi-row conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The statement ran; this many rows were new.
    Applied(u64),
    /// Some row broke a constraint or did not fit; nothing from the batch was
    /// written and the rows have to go one at a time.
    Rejected,
}

/// The database side of a load, scoped to one transaction.
///
/// Everything done through a destination becomes visible only after
/// [`Destination::commit`]; dropping it rolls back.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// Columns of `table` in ordinal order, or `None` when it does not exist.
    async fn table_columns(&mut self, table: &TableRef) -> Result<Option<Vec<TableColumn>>>;

    async fn create_table(&mut self, table: &TableRef, columns: &[Column], key: &str)
        -> Result<()>;

    /// Insert `record` unless a row with the same key is present.
    async fn insert_if_absent(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key_index: usize,
        record: &Record,
    ) -> Result<InsertOutcome>;

    /// Insert every record whose key is not present, all or nothing.
    ///
    /// Keys within `records` must be distinct.
    async fn insert_batch(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key_index: usize,
        records: &[Record],
    ) -> Result<BatchOutcome>;

    async fn commit(self) -> Result<()>
    where
        Self: Sized;
}
