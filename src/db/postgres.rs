use anyhow::{Context, Result};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::error::DatabaseError;
use sqlx::{Connection, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

use super::{BatchOutcome, Destination, InsertOutcome};
use crate::ingest::{Record, Value};
use crate::schema::{
    create_table_sql, insert_batch_if_absent_sql, insert_if_absent_sql, Column, PgType,
    TableColumn, TableRef,
};

/// Open a single-connection pool; fails once `timeout` elapses without a connection.
pub async fn connect(options: PgConnectOptions, timeout: Duration) -> Result<PgPool> {
    let host = options.get_host().to_string();
    let port = options.get_port();
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to PostgreSQL at {}:{}", host, port))
}

/// PostgreSQL destination holding one open transaction.
pub struct PgDestination {
    tx: Transaction<'static, Postgres>,
}

impl PgDestination {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tx = pool.begin().await.context("opening load transaction")?;
        Ok(Self { tx })
    }
}

impl PgDestination {
    /// Run `query` under a savepoint.
    ///
    /// Integrity (`23`) and data (`22`) errors roll the savepoint back and are
    /// handed to the caller as `Ok(Err(_))`; the load transaction stays usable.
    async fn execute_guarded(
        &mut self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Result<u64, Box<dyn DatabaseError>>> {
        let mut sp = Connection::begin(&mut *self.tx)
            .await
            .context("opening savepoint")?;
        match query.execute(&mut *sp).await {
            Ok(done) => {
                sp.commit().await.context("releasing savepoint")?;
                Ok(Ok(done.rows_affected()))
            }
            Err(sqlx::Error::Database(db_err)) if sqlstate_class(&*db_err).is_some() => {
                sp.rollback().await.context("rolling back savepoint")?;
                Ok(Err(db_err))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Destination for PgDestination {
    async fn table_columns(&mut self, table: &TableRef) -> Result<Option<Vec<TableColumn>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name::text, data_type::text
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
        )
        .bind(table.schema.as_str())
        .bind(table.table.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .with_context(|| format!("looking up columns of {}", table))?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .map(|(name, data_type)| TableColumn::new(name, data_type))
                .collect(),
        ))
    }

    async fn create_table(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key: &str,
    ) -> Result<()> {
        let ddl = create_table_sql(table, columns, key);
        debug!("DDL:\n{}", ddl);
        sqlx::query(&ddl)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("creating table {}", table))?;
        Ok(())
    }

    async fn insert_if_absent(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key_index: usize,
        record: &Record,
    ) -> Result<InsertOutcome> {
        let sql = insert_if_absent_sql(table, columns, key_index);
        let mut query = sqlx::query(&sql);
        for (col, value) in columns.iter().zip(&record.values) {
            query = bind_value(query, col.ty, value);
        }

        let outcome = self
            .execute_guarded(query)
            .await
            .with_context(|| format!("inserting key {} into {}", record.key, table))?;
        match outcome {
            Ok(1) => Ok(InsertOutcome::Inserted),
            Ok(_) => Ok(InsertOutcome::Existing),
            Err(db_err) if sqlstate_class(&*db_err) == Some("23") => {
                debug!(key = %record.key, "constraint violation treated as existing: {}", db_err);
                Ok(InsertOutcome::Existing)
            }
            Err(db_err) => Ok(InsertOutcome::Rejected(db_err.message().to_string())),
        }
    }

    async fn insert_batch(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key_index: usize,
        records: &[Record],
    ) -> Result<BatchOutcome> {
        let sql = insert_batch_if_absent_sql(table, columns, key_index, records.len());
        let mut query = sqlx::query(&sql);
        for record in records {
            for (col, value) in columns.iter().zip(&record.values) {
                query = bind_value(query, col.ty, value);
            }
        }

        let outcome = self
            .execute_guarded(query)
            .await
            .with_context(|| format!("inserting {} rows into {}", records.len(), table))?;
        match outcome {
            Ok(inserted) => Ok(BatchOutcome::Applied(inserted)),
            Err(db_err) => {
                debug!(rows = records.len(), "batch rejected, retrying row by row: {}", db_err);
                Ok(BatchOutcome::Rejected)
            }
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("committing load transaction")
    }
}

/// SQLSTATE class of errors a single row can cause (`22` data, `23` integrity).
fn sqlstate_class(err: &dyn DatabaseError) -> Option<&'static str> {
    match err.code()?.get(..2)? {
        "22" => Some("22"),
        "23" => Some("23"),
        _ => None,
    }
}

/// Bind one value; NULLs are bound with the column's type.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    ty: PgType,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => match ty {
            PgType::BigInt => query.bind(None::<i64>),
            PgType::Double => query.bind(None::<f64>),
            PgType::Boolean => query.bind(None::<bool>),
            PgType::Date => query.bind(None::<chrono::NaiveDate>),
            PgType::Text => query.bind(None::<String>),
        },
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Bool(v) => query.bind(*v),
        Value::Date(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
    }
}
