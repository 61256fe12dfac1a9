pub mod ddl;
pub mod derive;
pub mod types;

pub use ddl::{create_table_sql, insert_batch_if_absent_sql, insert_if_absent_sql};
pub use derive::derive_types;
pub use types::{quote_ident, Column, PgType, TableColumn, TableRef};
