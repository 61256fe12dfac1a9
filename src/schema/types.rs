// src/schema/types.rs

use std::fmt;

/// The column types a derived table can carry.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum PgType {
    BigInt,
    Double,
    Boolean,
    Date,
    Text,
}

impl PgType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            PgType::BigInt => "BIGINT",
            PgType::Double => "DOUBLE PRECISION",
            PgType::Boolean => "BOOLEAN",
            PgType::Date => "DATE",
            PgType::Text => "TEXT",
        }
    }

    /// Map `information_schema.columns.data_type` of an existing column.
    ///
    /// `None` for types a parameter of one of ours has no assignment cast to
    /// (timestamps, uuid, json, arrays, enums, ...).
    pub fn from_information_schema(data_type: &str) -> Option<Self> {
        let ty = match data_type.trim().to_ascii_lowercase().as_str() {
            "bigint" | "integer" | "smallint" => PgType::BigInt,
            "double precision" | "real" | "numeric" => PgType::Double,
            "boolean" => PgType::Boolean,
            "date" => PgType::Date,
            "text" | "character varying" | "character" => PgType::Text,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single column of the destination table.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: PgType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: PgType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A column as found on an existing table.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct TableColumn {
    pub name: String,
    /// `information_schema.columns.data_type`, e.g. `bigint`, `character varying`.
    pub data_type: String,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// The loader's view of this column, or `None` if it cannot write to it.
    pub fn to_column(&self) -> Option<Column> {
        PgType::from_information_schema(&self.data_type).map(|ty| Column::new(&self.name, ty))
    }
}

impl From<&Column> for TableColumn {
    fn from(c: &Column) -> Self {
        Self::new(&c.name, c.ty.as_sql().to_ascii_lowercase())
    }
}

/// Fully-qualified destination, `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `"schema"."table"`, safe to splice into SQL.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Double-quote an identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
