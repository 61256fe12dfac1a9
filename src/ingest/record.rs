use chrono::NaiveDate;
use std::fmt;

use crate::process::date_parser::parse_date;
use crate::process::CsvRow;
use crate::schema::{Column, PgType};

/// One typed cell, ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Text(v) => f.write_str(v),
        }
    }
}

/// One housing entry: its identifier plus a value per destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Canonical text of the key value (`"0042"` in a BIGINT column becomes `"42"`).
    pub key: String,
    pub values: Vec<Value>,
}

impl Record {
    /// Convert a CSV row against the destination columns.
    ///
    /// `coerce_dates` names DATE columns whose unparseable cells become NULL
    /// instead of rejecting the row.
    pub fn from_row(
        row: &CsvRow,
        columns: &[Column],
        key_index: usize,
        coerce_dates: &[String],
    ) -> Result<Self, String> {
        let mut values = Vec::with_capacity(columns.len());
        for (cell, col) in row.cells.iter().zip(columns) {
            let coerce = coerce_dates.iter().any(|d| d == &col.name);
            let v = convert_cell(cell, col.ty, coerce)
                .map_err(|e| format!("column `{}`: {}", col.name, e))?;
            values.push(v);
        }
        if values.len() != columns.len() {
            return Err(format!(
                "expected {} cells, found {}",
                columns.len(),
                values.len()
            ));
        }
        let key = match &values[key_index] {
            Value::Null => return Err("blank key".to_string()),
            v => v.to_string(),
        };
        Ok(Self { key, values })
    }
}

/// Parse a cleaned cell into `ty`; blank is NULL.
pub fn convert_cell(cell: &str, ty: PgType, coerce_dates: bool) -> Result<Value, String> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    match ty {
        PgType::BigInt => cell
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("`{}` is not an integer", cell)),
        PgType::Double => match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(format!("`{}` is not a number", cell)),
        },
        PgType::Boolean => match cell.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("`{}` is not a boolean", cell)),
        },
        PgType::Date => match parse_date(cell) {
            Some(d) => Ok(Value::Date(d)),
            None if coerce_dates => {
                tracing::debug!(cell, "unparseable date coerced to NULL");
                Ok(Value::Null)
            }
            None => Err(format!("`{}` is not a date", cell)),
        },
        PgType::Text => Ok(Value::Text(cell.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> CsvRow {
        CsvRow {
            line: 2,
            cells: cells.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("uniqueid", PgType::BigInt),
            Column::new("sale_date", PgType::Date),
            Column::new("sale_price", PgType::Double),
            Column::new("address", PgType::Text),
        ]
    }

    #[test]
    fn converts_typed_cells() {
        let r = Record::from_row(
            &row(&["0042", "April 9, 2013", "240000", "1808 FOX CHASE DR"]),
            &columns(),
            0,
            &[],
        )
        .unwrap();
        assert_eq!(r.key, "42");
        assert_eq!(
            r.values,
            vec![
                Value::Int(42),
                Value::Date(NaiveDate::from_ymd_opt(2013, 4, 9).unwrap()),
                Value::Float(240000.0),
                Value::Text("1808 FOX CHASE DR".into()),
            ]
        );
    }

    #[test]
    fn blank_cells_are_null() {
        let r = Record::from_row(&row(&["1", "", "", ""]), &columns(), 0, &[]).unwrap();
        assert_eq!(r.values[1..], [Value::Null, Value::Null, Value::Null]);
    }

    #[test]
    fn bad_date_rejects_unless_coerced() {
        let bad = row(&["1", "someday", "1", "x"]);
        let err = Record::from_row(&bad, &columns(), 0, &[]).unwrap_err();
        assert!(err.contains("sale_date"), "{err}");

        let r = Record::from_row(&bad, &columns(), 0, &["sale_date".to_string()]).unwrap();
        assert_eq!(r.values[1], Value::Null);
    }

    #[test]
    fn narrow_column_rejects_text() {
        let err = Record::from_row(&row(&["abc", "", "", ""]), &columns(), 0, &[]).unwrap_err();
        assert!(err.contains("not an integer"), "{err}");
    }

    #[test]
    fn booleans_accept_postgres_spellings() {
        assert_eq!(convert_cell("T", PgType::Boolean, false), Ok(Value::Bool(true)));
        assert_eq!(convert_cell("false", PgType::Boolean, false), Ok(Value::Bool(false)));
        assert!(convert_cell("Yes", PgType::Boolean, false).is_err());
    }
}
