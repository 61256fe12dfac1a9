use anyhow::anyhow;
use anyhow::Result;
use tracing::{debug, warn};

use super::{Column, PgType};
use crate::process::date_parser::parse_date;
use crate::process::CsvRow;

/// For each column, look at every row:
///  - Ignore empty cells
///  - Infer the narrowest type of each sample
///  - Widen BIGINT + DOUBLE PRECISION to DOUBLE PRECISION
///  - Any other disagreement stops the scan and falls back to TEXT
///  - No samples at all is TEXT too
///
/// Columns listed in `date_columns` are DATE regardless of their samples;
/// their unparseable cells are coerced to NULL at conversion time.
pub fn derive_types(
    table_name: &str,
    header_names: &[String],
    rows: &[CsvRow],
    date_columns: &[String],
) -> Result<Vec<Column>> {
    if header_names.is_empty() {
        return Err(anyhow!("derive_types: `{}` has no headers", table_name));
    }

    if rows.iter().any(|r| r.cells.len() > header_names.len()) {
        warn!(
            "derive_types: some rows in `{}` have more cells than headers ({} headers)",
            table_name,
            header_names.len()
        );
    }

    let mut cols = Vec::with_capacity(header_names.len());

    for (idx, col_name) in header_names.iter().enumerate() {
        if date_columns.iter().any(|d| d == col_name) {
            cols.push(Column::new(col_name, PgType::Date));
            continue;
        }

        let mut current: Option<PgType> = None;

        for row in rows {
            let cell = row.cells.get(idx).map(|s| s.as_str()).unwrap_or("");
            if cell.is_empty() {
                continue;
            }

            let inferred = infer_type(cell);
            current = match current {
                None => Some(inferred),
                Some(prev) => match widen(prev, inferred) {
                    Some(t) => Some(t),
                    None => {
                        debug!(
                            "derive_types: column `{}` in `{}` conflict: {} vs {}",
                            col_name, table_name, prev, inferred
                        );
                        Some(PgType::Text)
                    }
                },
            };
            if current == Some(PgType::Text) {
                break;
            }
        }

        let ty = current.unwrap_or_else(|| {
            debug!(
                "derive_types: no samples for `{}` in `{}`, defaulting to TEXT",
                col_name, table_name
            );
            PgType::Text
        });

        cols.push(Column::new(col_name, ty));
    }

    Ok(cols)
}

fn widen(a: PgType, b: PgType) -> Option<PgType> {
    match (a, b) {
        _ if a == b => Some(a),
        (PgType::BigInt, PgType::Double) | (PgType::Double, PgType::BigInt) => {
            Some(PgType::Double)
        }
        _ => None,
    }
}

fn infer_type(v: &str) -> PgType {
    if v.parse::<i64>().is_ok() {
        return PgType::BigInt;
    }
    if v.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false) {
        return PgType::Double;
    }
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false") {
        return PgType::Boolean;
    }
    if parse_date(v).is_some() {
        return PgType::Date;
    }
    PgType::Text
}
