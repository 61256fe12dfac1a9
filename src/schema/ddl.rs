use super::{quote_ident, Column, TableRef};

/// `CREATE TABLE IF NOT EXISTS` for the derived columns, keyed on `key`.
pub fn create_table_sql(table: &TableRef, columns: &[Column], key: &str) -> String {
    let mut parts: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.as_sql()))
        .collect();
    parts.push(format!("PRIMARY KEY ({})", quote_ident(key)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table.quoted(),
        parts.join(",\n    ")
    )
}

/// Insert one row unless a row with the same key is already present.
///
/// Parameters are `$1..$n` in column order, each cast to its column type so
/// NULLs and untyped literals bind unambiguously. The key parameter is reused
/// in the existence probe.
pub fn insert_if_absent_sql(table: &TableRef, columns: &[Column], key_index: usize) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let params: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("${}::{}", i + 1, c.ty.as_sql()))
        .collect();
    let key = &columns[key_index];
    format!(
        "INSERT INTO {t} ({names}) SELECT {params} \
         WHERE NOT EXISTS (SELECT 1 FROM {t} WHERE {key} = ${idx}::{ty}) \
         ON CONFLICT DO NOTHING",
        t = table.quoted(),
        names = names.join(", "),
        params = params.join(", "),
        key = quote_ident(&key.name),
        idx = key_index + 1,
        ty = key.ty.as_sql(),
    )
}

/// Multi-row form of [`insert_if_absent_sql`] for `rows` records.
///
/// Parameters run row by row, `columns.len()` per row. Keys must be distinct
/// within one batch: the existence probe does not see rows written by the
/// same statement.
pub fn insert_batch_if_absent_sql(
    table: &TableRef,
    columns: &[Column],
    key_index: usize,
    rows: usize,
) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let tuples: Vec<String> = (0..rows)
        .map(|r| {
            let params: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("${}::{}", r * columns.len() + i + 1, c.ty.as_sql()))
                .collect();
            format!("({})", params.join(", "))
        })
        .collect();
    let key = quote_ident(&columns[key_index].name);
    format!(
        "INSERT INTO {t} ({names}) SELECT {picked} FROM (VALUES {tuples}) AS v ({names}) \
         WHERE NOT EXISTS (SELECT 1 FROM {t} AS existing WHERE existing.{key} = v.{key}) \
         ON CONFLICT DO NOTHING",
        t = table.quoted(),
        names = names.join(", "),
        picked = names
            .iter()
            .map(|n| format!("v.{}", n))
            .collect::<Vec<_>>()
            .join(", "),
        tuples = tuples.join(", "),
        key = key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PgType;

    fn housing_columns() -> Vec<Column> {
        vec![
            Column::new("uniqueid", PgType::BigInt),
            Column::new("sale_date", PgType::Date),
            Column::new("sale_price", PgType::Double),
        ]
    }

    #[test]
    fn create_table_declares_primary_key() {
        let sql = create_table_sql(
            &TableRef::new("public", "nashville_housing"),
            &housing_columns(),
            "uniqueid",
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"nashville_housing\" (\n    \
             \"uniqueid\" BIGINT,\n    \
             \"sale_date\" DATE,\n    \
             \"sale_price\" DOUBLE PRECISION,\n    \
             PRIMARY KEY (\"uniqueid\")\n)"
        );
    }

    #[test]
    fn insert_probes_key_before_writing() {
        let sql = insert_if_absent_sql(&TableRef::new("s", "t"), &housing_columns(), 0);
        assert_eq!(
            sql,
            "INSERT INTO \"s\".\"t\" (\"uniqueid\", \"sale_date\", \"sale_price\") \
             SELECT $1::BIGINT, $2::DATE, $3::DOUBLE PRECISION \
             WHERE NOT EXISTS (SELECT 1 FROM \"s\".\"t\" WHERE \"uniqueid\" = $1::BIGINT) \
             ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn batch_insert_numbers_parameters_row_by_row() {
        let columns = vec![
            Column::new("uniqueid", PgType::BigInt),
            Column::new("owner", PgType::Text),
        ];
        let sql = insert_batch_if_absent_sql(&TableRef::new("s", "t"), &columns, 0, 2);
        assert_eq!(
            sql,
            "INSERT INTO \"s\".\"t\" (\"uniqueid\", \"owner\") \
             SELECT v.\"uniqueid\", v.\"owner\" \
             FROM (VALUES ($1::BIGINT, $2::TEXT), ($3::BIGINT, $4::TEXT)) AS v (\"uniqueid\", \"owner\") \
             WHERE NOT EXISTS (SELECT 1 FROM \"s\".\"t\" AS existing WHERE existing.\"uniqueid\" = v.\"uniqueid\") \
             ON CONFLICT DO NOTHING"
        );
    }
}
