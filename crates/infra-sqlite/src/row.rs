// Value <-> SQLite conversion

use dbguard_core::domain::{ResultSet, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind positional parameters in order
pub(crate) fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &'q [Value]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(v) => query.bind(*v),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

/// Decode rows by each value's storage class
///
/// Column names come from the first row; an empty result has no columns.
pub(crate) fn decode_rows(rows: &[SqliteRow]) -> Result<ResultSet, sqlx::Error> {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..row.len() {
            values.push(decode_value(row, idx)?);
        }
        decoded.push(values);
    }

    Ok(ResultSet::new(columns, decoded))
}

fn decode_value(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" | "NUMERIC" => Value::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}
