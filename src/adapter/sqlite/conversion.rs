use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::ToSql;

use crate::data::{Value, ValueKind};
use crate::error::{MetaQueryError, Result};
use crate::schema::ColumnType;

/// Temporal values are stored as ISO text, booleans as 0/1.
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqliteValue::Integer(*b as i64)),
            Value::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Binary(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Date(d) => ToSqlOutput::Owned(SqliteValue::Text(d.format("%Y-%m-%d").to_string())),
            Value::Time(t) => ToSqlOutput::Owned(SqliteValue::Text(t.format("%H:%M:%S%.f").to_string())),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(SqliteValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            }
        })
    }
}

/// Reads one SQLite cell, shaped by the type the select item expects.
///
/// SQLite stores whatever it is given, so a cell that does not fit the
/// expected type is returned as stored.
pub(crate) fn from_value_ref(value: ValueRef<'_>, expected: Option<ColumnType>) -> Result<Value> {
    let kind = expected.and_then(|t| t.value_kind());
    let value = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match kind {
            Some(ValueKind::Boolean) => Value::Boolean(i != 0),
            Some(ValueKind::Float) => Value::Float(i as f64),
            _ => Value::Integer(i),
        },
        ValueRef::Real(f) => match kind {
            Some(ValueKind::Integer) if f.fract() == 0.0 => Value::Integer(f as i64),
            _ => Value::Float(f),
        },
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| MetaQueryError::ValueConversion {
                value: String::from_utf8_lossy(bytes).into_owned(),
                target: ColumnType::Varchar,
            })?;
            match (kind, expected) {
                (
                    Some(ValueKind::Date | ValueKind::Time | ValueKind::Timestamp | ValueKind::Boolean),
                    Some(column_type),
                ) => column_type
                    .convert(Value::from(text))
                    .unwrap_or_else(|_| Value::from(text)),
                _ => Value::from(text),
            }
        }
        ValueRef::Blob(bytes) => Value::Binary(bytes.to_vec()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::Connection;

    #[test]
    fn test_round_trip_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (d DATE, b BOOLEAN, n INTEGER)").unwrap();
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        conn.execute(
            "INSERT INTO t VALUES (?, ?, ?)",
            rusqlite::params![date, Value::Boolean(true), Value::Null],
        )
        .unwrap();
        let (d, b, n) = conn
            .query_row("SELECT d, b, n FROM t", [], |row| {
                Ok((
                    from_value_ref(row.get_ref(0)?, Some(ColumnType::Date)).unwrap(),
                    from_value_ref(row.get_ref(1)?, Some(ColumnType::Boolean)).unwrap(),
                    from_value_ref(row.get_ref(2)?, Some(ColumnType::Integer)).unwrap(),
                ))
            })
            .unwrap();
        assert_eq!(d, date);
        assert_eq!(b, Value::Boolean(true));
        assert_eq!(n, Value::Null);
    }

    #[test]
    fn test_mismatched_text_kept() {
        let value = from_value_ref(ValueRef::Text(b"soon"), Some(ColumnType::Date)).unwrap();
        assert_eq!(value, Value::from("soon"));
        let value = from_value_ref(ValueRef::Real(3.0), Some(ColumnType::Integer)).unwrap();
        assert_eq!(value, Value::Integer(3));
    }
}
