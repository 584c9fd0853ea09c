use rusqlite::Connection;

use crate::error::{MetaQueryError, Result};
use crate::schema::{Column, ColumnType, Schema, Table, TableType};

const LIST_TABLES: &str = "SELECT name, type FROM sqlite_master \
     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Reads every user table and view of the connection into one schema.
pub(crate) fn load_schema(conn: &Connection, schema_name: &str) -> Result<Schema> {
    let mut stmt = conn
        .prepare(LIST_TABLES)
        .map_err(|e| MetaQueryError::sql(LIST_TABLES, e))?;
    let entries = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| MetaQueryError::sql(LIST_TABLES, e))?;

    let mut schema = Schema::new(schema_name);
    for (name, kind) in entries {
        let table = load_table(conn, &name)?.with_type(TableType::from_native(&kind));
        schema.add_table(table)?;
    }
    Ok(schema)
}

/// Reads one table's columns from `PRAGMA table_info`.
pub(crate) fn load_table(conn: &Connection, name: &str) -> Result<Table> {
    let pragma = format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\""));
    let mut stmt = conn
        .prepare(&pragma)
        .map_err(|e| MetaQueryError::sql(&pragma, e))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let native: String = row.get(2)?;
            let not_null: bool = row.get(3)?;
            let pk: i64 = row.get(5)?;
            Ok((name, native, not_null, pk))
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| MetaQueryError::sql(&pragma, e))?;

    let mut table = Table::new(name);
    for (column_name, native, not_null, pk) in columns {
        let mut column =
            Column::new(column_name, ColumnType::from_native(&native)).with_nullable(!not_null);
        if pk > 0 {
            column = column.with_primary_key(pk as usize);
        }
        if !native.is_empty() {
            column = column.with_native_type(native.clone());
        }
        if let Some(size) = declared_size(&native) {
            column = column.with_size(size);
        }
        table.add_column(column)?;
    }
    Ok(table)
}

/// The first number in a declared type such as `VARCHAR(40)`.
fn declared_size(native: &str) -> Option<u32> {
    let open = native.find('(')?;
    let rest = &native[open + 1..];
    let end = rest.find([',', ')'])?;
    rest[..end].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE person (id INTEGER PRIMARY KEY, name VARCHAR(40) NOT NULL, born DATE);
             CREATE VIEW adults AS SELECT id FROM person;",
        )
        .unwrap();
        let schema = load_schema(&conn, "main").unwrap();
        assert_eq!(schema.table_names(), vec!["adults", "person"]);
        assert_eq!(schema.table_by_name("adults").unwrap().table_type(), TableType::View);

        let person = schema.table_by_name("person").unwrap();
        assert_eq!(person.qualified_label(), "main.person");
        let id = person.column_by_name("id").unwrap();
        assert_eq!(id.primary_key, Some(1));
        assert_eq!(id.column_type, ColumnType::Integer);
        let name = person.column_by_name("name").unwrap();
        assert_eq!(name.column_type, ColumnType::Varchar);
        assert_eq!(name.size, Some(40));
        assert_eq!(name.nullable, Some(false));
        assert_eq!(person.column_by_name("born").unwrap().column_type, ColumnType::Date);
    }

    #[test]
    fn test_declared_size() {
        assert_eq!(declared_size("VARCHAR(40)"), Some(40));
        assert_eq!(declared_size("DECIMAL(10, 2)"), Some(10));
        assert_eq!(declared_size("TEXT"), None);
    }
}
