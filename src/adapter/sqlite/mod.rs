//! SQLite databases, queried by pushing rendered SQL down to the engine.

mod conversion;
mod metadata;
mod update;

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, warn};

use crate::adapter::{DataContext, UpdateableDataContext};
use crate::data::DataSet;
use crate::engine::{self, NullOrdering};
use crate::error::{ErrorKind, MetaQueryError, Result};
use crate::query::{Query, SelectItem};
use crate::schema::{Column, Schema, Table};
use crate::sql::{Dialect, DialectRewriter, QueryRewriter, SqlStatement};
use crate::update::UpdateScript;

use conversion::from_value_ref;
use update::SqliteUpdateCallback;

const SCHEMA_NAME: &str = "main";
const MAX_SQL_ROWS: usize = i64::MAX as usize;

/// How statements reach the database.
#[derive(Clone)]
pub struct SqliteConfiguration {
    inline_values: bool,
    rewriter: Arc<dyn QueryRewriter>,
}

impl Default for SqliteConfiguration {
    fn default() -> Self {
        Self {
            inline_values: false,
            rewriter: Arc::new(DialectRewriter::new(Dialect::Sqlite)),
        }
    }
}

impl SqliteConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write values as literals instead of binding `?` parameters. Inlined
    /// update statements are not cached.
    pub fn with_inline_values(mut self, inline_values: bool) -> Self {
        self.inline_values = inline_values;
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn inline_values(&self) -> bool {
        self.inline_values
    }

    pub fn rewriter(&self) -> &dyn QueryRewriter {
        self.rewriter.as_ref()
    }
}

/// A data context over one SQLite connection, exposed as schema `main`.
///
/// Query results are read in full while the connection lock is held, so the
/// returned [`DataSet`] is backed by memory rather than a live statement.
/// Closing it early releases the rows but does not cancel any database work.
pub struct SqliteDataContext {
    connection: Mutex<Connection>,
    config: SqliteConfiguration,
    schema: RwLock<Option<Schema>>,
}

impl SqliteDataContext {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| MetaQueryError::sql(format!("open {}", path.display()), e))?;
        Self::from_connection(conn, SqliteConfiguration::default())
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MetaQueryError::sql("open :memory:", e))?;
        Self::from_connection(conn, SqliteConfiguration::default())
    }

    pub fn from_connection(conn: Connection, config: SqliteConfiguration) -> Result<Self> {
        // LIKE is case sensitive everywhere else.
        let pragma = "PRAGMA case_sensitive_like = ON";
        conn.execute_batch(pragma)
            .map_err(|e| MetaQueryError::sql(pragma, e))?;
        Ok(Self {
            connection: Mutex::new(conn),
            config,
            schema: RwLock::new(None),
        })
    }

    pub fn with_configuration(mut self, config: SqliteConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn configuration(&self) -> &SqliteConfiguration {
        &self.config
    }

    /// Runs raw SQL outside of any update script and forgets cached metadata.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let result = self
            .connection
            .lock()
            .execute_batch(sql)
            .map_err(|e| MetaQueryError::sql(sql, e));
        *self.schema.write() = None;
        result
    }

    fn current_schema(&self) -> Result<Schema> {
        if let Some(schema) = self.schema.read().as_ref() {
            return Ok(schema.clone());
        }
        let schema = metadata::load_schema(&self.connection.lock(), SCHEMA_NAME)?;
        debug!(tables = schema.table_count(), "Loaded SQLite schema");
        *self.schema.write() = Some(schema.clone());
        Ok(schema)
    }

    /// Runs a rendered query and reads the whole result.
    fn fetch(&self, header: &[SelectItem], statement: &SqlStatement, skip: usize) -> Result<DataSet> {
        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "Executing query");
        let sql_error = |e: rusqlite::Error| MetaQueryError::sql(&statement.sql, e);
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(&statement.sql).map_err(sql_error)?;
        let expected: Vec<_> = header.iter().map(|item| item.expected_type()).collect();
        let mut rows = stmt
            .query(params_from_iter(statement.parameters.iter()))
            .map_err(sql_error)?;

        let mut values = Vec::new();
        let mut skipped = 0;
        while let Some(row) = rows.next().map_err(sql_error)? {
            if skipped < skip {
                skipped += 1;
                continue;
            }
            let mut tuple = Vec::with_capacity(expected.len());
            for (i, expected_type) in expected.iter().enumerate() {
                let cell = row.get_ref(i).map_err(sql_error)?;
                tuple.push(from_value_ref(cell, *expected_type)?);
            }
            values.push(tuple);
        }
        Ok(DataSet::from_values(header.to_vec(), values))
    }

    /// Renders the query for the configured dialect. A dialect that cannot
    /// skip rows gets a query for `offset + max_rows` rows and the leading
    /// rows are dropped while reading. Row counts are capped at `i64::MAX`,
    /// the largest LIMIT SQLite accepts.
    fn render(&self, query: &Query) -> Result<(SqlStatement, usize)> {
        let rewriter = self.config.rewriter();
        let offset = query.offset();
        let mut query = query.clone();
        query.max_rows = query.max_rows.map(|m| m.min(MAX_SQL_ROWS));
        if offset > 0 && !rewriter.dialect().supports_first_row() {
            query.first_row = None;
            query.max_rows = query.max_rows.map(|m| m.saturating_add(offset).min(MAX_SQL_ROWS));
            return Ok((rewriter.render_query(&query, self.config.inline_values)?, offset));
        }
        Ok((rewriter.render_query(&query, self.config.inline_values)?, 0))
    }
}

impl DataContext for SqliteDataContext {
    fn schema_names(&self) -> Result<Vec<String>> {
        Ok(vec![SCHEMA_NAME.to_string()])
    }

    fn schema_by_name(&self, name: &str) -> Result<Option<Schema>> {
        if !name.eq_ignore_ascii_case(SCHEMA_NAME) {
            return Ok(None);
        }
        self.current_schema().map(Some)
    }

    fn default_schema_name(&self) -> Result<String> {
        Ok(SCHEMA_NAME.to_string())
    }

    fn materialize_table(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> Result<DataSet> {
        let mut query = Query::new().from_table(table.clone());
        for column in columns {
            query = query.select(SelectItem::column(column.clone()).with_from(table.name()));
        }
        if let Some(max_rows) = max_rows {
            query = query.max_rows(max_rows);
        }
        let (statement, skip) = self.render(&query)?;
        self.fetch(&query.select, &statement, skip)
    }

    fn execute_query(&self, query: &Query) -> Result<DataSet> {
        query.validate()?;
        match self.render(query) {
            Ok((statement, skip)) => self.fetch(&query.select, &statement, skip),
            Err(e) if e.kind() == ErrorKind::Unsupported => {
                warn!(
                    dialect = self.config.rewriter().name(),
                    reason = %e,
                    "Query cannot be rendered, evaluating in memory"
                );
                engine::execute(self, query)
            }
            Err(e) => Err(e),
        }
    }

    fn null_ordering(&self) -> NullOrdering {
        NullOrdering::Low
    }

    fn refresh_schemas(&self) -> Result<()> {
        *self.schema.write() = None;
        Ok(())
    }
}

impl UpdateableDataContext for SqliteDataContext {
    fn execute_update(&self, script: &mut dyn UpdateScript) -> Result<()> {
        let schema = self.current_schema()?;
        let mut conn = self.connection.lock();
        let tx = conn
            .transaction()
            .map_err(|e| MetaQueryError::sql("BEGIN", e))?;
        let result = {
            let mut callback = SqliteUpdateCallback::new(
                &tx,
                schema,
                self.config.rewriter(),
                self.config.inline_values,
            );
            script.run(&mut callback)
        };
        let outcome = match result {
            Ok(()) => tx
                .commit()
                .map_err(|e| MetaQueryError::sql("COMMIT", e))
                .map(|_| debug!("Update script committed")),
            Err(e) => {
                debug!(error = %e, "Update script failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        };
        drop(conn);
        *self.schema.write() = None;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DataContextExt, UpdateableDataContextExt};
    use crate::data::Value;
    use crate::query::WhereClause;
    use crate::update::UpdateCallbackExt;

    fn context() -> SqliteDataContext {
        let dc = SqliteDataContext::open_in_memory().unwrap();
        dc.execute_batch(
            "CREATE TABLE person (id INTEGER PRIMARY KEY, name VARCHAR(40), age INTEGER);
             INSERT INTO person VALUES (1, 'kasper', 30), (2, 'ankit', NULL), (3, 'Tomasz', 25);",
        )
        .unwrap();
        dc
    }

    #[test]
    fn test_query_pushdown() {
        let dc = context();
        let rows = dc
            .query()
            .from("person")
            .select("name")
            .where_("age")
            .gt(26)
            .execute()
            .unwrap()
            .to_values()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("kasper")]]);
    }

    #[test]
    fn test_nulls_sort_low() {
        let dc = context();
        let rows = dc
            .execute_sql("SELECT id FROM person ORDER BY age")
            .unwrap()
            .to_values()
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::from(2)], vec![Value::from(3)], vec![Value::from(1)]]
        );
        assert_eq!(dc.null_ordering(), NullOrdering::Low);
    }

    #[test]
    fn test_like_is_case_sensitive() {
        let dc = context();
        let rows = dc
            .execute_sql("SELECT id FROM person WHERE name LIKE 't%'")
            .unwrap()
            .to_values()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_failed_script_rolls_back() {
        let dc = context();
        let result = dc.execute_update_with(|cb| {
            cb.delete_from("person").execute()?;
            cb.insert_into("person").value("id", 1).value("name", "again").execute()?;
            cb.insert_into("person").value("id", 1).value("name", "duplicate").execute()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BackendIo);
        let rows = dc.execute_sql("SELECT COUNT(*) FROM person").unwrap().to_values().unwrap();
        assert_eq!(rows, vec![vec![Value::from(3)]]);
    }

    #[test]
    fn test_create_insert_drop() {
        let dc = context();
        dc.execute_update_with(|cb| {
            let table = cb
                .create_table("main", "yo!")
                .with_column("foo")
                .of_type(crate::schema::ColumnType::Integer)
                .as_primary_key()
                .with_column("bar")
                .execute()?;
            assert_eq!(table.qualified_label(), "main.yo!");
            cb.insert_into(table.clone()).value("foo", 1).value("bar", "x").execute()?;
            cb.update(table).value("bar", Value::Null).where_("foo").eq(1).execute()
        })
        .unwrap();
        let rows = dc.execute_sql("SELECT foo, bar FROM \"yo!\"").unwrap().to_values().unwrap();
        assert_eq!(rows, vec![vec![Value::from(1), Value::Null]]);

        dc.execute_update_with(|cb| cb.drop_table("yo!").execute()).unwrap();
        assert!(dc.default_schema().unwrap().table_by_name("yo!").is_none());
    }

    #[test]
    fn test_statements_prepared_once() {
        let dc = context();
        let schema = dc.current_schema().unwrap();
        let conn = dc.connection.lock();
        let rewriter = DialectRewriter::new(Dialect::Sqlite);
        let mut callback = SqliteUpdateCallback::new(&conn, schema, &rewriter, false);
        for id in 10..13 {
            callback.insert_into("person").value("id", id).value("name", "n").execute().unwrap();
        }
        callback.insert_into("person").value("id", 20).execute().unwrap();
        assert_eq!(callback.prepared_count(), 2);
    }

    #[test]
    fn test_inline_values_prepare_nothing() {
        let dc = context();
        let schema = dc.current_schema().unwrap();
        let conn = dc.connection.lock();
        let rewriter = DialectRewriter::new(Dialect::Sqlite);
        let mut callback = SqliteUpdateCallback::new(&conn, schema, &rewriter, true);
        callback.insert_into("person").value("id", 10).value("name", "it's").execute().unwrap();
        assert_eq!(callback.prepared_count(), 0);
        let name: String = conn
            .query_row("SELECT name FROM person WHERE id = 10", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "it's");
    }
}
