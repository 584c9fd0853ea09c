use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rusqlite::{params_from_iter, Connection, Statement};
use tracing::debug;

use crate::error::{MetaQueryError, Result};
use crate::schema::{Schema, Table};
use crate::sql::{QueryRewriter, SqlStatement};
use crate::update::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, UpdateCallback,
    UpdateStatement,
};

use super::metadata;

/// Applies an update script's statements on an open transaction.
///
/// Parameterized statements are prepared once per distinct SQL text and
/// reused until the script ends. With inlined values every statement is
/// executed and finalized on the spot.
pub(crate) struct SqliteUpdateCallback<'c> {
    conn: &'c Connection,
    schema: Schema,
    rewriter: &'c dyn QueryRewriter,
    inline_values: bool,
    statements: HashMap<String, Statement<'c>>,
}

impl<'c> SqliteUpdateCallback<'c> {
    pub fn new(
        conn: &'c Connection,
        schema: Schema,
        rewriter: &'c dyn QueryRewriter,
        inline_values: bool,
    ) -> Self {
        Self {
            conn,
            schema,
            rewriter,
            inline_values,
            statements: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn prepared_count(&self) -> usize {
        self.statements.len()
    }

    fn run(&mut self, statement: SqlStatement) -> Result<usize> {
        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "Executing update");
        let conn = self.conn;
        if self.inline_values {
            return conn
                .execute(&statement.sql, [])
                .map_err(|e| MetaQueryError::sql(&statement.sql, e));
        }
        let prepared = match self.statements.entry(statement.sql.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let prepared = conn
                    .prepare(&statement.sql)
                    .map_err(|e| MetaQueryError::sql(&statement.sql, e))?;
                entry.insert(prepared)
            }
        };
        prepared
            .execute(params_from_iter(statement.parameters.iter()))
            .map_err(|e| MetaQueryError::sql(&statement.sql, e))
    }

    fn run_ddl(&self, statement: &SqlStatement) -> Result<()> {
        debug!(sql = %statement.sql, "Executing DDL");
        self.conn
            .execute_batch(&statement.sql)
            .map_err(|e| MetaQueryError::sql(&statement.sql, e))
    }
}

impl UpdateCallback for SqliteUpdateCallback<'_> {
    fn schema_names(&self) -> Vec<String> {
        vec![self.schema.name().to_string()]
    }

    fn schema(&self, name: &str) -> Option<Schema> {
        self.schema
            .name()
            .eq_ignore_ascii_case(name)
            .then(|| self.schema.clone())
    }

    fn default_schema_name(&self) -> String {
        self.schema.name().to_string()
    }

    fn rewriter(&self) -> Option<&dyn QueryRewriter> {
        Some(self.rewriter)
    }

    fn apply_insert(&mut self, insert: InsertStatement) -> Result<()> {
        let statement = self.rewriter.render_insert(&insert, self.inline_values)?;
        self.run(statement).map(|_| ())
    }

    fn apply_update(&mut self, update: UpdateStatement) -> Result<()> {
        let statement = self.rewriter.render_update(&update, self.inline_values)?;
        self.run(statement).map(|_| ())
    }

    fn apply_delete(&mut self, delete: DeleteStatement) -> Result<()> {
        let statement = self.rewriter.render_delete(&delete, self.inline_values)?;
        self.run(statement).map(|_| ())
    }

    fn apply_create_table(&mut self, create: CreateTableStatement) -> Result<Table> {
        if self.schema.table_by_name(create.table.name()).is_some() {
            return Err(MetaQueryError::TableAlreadyExists(create.table.qualified_label()));
        }
        let statement = self.rewriter.render_create_table(&create)?;
        self.run_ddl(&statement)?;
        let table = metadata::load_table(self.conn, create.table.name())?;
        self.schema.add_table(table)?;
        self.schema
            .table_by_name(create.table.name())
            .cloned()
            .ok_or_else(|| MetaQueryError::TableNotFound(create.table.qualified_label()))
    }

    fn apply_drop_table(&mut self, drop: DropTableStatement) -> Result<()> {
        let statement = self.rewriter.render_drop_table(&drop)?;
        // Cached statements may refer to the dropped table.
        self.statements.clear();
        self.run_ddl(&statement)?;
        self.schema.remove_table(drop.table.name()).map(|_| ())
    }
}
