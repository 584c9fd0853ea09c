//! The back-end capability surfaces and the bundled adapters.
//!
//! Every adapter implements [`DataContext`] (schema discovery and table
//! materialization). Adapters that can run whole queries override
//! [`DataContext::execute_query`]; writable ones add
//! [`UpdateableDataContext`].

pub mod composite;
pub mod csv;
pub mod memory;
pub mod sqlite;

pub use self::csv::{CsvConfiguration, CsvDataContext};
pub use composite::CompositeDataContext;
pub use memory::{
    ArrayTableDataProvider, MapTableDataProvider, MemoryDataContext, ObjectTableDataProvider,
    SimpleTableDef, TableDataProvider, TableRecord,
};
pub use sqlite::{SqliteConfiguration, SqliteDataContext};

use crate::data::DataSet;
use crate::engine::{self, NullOrdering};
use crate::error::{MetaQueryError, Result};
use crate::query::parser::{self, TableLookup};
use crate::query::{Query, QueryBuilder};
use crate::schema::{Column, Schema, Table};
use crate::update::{UpdateCallback, UpdateScript};

/// The root handle to a back-end.
pub trait DataContext: Send + Sync {
    fn schema_names(&self) -> Result<Vec<String>>;

    fn schema_by_name(&self, name: &str) -> Result<Option<Schema>>;

    fn default_schema_name(&self) -> Result<String>;

    fn default_schema(&self) -> Result<Schema> {
        let name = self.default_schema_name()?;
        self.schema_by_name(&name)?
            .ok_or(MetaQueryError::SchemaNotFound(name))
    }

    /// Streams the given columns of a table, in table order, stopping after
    /// `max_rows` rows when given.
    fn materialize_table(
        &self,
        table: &Table,
        columns: &[Column],
        max_rows: Option<usize>,
    ) -> Result<DataSet>;

    /// Runs a whole query. The default evaluates it in memory on top of
    /// [`materialize_table`](DataContext::materialize_table).
    fn execute_query(&self, query: &Query) -> Result<DataSet> {
        engine::execute(self, query)
    }

    fn null_ordering(&self) -> NullOrdering {
        NullOrdering::High
    }

    /// Drops cached metadata so the next lookup re-reads it.
    fn refresh_schemas(&self) -> Result<()> {
        Ok(())
    }
}

/// Conveniences available on every [`DataContext`], including trait objects.
pub trait DataContextExt: DataContext {
    fn query(&self) -> QueryBuilder<'_, Self> {
        QueryBuilder::new(self)
    }

    /// Parses a SELECT statement and binds it against this context's schemas.
    fn parse_query(&self, sql: &str) -> Result<Query> {
        parser::parse_query(self, sql)
    }

    fn execute_sql(&self, sql: &str) -> Result<DataSet> {
        let query = self.parse_query(sql)?;
        self.execute_query(&query)
    }

    /// Resolves `table` or `schema.table`. A prefix naming a schema wins
    /// over a default-schema table whose name happens to contain a dot.
    fn table_by_qualified_label(&self, label: &str) -> Result<Table> {
        let names = self.schema_names()?;
        find_table(label, &self.default_schema_name()?, &names, &|name| {
            self.schema_by_name(name)
        })
    }

    fn table(&self, schema: &str, name: &str) -> Result<Table> {
        let found = self
            .schema_by_name(schema)?
            .ok_or_else(|| MetaQueryError::SchemaNotFound(schema.to_string()))?;
        found
            .table_by_name(name)
            .cloned()
            .ok_or_else(|| MetaQueryError::TableNotFound(format!("{}.{}", schema, name)))
    }
}

impl<C: DataContext + ?Sized> DataContextExt for C {}

impl<C: DataContext + ?Sized> TableLookup for C {
    fn lookup_table(&self, schema: Option<&str>, name: &str) -> Result<Table> {
        match schema {
            Some(schema) => self.table(schema, name),
            None => self.table_by_qualified_label(name),
        }
    }
}

/// Resolves a table label: the longest schema name followed by `.`, then
/// the default schema, then any schema.
pub(crate) fn find_table(
    label: &str,
    default_schema: &str,
    schema_names: &[String],
    schema: &dyn Fn(&str) -> Result<Option<Schema>>,
) -> Result<Table> {
    let mut prefixed: Vec<&String> = schema_names
        .iter()
        .filter(|s| {
            label.len() > s.len() + 1
                && label.is_char_boundary(s.len())
                && label[..s.len()].eq_ignore_ascii_case(s)
                && label[s.len()..].starts_with('.')
        })
        .collect();
    prefixed.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for name in prefixed {
        if let Some(found) = schema(name)? {
            if let Some(table) = found.table_by_name(&label[name.len() + 1..]) {
                return Ok(table.clone());
            }
        }
    }
    if let Some(found) = schema(default_schema)? {
        if let Some(table) = found.table_by_name(label) {
            return Ok(table.clone());
        }
    }
    for name in schema_names {
        if let Some(found) = schema(name)? {
            if let Some(table) = found.table_by_name(label) {
                return Ok(table.clone());
            }
        }
    }
    Err(MetaQueryError::TableNotFound(label.to_string()))
}

/// A back-end that accepts update scripts.
pub trait UpdateableDataContext: DataContext {
    /// Runs the script as one unit: either every change it makes becomes
    /// visible or, when it fails, none does.
    fn execute_update(&self, script: &mut dyn UpdateScript) -> Result<()>;
}

pub trait UpdateableDataContextExt: UpdateableDataContext {
    fn execute_update_with<F>(&self, mut script: F) -> Result<()>
    where
        F: FnMut(&mut dyn UpdateCallback) -> Result<()>,
    {
        self.execute_update(&mut script)
    }
}

impl<C: UpdateableDataContext + ?Sized> UpdateableDataContextExt for C {}
