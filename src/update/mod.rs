//! Row changes and DDL, expressed once as builders over an [`UpdateCallback`]
//! that each writable back-end implements.

pub mod builder;
pub mod statement;

pub use builder::{
    CreateTableBuilder, DeleteBuilder, DropTableBuilder, InsertBuilder, UpdateBuilder,
};
pub use statement::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, RowValues,
    UpdateStatement,
};

use crate::adapter::find_table;
use crate::error::Result;
use crate::query::TableRef;
use crate::schema::{Schema, Table};
use crate::sql::QueryRewriter;

/// The per-script handle a writable back-end hands to an [`UpdateScript`].
///
/// Everything applied through one callback belongs to one transaction (SQL)
/// or one snapshot swapped in when the script succeeds (in memory). The
/// schema view reflects DDL applied earlier in the same script.
pub trait UpdateCallback {
    fn schema_names(&self) -> Vec<String>;

    fn schema(&self, name: &str) -> Option<Schema>;

    fn default_schema_name(&self) -> String;

    /// The rewriter `to_sql()` renders with; ANSI when `None`.
    fn rewriter(&self) -> Option<&dyn QueryRewriter> {
        None
    }

    fn apply_insert(&mut self, insert: InsertStatement) -> Result<()>;

    fn apply_update(&mut self, update: UpdateStatement) -> Result<()>;

    fn apply_delete(&mut self, delete: DeleteStatement) -> Result<()>;

    fn apply_create_table(&mut self, create: CreateTableStatement) -> Result<Table>;

    fn apply_drop_table(&mut self, drop: DropTableStatement) -> Result<()>;
}

/// Builder entry points, available on every callback including
/// `&mut dyn UpdateCallback`.
pub trait UpdateCallbackExt: UpdateCallback {
    /// Resolves `table` or `schema.table` against the callback's schema view.
    fn table(&self, label: &str) -> Result<Table> {
        let names = self.schema_names();
        find_table(label, &self.default_schema_name(), &names, &|name| {
            Ok(self.schema(name))
        })
    }

    fn insert_into(&mut self, table: impl Into<TableRef>) -> InsertBuilder<'_, Self> {
        let table = resolve(self, table.into());
        InsertBuilder::new(self, table)
    }

    fn update(&mut self, table: impl Into<TableRef>) -> UpdateBuilder<'_, Self> {
        let table = resolve(self, table.into());
        UpdateBuilder::new(self, table)
    }

    fn delete_from(&mut self, table: impl Into<TableRef>) -> DeleteBuilder<'_, Self> {
        let table = resolve(self, table.into());
        DeleteBuilder::new(self, table)
    }

    fn create_table(&mut self, schema: &str, name: &str) -> CreateTableBuilder<'_, Self> {
        CreateTableBuilder::new(self, schema, name)
    }

    fn drop_table(&mut self, table: impl Into<TableRef>) -> DropTableBuilder<'_, Self> {
        let table = resolve(self, table.into());
        DropTableBuilder::new(self, table)
    }
}

impl<U: UpdateCallback + ?Sized> UpdateCallbackExt for U {}

fn resolve<U: UpdateCallback + ?Sized>(callback: &U, table: TableRef) -> Result<Table> {
    match table {
        TableRef::Table(table) => Ok(table),
        TableRef::Name(name) => callback.table(&name),
    }
}

/// A unit of work run against an [`UpdateCallback`]. Any error aborts the
/// whole script.
pub trait UpdateScript {
    fn run(&mut self, callback: &mut dyn UpdateCallback) -> Result<()>;
}

impl<F> UpdateScript for F
where
    F: FnMut(&mut dyn UpdateCallback) -> Result<()>,
{
    fn run(&mut self, callback: &mut dyn UpdateCallback) -> Result<()> {
        self(callback)
    }
}
