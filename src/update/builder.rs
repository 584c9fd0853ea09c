use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::builder::{resolve_item, FilterSlot};
use crate::query::{FilterItem, FromItem, ItemRef, SelectItem, WhereClause};
use crate::schema::{Column, ColumnType, Table};
use crate::sql::{DialectRewriter, QueryRewriter, SqlStatement};

use super::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, RowValues,
    UpdateCallback, UpdateStatement,
};

fn render<U: UpdateCallback + ?Sized>(
    callback: &U,
    f: impl FnOnce(&dyn QueryRewriter) -> Result<SqlStatement>,
) -> Result<String> {
    let statement = match callback.rewriter() {
        Some(rewriter) => f(rewriter)?,
        None => f(&DialectRewriter::default())?,
    };
    Ok(statement.sql)
}

/// Shared state of the insert and update builders.
struct Target {
    table: Option<Table>,
    values: Option<RowValues>,
    error: Option<MetaQueryError>,
}

impl Target {
    fn new(table: Result<Table>) -> Self {
        match table {
            Ok(table) => Self {
                values: Some(RowValues::new(table.columns().to_vec())),
                table: Some(table),
                error: None,
            },
            Err(e) => Self {
                table: None,
                values: None,
                error: Some(e),
            },
        }
    }

    fn record_error(&mut self, error: MetaQueryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn set(&mut self, column: &str, value: Value) {
        let result = match self.values.as_mut() {
            Some(values) => values.set_by_name(column, value),
            None => return,
        };
        if let Err(e) = result {
            self.record_error(e);
        }
    }

    fn set_at(&mut self, index: usize, value: Value) {
        let result = match self.values.as_mut() {
            Some(values) => values.set(index, value),
            None => return,
        };
        if let Err(e) = result {
            self.record_error(e);
        }
    }

    fn take(&mut self) -> Result<(Table, RowValues)> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        match (self.table.clone(), self.values.clone()) {
            (Some(table), Some(values)) => Ok((table, values)),
            _ => Err(MetaQueryError::InvalidState("No target table".to_string())),
        }
    }

    fn from_items(&self) -> Vec<FromItem> {
        self.table.iter().cloned().map(FromItem::table).collect()
    }
}

/// `INSERT INTO` one row. Columns never given a value are left out of the
/// statement; `value(c, Value::Null)` sets an explicit NULL.
pub struct InsertBuilder<'a, U: UpdateCallback + ?Sized> {
    callback: &'a mut U,
    target: Target,
}

impl<'a, U: UpdateCallback + ?Sized> InsertBuilder<'a, U> {
    pub(crate) fn new(callback: &'a mut U, table: Result<Table>) -> Self {
        Self {
            callback,
            target: Target::new(table),
        }
    }

    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.target.set(column, value.into());
        self
    }

    pub fn value_at(mut self, index: usize, value: impl Into<Value>) -> Self {
        self.target.set_at(index, value.into());
        self
    }

    fn statement(&mut self) -> Result<InsertStatement> {
        let (table, values) = self.target.take()?;
        Ok(InsertStatement { table, values })
    }

    pub fn to_sql(mut self) -> Result<String> {
        let statement = self.statement()?;
        render(&*self.callback, |r| r.render_insert(&statement, true))
    }

    pub fn execute(mut self) -> Result<()> {
        let statement = self.statement()?;
        self.callback.apply_insert(statement)
    }
}

/// `UPDATE … SET … WHERE …`. Without a WHERE clause every row is updated.
pub struct UpdateBuilder<'a, U: UpdateCallback + ?Sized> {
    callback: &'a mut U,
    target: Target,
    where_items: Vec<FilterItem>,
}

impl<'a, U: UpdateCallback + ?Sized> UpdateBuilder<'a, U> {
    pub(crate) fn new(callback: &'a mut U, table: Result<Table>) -> Self {
        Self {
            callback,
            target: Target::new(table),
            where_items: Vec::new(),
        }
    }

    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.target.set(column, value.into());
        self
    }

    pub fn value_at(mut self, index: usize, value: impl Into<Value>) -> Self {
        self.target.set_at(index, value.into());
        self
    }

    fn statement(&mut self) -> Result<UpdateStatement> {
        let (table, values) = self.target.take()?;
        Ok(UpdateStatement {
            table,
            values,
            where_items: std::mem::take(&mut self.where_items),
        })
    }

    pub fn to_sql(mut self) -> Result<String> {
        let statement = self.statement()?;
        render(&*self.callback, |r| r.render_update(&statement, true))
    }

    pub fn execute(mut self) -> Result<()> {
        let statement = self.statement()?;
        self.callback.apply_update(statement)
    }
}

impl<'a, U: UpdateCallback + ?Sized> WhereClause for UpdateBuilder<'a, U> {
    fn resolve(&self, item: ItemRef) -> Result<SelectItem> {
        resolve_item(&self.target.from_items(), item)
    }

    fn filters_mut(&mut self, _slot: FilterSlot) -> &mut Vec<FilterItem> {
        &mut self.where_items
    }

    fn record_error(&mut self, error: MetaQueryError) {
        self.target.record_error(error);
    }
}

/// `DELETE FROM … WHERE …`. Without a WHERE clause every row is removed.
pub struct DeleteBuilder<'a, U: UpdateCallback + ?Sized> {
    callback: &'a mut U,
    target: Target,
    where_items: Vec<FilterItem>,
}

impl<'a, U: UpdateCallback + ?Sized> DeleteBuilder<'a, U> {
    pub(crate) fn new(callback: &'a mut U, table: Result<Table>) -> Self {
        Self {
            callback,
            target: Target::new(table),
            where_items: Vec::new(),
        }
    }

    fn statement(&mut self) -> Result<DeleteStatement> {
        let (table, _) = self.target.take()?;
        Ok(DeleteStatement {
            table,
            where_items: std::mem::take(&mut self.where_items),
        })
    }

    pub fn to_sql(mut self) -> Result<String> {
        let statement = self.statement()?;
        render(&*self.callback, |r| r.render_delete(&statement, true))
    }

    pub fn execute(mut self) -> Result<()> {
        let statement = self.statement()?;
        self.callback.apply_delete(statement)
    }
}

impl<'a, U: UpdateCallback + ?Sized> WhereClause for DeleteBuilder<'a, U> {
    fn resolve(&self, item: ItemRef) -> Result<SelectItem> {
        resolve_item(&self.target.from_items(), item)
    }

    fn filters_mut(&mut self, _slot: FilterSlot) -> &mut Vec<FilterItem> {
        &mut self.where_items
    }

    fn record_error(&mut self, error: MetaQueryError) {
        self.target.record_error(error);
    }
}

/// `CREATE TABLE`. Each `with_column` starts a new VARCHAR column which the
/// following `of_type`, `with_size`, `nullable` and `as_primary_key` calls
/// refine.
pub struct CreateTableBuilder<'a, U: UpdateCallback + ?Sized> {
    callback: &'a mut U,
    schema: String,
    name: String,
    columns: Vec<Column>,
    error: Option<MetaQueryError>,
}

impl<'a, U: UpdateCallback + ?Sized> CreateTableBuilder<'a, U> {
    pub(crate) fn new(callback: &'a mut U, schema: &str, name: &str) -> Self {
        Self {
            callback,
            schema: schema.to_string(),
            name: name.to_string(),
            columns: Vec::new(),
            error: None,
        }
    }

    pub fn with_column(mut self, name: &str) -> Self {
        self.columns.push(Column::new(name, ColumnType::Varchar));
        self
    }

    fn current(mut self, f: impl FnOnce(&mut Column)) -> Self {
        match self.columns.last_mut() {
            Some(column) => f(column),
            None if self.error.is_none() => {
                self.error = Some(MetaQueryError::construction(
                    "Column attributes given before with_column",
                ));
            }
            None => {}
        }
        self
    }

    pub fn of_type(self, column_type: ColumnType) -> Self {
        self.current(|c| c.column_type = column_type)
    }

    pub fn with_size(self, size: u32) -> Self {
        self.current(|c| c.size = Some(size))
    }

    pub fn with_native_type(self, native_type: &str) -> Self {
        self.current(|c| c.native_type = Some(native_type.to_string()))
    }

    pub fn nullable(self, nullable: bool) -> Self {
        self.current(|c| c.nullable = Some(nullable))
    }

    /// Key columns are numbered in the order they are marked.
    pub fn as_primary_key(self) -> Self {
        let position = self.columns.iter().filter(|c| c.is_primary_key()).count() + 1;
        self.current(|c| {
            c.primary_key.get_or_insert(position);
            c.nullable = Some(false);
        })
    }

    fn statement(&mut self) -> Result<CreateTableStatement> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let schema = self
            .callback
            .schema(&self.schema)
            .ok_or_else(|| MetaQueryError::SchemaNotFound(self.schema.clone()))?;
        let mut table = Table::new(self.name.clone());
        table.set_schema_name(schema.name());
        for column in self.columns.drain(..) {
            table.add_column(column)?;
        }
        Ok(CreateTableStatement { table })
    }

    pub fn to_sql(mut self) -> Result<String> {
        let statement = self.statement()?;
        render(&*self.callback, |r| r.render_create_table(&statement))
    }

    /// Creates the table and returns it as registered in its schema.
    pub fn execute(mut self) -> Result<Table> {
        let statement = self.statement()?;
        self.callback.apply_create_table(statement)
    }
}

pub struct DropTableBuilder<'a, U: UpdateCallback + ?Sized> {
    callback: &'a mut U,
    table: Result<Table>,
}

impl<'a, U: UpdateCallback + ?Sized> DropTableBuilder<'a, U> {
    pub(crate) fn new(callback: &'a mut U, table: Result<Table>) -> Self {
        Self { callback, table }
    }

    pub fn to_sql(self) -> Result<String> {
        let statement = DropTableStatement { table: self.table? };
        render(&*self.callback, |r| r.render_drop_table(&statement))
    }

    pub fn execute(self) -> Result<()> {
        let statement = DropTableStatement { table: self.table? };
        self.callback.apply_drop_table(statement)
    }
}
