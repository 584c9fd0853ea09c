use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{DataSet, Value};
use crate::engine::evaluator::{compile_filter, CompiledFilter, RowLayout};
use crate::error::{MetaQueryError, Result};
use crate::query::{FilterItem, SelectItem};
use crate::schema::{Column, Schema, Table};
use crate::update::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, RowValues,
    UpdateCallback, UpdateStatement,
};

/// One schema of tables with their rows held in memory.
///
/// Row vectors are shared between clones and copied on first write, so
/// cloning a store to run an update script against is cheap and readers of
/// the previous snapshot keep iterating undisturbed.
#[derive(Debug, Clone)]
pub(crate) struct MemoryStore {
    schema: Schema,
    rows: HashMap<String, Arc<Vec<Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new(schema_name: &str) -> Self {
        Self {
            schema: Schema::new(schema_name),
            rows: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.schema
            .table_by_name(name)
            .ok_or_else(|| MetaQueryError::TableNotFound(format!("{}.{}", self.schema.name(), name)))
    }

    /// Registers a table, converting every value to its column's type.
    pub fn add_table(&mut self, table: Table, rows: Vec<Vec<Value>>) -> Result<Table> {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(table.columns())
                    .map(|(value, column)| column.column_type.convert(value))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let name = table.name().to_string();
        self.schema.add_table(table)?;
        self.rows.insert(name.clone(), Arc::new(rows));
        self.table(&name).cloned()
    }

    pub fn remove_table(&mut self, name: &str) -> Result<Table> {
        let removed = self.schema.remove_table(name)?;
        self.rows.remove(removed.name());
        Ok(removed)
    }

    pub fn rows(&self, name: &str) -> Result<Arc<Vec<Vec<Value>>>> {
        let table = self.table(name)?;
        Ok(self.rows.get(table.name()).cloned().unwrap_or_default())
    }

    fn rows_mut(&mut self, name: &str) -> Result<&mut Vec<Vec<Value>>> {
        let key = self.table(name)?.name().to_string();
        Ok(Arc::make_mut(self.rows.entry(key).or_default()))
    }

    pub fn materialize(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> Result<DataSet> {
        let current = self.table(table.name())?;
        let indices = columns
            .iter()
            .map(|c| {
                current
                    .column_index(&c.name)
                    .ok_or_else(|| MetaQueryError::ColumnNotFound(c.qualified_label()))
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = self.rows(table.name())?;
        let end = max_rows.map_or(rows.len(), |max| max.min(rows.len()));
        let header = columns.iter().cloned().map(SelectItem::column).collect();
        Ok(DataSet::new(
            header,
            TableRows {
                rows,
                indices,
                position: 0,
                end,
            },
        ))
    }

    fn compile_where(table: &Table, where_items: &[FilterItem]) -> Result<Vec<CompiledFilter>> {
        let layout = RowLayout::new(table.columns().iter().cloned().map(SelectItem::column).collect());
        where_items.iter().map(|f| compile_filter(f, &layout)).collect()
    }

    /// Values of the set columns, converted and keyed by column position.
    fn assignments(table: &Table, values: &RowValues) -> Result<Vec<(usize, Value)>> {
        values
            .assignments()
            .map(|(column, value)| {
                let target = table
                    .column_by_name(&column.name)
                    .ok_or_else(|| MetaQueryError::ColumnNotFound(column.qualified_label()))?;
                if value.is_null() && target.nullable == Some(false) {
                    return Err(MetaQueryError::SchemaMismatch(format!(
                        "Column '{}' is not nullable",
                        target.qualified_label()
                    )));
                }
                Ok((target.number, target.column_type.convert(value.clone())?))
            })
            .collect()
    }

    pub fn insert(&mut self, insert: &InsertStatement) -> Result<()> {
        let table = self.table(insert.table.name())?.clone();
        let mut row = vec![Value::Null; table.column_count()];
        for (index, value) in Self::assignments(&table, &insert.values)? {
            row[index] = value;
        }
        self.rows_mut(table.name())?.push(row);
        Ok(())
    }

    /// Returns the number of rows changed.
    pub fn update(&mut self, update: &UpdateStatement) -> Result<usize> {
        let table = self.table(update.table.name())?.clone();
        let filters = Self::compile_where(&table, &update.where_items)?;
        let assignments = Self::assignments(&table, &update.values)?;
        let rows = self.rows_mut(table.name())?;
        let mut changed = 0;
        for row in rows.iter_mut() {
            if matches(&filters, row)? {
                for (index, value) in &assignments {
                    row[*index] = value.clone();
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Returns the number of rows removed.
    pub fn delete(&mut self, delete: &DeleteStatement) -> Result<usize> {
        let table = self.table(delete.table.name())?.clone();
        let filters = Self::compile_where(&table, &delete.where_items)?;
        let rows = self.rows_mut(table.name())?;
        let mut doomed = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            doomed.push(matches(&filters, row)?);
        }
        let before = rows.len();
        let mut flags = doomed.into_iter();
        rows.retain(|_| !flags.next().unwrap_or(false));
        Ok(before - rows.len())
    }

    pub fn create_table(&mut self, create: &CreateTableStatement) -> Result<Table> {
        let schema = create.table.schema_name();
        if !schema.is_empty() && !schema.eq_ignore_ascii_case(self.schema.name()) {
            return Err(MetaQueryError::SchemaNotFound(schema.to_string()));
        }
        self.add_table(create.table.clone(), Vec::new())
    }

    pub fn drop_table(&mut self, drop: &DropTableStatement) -> Result<()> {
        self.remove_table(drop.table.name()).map(|_| ())
    }
}

fn matches(filters: &[CompiledFilter], row: &[Value]) -> Result<bool> {
    for filter in filters {
        if !filter.eval(row)?.is_true() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Lazily projects a shared row vector.
struct TableRows {
    rows: Arc<Vec<Vec<Value>>>,
    indices: Vec<usize>,
    position: usize,
    end: usize,
}

impl Iterator for TableRows {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }
        let row = &self.rows[self.position];
        self.position += 1;
        Some(Ok(self
            .indices
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
            .collect()))
    }
}

/// Applies an update script's statements to a store.
pub(crate) struct StoreUpdateCallback<'s> {
    store: &'s mut MemoryStore,
}

impl<'s> StoreUpdateCallback<'s> {
    pub fn new(store: &'s mut MemoryStore) -> Self {
        Self { store }
    }
}

impl UpdateCallback for StoreUpdateCallback<'_> {
    fn schema_names(&self) -> Vec<String> {
        vec![self.store.schema.name().to_string()]
    }

    fn schema(&self, name: &str) -> Option<Schema> {
        self.store
            .schema
            .name()
            .eq_ignore_ascii_case(name)
            .then(|| self.store.schema.clone())
    }

    fn default_schema_name(&self) -> String {
        self.store.schema.name().to_string()
    }

    fn apply_insert(&mut self, insert: InsertStatement) -> Result<()> {
        self.store.insert(&insert)
    }

    fn apply_update(&mut self, update: UpdateStatement) -> Result<()> {
        self.store.update(&update).map(|_| ())
    }

    fn apply_delete(&mut self, delete: DeleteStatement) -> Result<()> {
        self.store.delete(&delete).map(|_| ())
    }

    fn apply_create_table(&mut self, create: CreateTableStatement) -> Result<Table> {
        self.store.create_table(&create)
    }

    fn apply_drop_table(&mut self, drop: DropTableStatement) -> Result<()> {
        self.store.drop_table(&drop)
    }
}
