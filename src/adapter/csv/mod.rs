//! A single table stored as delimited text in a [`Resource`].

mod config;
mod reader;
mod writer;

pub use config::CsvConfiguration;

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::adapter::memory::store::MemoryStore;
use crate::adapter::{DataContext, UpdateableDataContext};
use crate::data::DataSet;
use crate::error::{MetaQueryError, Result};
use crate::query::SelectItem;
use crate::resource::{FileResource, Resource};
use crate::schema::{Column, Schema, Table};
use crate::update::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, UpdateCallback,
    UpdateScript, UpdateStatement,
};

use reader::{read_table, CsvRows, RecordReader};
use writer::CsvWriter;

/// A data context over one CSV resource.
///
/// The schema is named after the resource and holds at most one table,
/// named after the resource without its extension. Rows are read lazily
/// on every query. Updates are applied to an in-memory copy and written
/// back in one go when the script succeeds.
pub struct CsvDataContext {
    resource: Arc<dyn Resource>,
    config: CsvConfiguration,
    schema: RwLock<Option<Schema>>,
    update_lock: Mutex<()>,
}

impl CsvDataContext {
    pub fn new(resource: Arc<dyn Resource>, config: CsvConfiguration) -> Self {
        Self {
            resource,
            config,
            schema: RwLock::new(None),
            update_lock: Mutex::new(()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FileResource::new(path)), CsvConfiguration::default())
    }

    pub fn resource(&self) -> &Arc<dyn Resource> {
        &self.resource
    }

    pub fn configuration(&self) -> &CsvConfiguration {
        &self.config
    }

    fn schema_name(&self) -> String {
        self.resource.name()
    }

    fn table_name(&self) -> String {
        let name = self.resource.name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => name[..dot].to_string(),
            _ => name,
        }
    }

    fn records(&self) -> Result<RecordReader> {
        Ok(RecordReader::new(
            self.resource.read()?,
            &self.config,
            self.resource.qualified_path(),
        ))
    }

    fn load_schema(&self) -> Result<Schema> {
        let mut schema = Schema::new(self.schema_name());
        if !self.resource.is_exists() {
            return Ok(schema);
        }
        let table = read_table(
            self.resource.read()?,
            &self.config,
            &self.table_name(),
            &self.resource.qualified_path(),
        )?;
        if let Some(table) = table {
            debug!(
                resource = %self.resource.qualified_path(),
                columns = table.column_count(),
                "Loaded CSV schema"
            );
            schema.add_table(table)?;
        }
        Ok(schema)
    }

    fn current_schema(&self) -> Result<Schema> {
        if let Some(schema) = self.schema.read().as_ref() {
            return Ok(schema.clone());
        }
        let schema = self.load_schema()?;
        *self.schema.write() = Some(schema.clone());
        Ok(schema)
    }

    fn current_table(&self, name: &str) -> Result<Table> {
        self.current_schema()?
            .table_by_name(name)
            .cloned()
            .ok_or_else(|| MetaQueryError::TableNotFound(name.to_string()))
    }

    /// Positions a record reader on the first data record.
    fn data_records(&self) -> Result<RecordReader> {
        let mut records = self.records()?;
        if self.config.has_header() {
            records.skip_lines(self.config.column_name_line() - 1)?;
            records.next_record()?;
        }
        Ok(records)
    }

    /// Reads the whole resource into a store for an update script.
    fn snapshot(&self) -> Result<MemoryStore> {
        let schema = self.current_schema()?;
        let mut store = MemoryStore::new(schema.name());
        if let Some(table) = schema.tables().first() {
            let rows = CsvRows::new(self.data_records()?, table, table.columns(), &self.config, None)?
                .collect::<Result<Vec<_>>>()?;
            store.add_table(table.clone(), rows)?;
        }
        Ok(store)
    }

    fn write_back(&self, store: &MemoryStore) -> Result<()> {
        let writer = CsvWriter::new(&self.config);
        match store.schema().tables().first() {
            Some(table) => {
                let rows = store.rows(table.name())?;
                self.resource
                    .write(&mut |out| writer.write_table(out, table, &rows))
            }
            None => self.resource.write(&mut |_| Ok(())),
        }
    }
}

impl DataContext for CsvDataContext {
    fn schema_names(&self) -> Result<Vec<String>> {
        Ok(vec![self.schema_name()])
    }

    fn schema_by_name(&self, name: &str) -> Result<Option<Schema>> {
        if !name.eq_ignore_ascii_case(&self.schema_name()) {
            return Ok(None);
        }
        self.current_schema().map(Some)
    }

    fn default_schema_name(&self) -> Result<String> {
        Ok(self.schema_name())
    }

    fn materialize_table(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> Result<DataSet> {
        let current = self.current_table(table.name())?;
        let rows = CsvRows::new(self.data_records()?, &current, columns, &self.config, max_rows)?;
        let header = columns.iter().cloned().map(SelectItem::column).collect();
        Ok(DataSet::new(header, rows))
    }

    fn refresh_schemas(&self) -> Result<()> {
        *self.schema.write() = None;
        Ok(())
    }
}

impl UpdateableDataContext for CsvDataContext {
    fn execute_update(&self, script: &mut dyn UpdateScript) -> Result<()> {
        if self.resource.is_read_only() {
            return Err(MetaQueryError::unsupported(format!(
                "Resource is read only: {}",
                self.resource.qualified_path()
            )));
        }
        let _guard = self.update_lock.lock();
        let mut store = self.snapshot()?;
        if let Err(e) = script.run(&mut CsvUpdateCallback { store: &mut store }) {
            debug!(error = %e, "Update script failed, resource left unchanged");
            return Err(e);
        }
        let written = self.write_back(&store);
        *self.schema.write() = None;
        if let Err(e) = &written {
            warn!(resource = %self.resource.qualified_path(), error = %e, "Could not write CSV resource");
        }
        written
    }
}

/// Update callback over the in-memory copy of a CSV resource.
struct CsvUpdateCallback<'s> {
    store: &'s mut MemoryStore,
}

impl UpdateCallback for CsvUpdateCallback<'_> {
    fn schema_names(&self) -> Vec<String> {
        vec![self.store.schema().name().to_string()]
    }

    fn schema(&self, name: &str) -> Option<Schema> {
        let schema = self.store.schema();
        schema.name().eq_ignore_ascii_case(name).then(|| schema.clone())
    }

    fn default_schema_name(&self) -> String {
        self.store.schema().name().to_string()
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
        if self.store.schema().table_count() > 0 {
            return Err(MetaQueryError::unsupported(
                "A CSV resource can hold only one table",
            ));
        }
        self.store.create_table(&create)
    }

    fn apply_drop_table(&mut self, drop: DropTableStatement) -> Result<()> {
        self.store.drop_table(&drop)
    }
}
