//! Tables held in process memory.

mod provider;
pub(crate) mod store;

pub use provider::{
    ArrayTableDataProvider, MapTableDataProvider, ObjectTableDataProvider, SimpleTableDef,
    TableDataProvider, TableRecord,
};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::adapter::{DataContext, UpdateableDataContext};
use crate::data::DataSet;
use crate::error::Result;
use crate::schema::{Column, Schema, Table};
use crate::update::UpdateScript;

use store::{MemoryStore, StoreUpdateCallback};

/// A writable data context over one schema of in-memory tables.
///
/// Update scripts run against a snapshot of the store which replaces the
/// live one only when the script succeeds. Scripts are serialized; queries
/// never wait for them.
pub struct MemoryDataContext {
    store: RwLock<MemoryStore>,
    update_lock: Mutex<()>,
}

impl MemoryDataContext {
    pub fn new(schema_name: &str, providers: Vec<Box<dyn TableDataProvider>>) -> Result<Self> {
        let mut store = MemoryStore::new(schema_name);
        for provider in providers {
            let table = provider.table_def().to_table()?;
            store.add_table(table, provider.rows()?)?;
        }
        Ok(Self::from_store(store))
    }

    /// A context with an empty schema, to be filled through update scripts.
    pub fn empty(schema_name: &str) -> Self {
        Self::from_store(MemoryStore::new(schema_name))
    }

    pub(crate) fn from_store(store: MemoryStore) -> Self {
        Self {
            store: RwLock::new(store),
            update_lock: Mutex::new(()),
        }
    }

    pub fn schema(&self) -> Schema {
        self.store.read().schema().clone()
    }
}

impl DataContext for MemoryDataContext {
    fn schema_names(&self) -> Result<Vec<String>> {
        Ok(vec![self.store.read().schema().name().to_string()])
    }

    fn schema_by_name(&self, name: &str) -> Result<Option<Schema>> {
        let store = self.store.read();
        Ok(store
            .schema()
            .name()
            .eq_ignore_ascii_case(name)
            .then(|| store.schema().clone()))
    }

    fn default_schema_name(&self) -> Result<String> {
        Ok(self.store.read().schema().name().to_string())
    }

    fn materialize_table(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> Result<DataSet> {
        self.store.read().materialize(table, columns, max_rows)
    }
}

impl UpdateableDataContext for MemoryDataContext {
    fn execute_update(&self, script: &mut dyn UpdateScript) -> Result<()> {
        let _guard = self.update_lock.lock();
        let mut snapshot = self.store.read().clone();
        let result = script.run(&mut StoreUpdateCallback::new(&mut snapshot));
        match result {
            Ok(()) => {
                *self.store.write() = snapshot;
                debug!(schema = %self.store.read().schema().name(), "Update script committed");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Update script failed, changes discarded");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DataContextExt, UpdateableDataContextExt};
    use crate::data::Value;
    use crate::error::MetaQueryError;
    use crate::query::WhereClause;
    use crate::schema::ColumnType;
    use crate::update::UpdateCallbackExt;

    fn context() -> MemoryDataContext {
        let def = SimpleTableDef::new("t", &["id", "name"])
            .with_types(&[ColumnType::Integer, ColumnType::Varchar]);
        let rows = vec![
            vec![Value::from(1), Value::from("a")],
            vec![Value::from(2), Value::from("b")],
        ];
        MemoryDataContext::new("s", vec![Box::new(ArrayTableDataProvider::new(def, rows))]).unwrap()
    }

    #[test]
    fn test_failed_script_leaves_no_trace() {
        let dc = context();
        let err = dc
            .execute_update_with(|cb| {
                cb.delete_from("t").execute()?;
                cb.insert_into("t").value("id", "not a number").execute()
            })
            .unwrap_err();
        assert!(matches!(err, MetaQueryError::ValueConversion { .. }));
        let rows = dc.query().from("t").select("id").execute().unwrap().to_values().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_open_data_set_keeps_old_snapshot() {
        let dc = context();
        let mut ds = dc.query().from("t").select("name").execute().unwrap();
        dc.execute_update_with(|cb| cb.delete_from("t").where_("id").eq(2).execute())
            .unwrap();
        let mut seen = Vec::new();
        while ds.next().unwrap() {
            seen.push(ds.row().unwrap().values()[0].clone());
        }
        assert_eq!(seen, vec![Value::from("a"), Value::from("b")]);
        let rows = dc.execute_sql("SELECT name FROM t").unwrap().to_values().unwrap();
        assert_eq!(rows, vec![vec![Value::from("a")]]);
    }
}
