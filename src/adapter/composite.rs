use tracing::debug;

use crate::adapter::DataContext;
use crate::data::DataSet;
use crate::engine::{self, NullOrdering};
use crate::error::{MetaQueryError, Result};
use crate::query::Query;
use crate::schema::{Column, Schema, Table};

/// Presents several data contexts as one.
///
/// A query whose tables all live in one delegate is handed to that delegate
/// whole, so a SQL back-end still gets push-down. Anything spanning
/// delegates runs in memory on top of each delegate's tables. Schema names
/// are looked up in delegate order; the first delegate's default schema is
/// the default.
pub struct CompositeDataContext {
    delegates: Vec<Box<dyn DataContext>>,
}

impl CompositeDataContext {
    pub fn new(delegates: Vec<Box<dyn DataContext>>) -> Result<Self> {
        if delegates.is_empty() {
            return Err(MetaQueryError::construction(
                "A composite data context needs at least one delegate",
            ));
        }
        Ok(Self { delegates })
    }

    pub fn delegates(&self) -> &[Box<dyn DataContext>] {
        &self.delegates
    }

    fn delegate_of(&self, schema_name: &str) -> Result<Option<&dyn DataContext>> {
        Ok(self
            .delegate_index(schema_name)?
            .map(|i| self.delegates[i].as_ref()))
    }

    /// The one delegate holding every table the query reads, if any.
    fn single_delegate(&self, query: &Query) -> Result<Option<usize>> {
        let mut owner = None;
        for table in query.from.iter().flat_map(|f| f.tables()) {
            let index = self.delegate_index(table.schema_name())?;
            match (owner, index) {
                (_, None) => return Ok(None),
                (None, found) => owner = found,
                (Some(current), Some(found)) if current != found => return Ok(None),
                _ => {}
            }
        }
        Ok(owner)
    }

    fn delegate_index(&self, schema_name: &str) -> Result<Option<usize>> {
        for (i, delegate) in self.delegates.iter().enumerate() {
            if delegate
                .schema_names()?
                .iter()
                .any(|name| name.eq_ignore_ascii_case(schema_name))
            {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

impl DataContext for CompositeDataContext {
    fn schema_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for delegate in &self.delegates {
            for name in delegate.schema_names()? {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn schema_by_name(&self, name: &str) -> Result<Option<Schema>> {
        match self.delegate_of(name)? {
            Some(delegate) => delegate.schema_by_name(name),
            None => Ok(None),
        }
    }

    fn default_schema_name(&self) -> Result<String> {
        match self.delegates.first() {
            Some(first) => first.default_schema_name(),
            None => Err(MetaQueryError::InvalidState("No delegates".into())),
        }
    }

    fn materialize_table(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> Result<DataSet> {
        let delegate = self
            .delegate_of(table.schema_name())?
            .ok_or_else(|| MetaQueryError::SchemaNotFound(table.schema_name().to_string()))?;
        delegate.materialize_table(table, columns, max_rows)
    }

    fn execute_query(&self, query: &Query) -> Result<DataSet> {
        match self.single_delegate(query)? {
            Some(index) => self.delegates[index].execute_query(query),
            None => {
                debug!("Query spans several data contexts, evaluating in memory");
                engine::execute(self, query)
            }
        }
    }

    fn null_ordering(&self) -> NullOrdering {
        self.delegates
            .first()
            .map(|d| d.null_ordering())
            .unwrap_or_default()
    }

    fn refresh_schemas(&self) -> Result<()> {
        for delegate in &self.delegates {
            delegate.refresh_schemas()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ArrayTableDataProvider, DataContextExt, MemoryDataContext, SimpleTableDef};
    use crate::data::Value;
    use crate::schema::ColumnType;

    fn memory(schema: &str, table: &str, rows: Vec<Vec<Value>>) -> Box<dyn DataContext> {
        let def = SimpleTableDef::new(table, &["id", "label"])
            .with_types(&[ColumnType::Integer, ColumnType::Varchar]);
        Box::new(
            MemoryDataContext::new(schema, vec![Box::new(ArrayTableDataProvider::new(def, rows))])
                .unwrap(),
        )
    }

    fn composite() -> CompositeDataContext {
        CompositeDataContext::new(vec![
            memory("a", "left_t", vec![vec![Value::from(1), Value::from("x")], vec![Value::from(2), Value::from("y")]]),
            memory("b", "right_t", vec![vec![Value::from(2), Value::from("z")]]),
        ])
        .unwrap()
    }

    #[test]
    fn test_schemas_are_merged() {
        let dc = composite();
        assert_eq!(dc.schema_names().unwrap(), vec!["a", "b"]);
        assert_eq!(dc.default_schema_name().unwrap(), "a");
        assert_eq!(dc.table_by_qualified_label("right_t").unwrap().qualified_label(), "b.right_t");
    }

    #[test]
    fn test_join_across_delegates() {
        let dc = composite();
        let rows = dc
            .execute_sql("SELECT l.label, r.label FROM a.left_t l JOIN b.right_t r ON l.id = r.id")
            .unwrap()
            .to_values()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("y"), Value::from("z")]]);
    }

    #[test]
    fn test_empty_composite_rejected() {
        assert!(CompositeDataContext::new(Vec::new()).is_err());
    }
}
