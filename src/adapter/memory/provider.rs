use std::collections::HashMap;

use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::schema::{Column, ColumnType, Table};

/// Name, column names and column types of an in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTableDef {
    name: String,
    columns: Vec<String>,
    types: Vec<ColumnType>,
}

impl SimpleTableDef {
    /// A table whose columns are all VARCHAR.
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            types: vec![ColumnType::Varchar; columns.len()],
        }
    }

    pub fn with_types(mut self, types: &[ColumnType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn to_table(&self) -> Result<Table> {
        if self.types.len() != self.columns.len() {
            return Err(MetaQueryError::SchemaMismatch(format!(
                "Table '{}' has {} columns but {} column types",
                self.name,
                self.columns.len(),
                self.types.len()
            )));
        }
        let mut table = Table::new(self.name.clone());
        for (name, column_type) in self.columns.iter().zip(&self.types) {
            table.add_column(Column::new(name.clone(), *column_type))?;
        }
        Ok(table)
    }
}

/// Supplies the definition and initial rows of one in-memory table. Rows
/// hold values in definition column order.
pub trait TableDataProvider: Send + Sync {
    fn table_def(&self) -> &SimpleTableDef;

    fn rows(&self) -> Result<Vec<Vec<Value>>>;
}

/// Rows given as value tuples.
#[derive(Debug, Clone)]
pub struct ArrayTableDataProvider {
    def: SimpleTableDef,
    rows: Vec<Vec<Value>>,
}

impl ArrayTableDataProvider {
    pub fn new(def: SimpleTableDef, rows: Vec<Vec<Value>>) -> Self {
        Self { def, rows }
    }
}

impl TableDataProvider for ArrayTableDataProvider {
    fn table_def(&self) -> &SimpleTableDef {
        &self.def
    }

    fn rows(&self) -> Result<Vec<Vec<Value>>> {
        let width = self.def.columns.len();
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() > width {
                    return Err(MetaQueryError::SchemaMismatch(format!(
                        "Row {} of '{}' has {} values, expected at most {}",
                        i,
                        self.def.name,
                        row.len(),
                        width
                    )));
                }
                let mut values = row.clone();
                values.resize(width, Value::Null);
                Ok(values)
            })
            .collect()
    }
}

/// Rows given as column-name to value maps. Missing keys read as NULL.
#[derive(Debug, Clone)]
pub struct MapTableDataProvider {
    def: SimpleTableDef,
    rows: Vec<HashMap<String, Value>>,
}

impl MapTableDataProvider {
    pub fn new(def: SimpleTableDef, rows: Vec<HashMap<String, Value>>) -> Self {
        Self { def, rows }
    }
}

impl TableDataProvider for MapTableDataProvider {
    fn table_def(&self) -> &SimpleTableDef {
        &self.def
    }

    fn rows(&self) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .rows
            .iter()
            .map(|row| {
                self.def
                    .columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }
}

/// A typed record that can be exposed as a table row.
pub trait TableRecord: Send + Sync {
    /// Column names and types, in row order.
    fn columns() -> Vec<(&'static str, ColumnType)>
    where
        Self: Sized;

    fn values(&self) -> Vec<Value>;
}

/// Rows given as typed records; the table definition comes from
/// [`TableRecord::columns`].
pub struct ObjectTableDataProvider<T: TableRecord> {
    def: SimpleTableDef,
    records: Vec<T>,
}

impl<T: TableRecord> ObjectTableDataProvider<T> {
    pub fn new(name: impl Into<String>, records: Vec<T>) -> Self {
        let columns = T::columns();
        let names: Vec<&str> = columns.iter().map(|(n, _)| *n).collect();
        let types: Vec<ColumnType> = columns.iter().map(|(_, t)| *t).collect();
        Self {
            def: SimpleTableDef::new(name, &names).with_types(&types),
            records,
        }
    }
}

impl<T: TableRecord> TableDataProvider for ObjectTableDataProvider<T> {
    fn table_def(&self) -> &SimpleTableDef {
        &self.def
    }

    fn rows(&self) -> Result<Vec<Vec<Value>>> {
        let width = self.def.columns.len();
        self.records
            .iter()
            .map(|record| {
                let values = record.values();
                if values.len() != width {
                    return Err(MetaQueryError::SchemaMismatch(format!(
                        "Record of '{}' has {} values, expected {}",
                        self.def.name,
                        values.len(),
                        width
                    )));
                }
                Ok(values)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        name: &'static str,
        age: i64,
    }

    impl TableRecord for Person {
        fn columns() -> Vec<(&'static str, ColumnType)> {
            vec![("name", ColumnType::Varchar), ("age", ColumnType::Integer)]
        }

        fn values(&self) -> Vec<Value> {
            vec![Value::from(self.name), Value::from(self.age)]
        }
    }

    #[test]
    fn test_object_provider() {
        let provider = ObjectTableDataProvider::new(
            "person",
            vec![Person { name: "kasper", age: 30 }],
        );
        let table = provider.table_def().to_table().unwrap();
        assert_eq!(table.column_names(), vec!["name", "age"]);
        assert_eq!(table.columns()[1].column_type, ColumnType::Integer);
        assert_eq!(
            provider.rows().unwrap(),
            vec![vec![Value::from("kasper"), Value::from(30)]]
        );
    }

    #[test]
    fn test_map_provider_fills_missing() {
        let def = SimpleTableDef::new("t", &["a", "b"]);
        let mut row = HashMap::new();
        row.insert("b".to_string(), Value::from(2));
        let provider = MapTableDataProvider::new(def, vec![row]);
        assert_eq!(provider.rows().unwrap(), vec![vec![Value::Null, Value::from(2)]]);
    }

    #[test]
    fn test_def_type_mismatch() {
        let def = SimpleTableDef::new("t", &["a", "b"]).with_types(&[ColumnType::Integer]);
        assert!(matches!(def.to_table(), Err(MetaQueryError::SchemaMismatch(_))));
    }
}
