pub mod column;
pub mod column_type;
pub mod table;

pub use column::Column;
pub use column_type::{ColumnType, SuperColumnType};
pub use table::{Table, TableType};

use crate::error::{MetaQueryError, Result};

/// A named, ordered collection of tables.
///
/// Lookups match exactly first and then, unless the schema is case
/// sensitive, ignoring case. Storage always preserves the original casing.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    tables: Vec<Table>,
    case_sensitive: bool,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            case_sensitive: false,
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name() == name).or_else(|| {
            if self.case_sensitive {
                None
            } else {
                self.tables.iter().position(|t| t.name().eq_ignore_ascii_case(name))
            }
        })
    }

    pub fn add_table(&mut self, mut table: Table) -> Result<()> {
        if self.position(table.name()).is_some() {
            return Err(MetaQueryError::TableAlreadyExists(table.name().to_string()));
        }
        table.set_schema_name(&self.name);
        self.tables.push(table);
        Ok(())
    }

    pub fn remove_table(&mut self, name: &str) -> Result<Table> {
        let index = self
            .position(name)
            .ok_or_else(|| MetaQueryError::TableNotFound(name.to_string()))?;
        Ok(self.tables.remove(index))
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.position(name).map(|i| &self.tables[i])
    }

    pub fn table_by_name_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.position(name).map(move |i| &mut self.tables[i])
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut schema = Schema::new("foo");
        schema.add_table(Table::new("bar")).unwrap();
        assert_eq!(schema.table_by_name("BAR").unwrap().qualified_label(), "foo.bar");
        assert!(matches!(
            schema.add_table(Table::new("Bar")),
            Err(MetaQueryError::TableAlreadyExists(_))
        ));
    }

    #[test]
    fn test_case_sensitive() {
        let mut schema = Schema::new("s").with_case_sensitive(true);
        schema.add_table(Table::new("Bar")).unwrap();
        schema.add_table(Table::new("bar")).unwrap();
        assert_eq!(schema.table_count(), 2);
        assert!(schema.table_by_name("BAR").is_none());
    }

    #[test]
    fn test_remove_table() {
        let mut schema = Schema::new("s");
        schema.add_table(Table::new("t")).unwrap();
        let removed = schema.remove_table("T").unwrap();
        assert_eq!(removed.name(), "t");
        assert_eq!(schema.table_count(), 0);
        assert!(matches!(
            schema.remove_table("t"),
            Err(MetaQueryError::TableNotFound(_))
        ));
    }
}
