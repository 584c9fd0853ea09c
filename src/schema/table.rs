use crate::error::{MetaQueryError, Result};

use super::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableType {
    #[default]
    Table,
    View,
    SystemTable,
    Alias,
    Other,
}

impl TableType {
    pub fn from_native(native: &str) -> TableType {
        match native.to_lowercase().as_str() {
            "table" => TableType::Table,
            "view" => TableType::View,
            "system table" => TableType::SystemTable,
            "alias" | "synonym" => TableType::Alias,
            _ => TableType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: String,
    table_type: TableType,
    columns: Vec<Column>,
    remarks: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: String::new(),
            table_type: TableType::Table,
            columns: Vec::new(),
            remarks: None,
        }
    }

    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub(crate) fn set_schema_name(&mut self, schema: &str) {
        self.schema = schema.to_string();
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    /// Appends a column, fixing up its number and owning table.
    pub fn add_column(&mut self, mut column: Column) -> Result<()> {
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(MetaQueryError::SchemaMismatch(format!(
                "Column '{}' already exists in table '{}'",
                column.name, self.name
            )));
        }
        column.number = self.columns.len();
        column.table = self.name.clone();
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| MetaQueryError::ColumnNotFound(format!("{}.{}", self.name, name)))?;
        let removed = self.columns.remove(index);
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.number = i;
        }
        Ok(removed)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Exact match first, then a case-insensitive one.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_by_name(name).map(|c| c.number)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Key columns in key order.
    pub fn primary_keys(&self) -> Vec<&Column> {
        let mut keys: Vec<&Column> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        keys.sort_by_key(|c| c.primary_key);
        keys
    }

    /// `schema.table`
    pub fn qualified_label(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn sample() -> Table {
        let mut table = Table::new("product");
        table
            .add_column(Column::new("id", ColumnType::Integer).with_primary_key(1))
            .unwrap();
        table.add_column(Column::new("name", ColumnType::Varchar)).unwrap();
        table.add_column(Column::new("version", ColumnType::Integer)).unwrap();
        table
    }

    #[test]
    fn test_column_numbers_match_positions() {
        let mut table = sample();
        for (i, column) in table.columns().iter().enumerate() {
            assert_eq!(column.number, i);
            assert_eq!(column.table, "product");
        }
        table.remove_column("name").unwrap();
        assert_eq!(table.column_names(), vec!["id", "version"]);
        assert_eq!(table.column_by_name("version").unwrap().number, 1);
    }

    #[test]
    fn test_duplicate_column() {
        let mut table = sample();
        let err = table.add_column(Column::new("id", ColumnType::Integer)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_lookup() {
        let table = sample();
        assert_eq!(table.column_index("NAME"), Some(1));
        assert!(table.column_by_name("missing").is_none());
        assert_eq!(table.primary_keys().len(), 1);
        assert_eq!(TableType::from_native("VIEW"), TableType::View);
    }

    #[test]
    fn test_primary_keys_follow_key_order() {
        let mut table = Table::new("link");
        table.add_column(Column::new("a", ColumnType::Integer).with_primary_key(2)).unwrap();
        table.add_column(Column::new("note", ColumnType::Varchar)).unwrap();
        table.add_column(Column::new("b", ColumnType::Integer).with_primary_key(1)).unwrap();
        let keys: Vec<&str> = table.primary_keys().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
