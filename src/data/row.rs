use std::fmt;
use std::sync::Arc;

use crate::query::SelectItem;
use crate::schema::Column;

use super::Value;

/// An immutable tuple of values together with the select items that
/// produced them. `values[i]` belongs to `select_items()[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    header: Arc<[SelectItem]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(header: Arc<[SelectItem]>, values: Vec<Value>) -> Self {
        Self { header, values }
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.header
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of `item` in the header: an exact match first, then a match
    /// that ignores aliases.
    pub fn index_of(&self, item: &SelectItem) -> Option<usize> {
        self.header
            .iter()
            .position(|h| h == item)
            .or_else(|| self.header.iter().position(|h| h.equals_ignore_alias(item)))
    }

    pub fn value_of(&self, item: &SelectItem) -> Option<&Value> {
        self.index_of(item).and_then(|i| self.values.get(i))
    }

    pub fn value_by_column(&self, column: &Column) -> Option<&Value> {
        self.header
            .iter()
            .position(|h| h.source_column().is_some_and(|c| c.same_as(column)) && !h.is_function())
            .and_then(|i| self.values.get(i))
    }

    /// Looks a value up by alias or column name.
    pub fn value_by_label(&self, label: &str) -> Option<&Value> {
        self.header
            .iter()
            .position(|h| h.label().eq_ignore_ascii_case(label))
            .and_then(|i| self.values.get(i))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row[values=[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, Table};

    fn header() -> (Table, Arc<[SelectItem]>) {
        let mut table = Table::new("bar");
        table.add_column(Column::new("col1", ColumnType::Varchar)).unwrap();
        table.add_column(Column::new("col2", ColumnType::Integer)).unwrap();
        let items: Vec<SelectItem> = table
            .columns()
            .iter()
            .map(|c| SelectItem::column(c.clone()))
            .collect();
        (table, items.into())
    }

    #[test]
    fn test_row_lookup() {
        let (table, header) = header();
        let row = Row::new(header, vec![Value::from("2"), Value::from(1000)]);
        let col2 = table.column_by_name("col2").unwrap();
        assert_eq!(row.value_by_column(col2), Some(&Value::Integer(1000)));
        assert_eq!(
            row.value_of(&SelectItem::column(col2.clone()).with_alias("c")),
            Some(&Value::Integer(1000))
        );
        assert_eq!(row.value_by_label("COL1"), Some(&Value::from("2")));
    }

    #[test]
    fn test_row_display() {
        let (_, header) = header();
        let row = Row::new(header, vec![Value::Null, Value::from(1000)]);
        assert_eq!(row.to_string(), "Row[values=[null, 1000]]");
    }
}
