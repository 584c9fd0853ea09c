use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::FilterItem;
use crate::schema::{Column, Table};

/// Values for a subset of a table's columns. A column is *set* when it holds
/// a non-null value or was explicitly set to NULL; unset columns are left out
/// of the generated statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RowValues {
    columns: Vec<Column>,
    values: Vec<Value>,
    explicit_nulls: Vec<bool>,
}

impl RowValues {
    pub fn new(columns: Vec<Column>) -> Self {
        let n = columns.len();
        Self {
            columns,
            values: vec![Value::Null; n],
            explicit_nulls: vec![false; n],
        }
    }

    /// Builds values from parallel lists; `explicit_nulls[i]` marks a NULL
    /// at `i` as deliberately set.
    pub fn from_parts(columns: Vec<Column>, values: Vec<Value>, explicit_nulls: Vec<bool>) -> Result<Self> {
        if values.len() != columns.len() || explicit_nulls.len() != columns.len() {
            return Err(MetaQueryError::construction(format!(
                "Expected {} values and null flags, got {} and {}",
                columns.len(),
                values.len(),
                explicit_nulls.len()
            )));
        }
        Ok(Self {
            columns,
            values,
            explicit_nulls,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        if index >= self.columns.len() {
            return Err(MetaQueryError::ColumnNotFound(format!("#{}", index)));
        }
        self.explicit_nulls[index] = value.is_null();
        self.values[index] = value;
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| MetaQueryError::ColumnNotFound(name.to_string()))?;
        self.set(index, value)
    }

    pub fn is_set(&self, index: usize) -> bool {
        !self.values[index].is_null() || self.explicit_nulls[index]
    }

    /// The set columns with their values, in column order.
    pub fn assignments(&self) -> impl Iterator<Item = (&Column, &Value)> {
        (0..self.columns.len())
            .filter(move |&i| self.is_set(i))
            .map(move |i| (&self.columns[i], &self.values[i]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: Table,
    pub values: RowValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: Table,
    pub values: RowValues,
    pub where_items: Vec<FilterItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: Table,
    pub where_items: Vec<FilterItem>,
}

/// `table` carries the schema name and the new columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub table: Table,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn columns() -> Vec<Column> {
        ["c1", "c2", "c3"]
            .iter()
            .map(|n| Column::new(*n, ColumnType::Integer))
            .collect()
    }

    #[test]
    fn test_explicit_nulls() {
        let values = RowValues::from_parts(
            columns(),
            vec![Value::Null, Value::from(5), Value::Null],
            vec![false, false, true],
        )
        .unwrap();
        let set: Vec<(&str, Value)> = values
            .assignments()
            .map(|(c, v)| (c.name.as_str(), v.clone()))
            .collect();
        assert_eq!(set, vec![("c2", Value::from(5)), ("c3", Value::Null)]);
    }

    #[test]
    fn test_set_by_name() {
        let mut values = RowValues::new(columns());
        values.set_by_name("C1", Value::Null).unwrap();
        assert!(values.is_set(0));
        assert!(!values.is_set(1));
        assert!(values.set_by_name("nope", Value::from(1)).is_err());
    }
}
