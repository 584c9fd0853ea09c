use std::fmt;

use super::ColumnType;

/// A column of a [`Table`](super::Table).
///
/// The owning table is held by name rather than by reference so schema
/// snapshots stay plain values that can be cloned for DDL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub number: usize,
    pub column_type: ColumnType,
    pub native_type: Option<String>,
    pub size: Option<u32>,
    /// Position within the table's primary key, starting at 1.
    pub primary_key: Option<usize>,
    pub nullable: Option<bool>,
    pub table: String,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            number: 0,
            column_type,
            native_type: None,
            size: None,
            primary_key: None,
            nullable: None,
            table: String::new(),
        }
    }

    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_primary_key(mut self, position: usize) -> Self {
        self.primary_key = Some(position);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// `table.column`
    pub fn qualified_label(&self) -> String {
        if self.table.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.table, self.name)
        }
    }

    /// Whether both handles denote the same column of the same table,
    /// regardless of the metadata snapshot they were taken from.
    pub fn same_as(&self, other: &Column) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.table.eq_ignore_ascii_case(&other.table)
    }
}

fn or_null<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Column[name={},columnNumber={},type={},nullable={},nativeType={},columnSize={}]",
            self.name,
            self.number,
            self.column_type,
            or_null(&self.nullable),
            or_null(&self.native_type),
            or_null(&self.size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_display() {
        let column = Column::new("id", ColumnType::Integer)
            .with_native_type("LONG")
            .with_size(4);
        assert_eq!(
            column.to_string(),
            "Column[name=id,columnNumber=0,type=INTEGER,nullable=null,nativeType=LONG,columnSize=4]"
        );
    }

    #[test]
    fn test_same_as() {
        let mut a = Column::new("name", ColumnType::Varchar);
        a.table = "developer".into();
        let mut b = Column::new("NAME", ColumnType::Clob);
        b.table = "Developer".into();
        assert!(a.same_as(&b));
        assert_eq!(a.qualified_label(), "developer.name");
    }
}
