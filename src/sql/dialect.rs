use std::fmt;

use crate::data::Value;
use crate::query::sql_literal;
use crate::schema::{Column, ColumnType};

/// How a dialect expresses `first_row` / `max_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    OffsetFetch,
    /// `LIMIT m OFFSET n`
    LimitOffset,
    /// `LIMIT n, m`
    MySqlLimit,
    /// `SELECT TOP m`
    Top,
    /// `SELECT * FROM (...) WHERE ROWNUM <= m`
    RowNum,
    /// `OFFSET n ROWS FETCH FIRST m ROWS ONLY`
    FetchFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStyle {
    Operator,
    Function,
    Plus,
}

/// How unquoted identifiers are folded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCase {
    Preserve,
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Ansi,
    Sqlite,
    PostgreSql,
    H2,
    MySql,
    SqlServer,
    Oracle,
    Db2,
}

const RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "CURRENT", "DATE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE",
    "END", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "IN",
    "INDEX", "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "ROWS", "SELECT",
    "SET", "TABLE", "THEN", "TIME", "TIMESTAMP", "TO", "TOP", "TRUE", "UNION", "UNIQUE", "UPDATE",
    "USER", "VALUES", "WHEN", "WHERE", "WITH",
];

impl Dialect {
    pub const ALL: [Dialect; 8] = [
        Dialect::Ansi,
        Dialect::Sqlite,
        Dialect::PostgreSql,
        Dialect::H2,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::Oracle,
        Dialect::Db2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Ansi => "ansi",
            Dialect::Sqlite => "sqlite",
            Dialect::PostgreSql => "postgresql",
            Dialect::H2 => "h2",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
            Dialect::Oracle => "oracle",
            Dialect::Db2 => "db2",
        }
    }

    pub fn limit_style(&self) -> LimitStyle {
        match self {
            Dialect::Ansi => LimitStyle::OffsetFetch,
            Dialect::Sqlite | Dialect::PostgreSql | Dialect::H2 => LimitStyle::LimitOffset,
            Dialect::MySql => LimitStyle::MySqlLimit,
            Dialect::SqlServer => LimitStyle::Top,
            Dialect::Oracle => LimitStyle::RowNum,
            Dialect::Db2 => LimitStyle::FetchFirst,
        }
    }

    /// Whether `first_row` can be rendered; otherwise callers skip rows
    /// themselves.
    pub fn supports_first_row(&self) -> bool {
        !matches!(self.limit_style(), LimitStyle::Top | LimitStyle::RowNum)
    }

    pub fn supports_full_join(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    pub fn supports_boolean_literals(&self) -> bool {
        !matches!(self, Dialect::SqlServer | Dialect::Oracle | Dialect::Db2)
    }

    pub fn concat_style(&self) -> ConcatStyle {
        match self {
            Dialect::MySql => ConcatStyle::Function,
            Dialect::SqlServer => ConcatStyle::Plus,
            _ => ConcatStyle::Operator,
        }
    }

    pub fn identifier_case(&self) -> IdentifierCase {
        match self {
            Dialect::Oracle | Dialect::Db2 | Dialect::H2 => IdentifierCase::Upper,
            Dialect::PostgreSql => IdentifierCase::Lower,
            _ => IdentifierCase::Preserve,
        }
    }

    fn quotes(&self) -> (char, char) {
        match self {
            Dialect::MySql => ('`', '`'),
            Dialect::SqlServer => ('[', ']'),
            _ => ('"', '"'),
        }
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        RESERVED_WORDS.iter().any(|r| r.eq_ignore_ascii_case(word))
    }

    /// Quotes an identifier when it has non-word characters, is reserved, or
    /// would be changed by the engine's case folding.
    pub fn quote(&self, identifier: &str) -> String {
        let plain = !identifier.is_empty()
            && identifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !identifier.starts_with(|c: char| c.is_ascii_digit());
        let folded = match self.identifier_case() {
            IdentifierCase::Preserve => true,
            IdentifierCase::Upper => identifier == identifier.to_uppercase(),
            IdentifierCase::Lower => identifier == identifier.to_lowercase(),
        };
        if plain && folded && !self.is_reserved(identifier) {
            return identifier.to_string();
        }
        let (open, close) = self.quotes();
        let escaped = identifier.replace(close, &format!("{}{}", close, close));
        format!("{}{}{}", open, escaped, close)
    }

    /// Renders a value inline, in the dialect's literal syntax.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Boolean(b) if !self.supports_boolean_literals() => {
                if *b { "1".into() } else { "0".into() }
            }
            Value::String(s) if *self == Dialect::MySql => {
                format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
            }
            Value::Binary(bytes) if *self == Dialect::PostgreSql => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                format!("decode('{}', 'hex')", hex)
            }
            Value::Date(d) => match self {
                Dialect::Oracle => format!("TO_DATE('{}', 'YYYY-MM-DD')", d.format("%Y-%m-%d")),
                Dialect::Sqlite | Dialect::SqlServer => format!("'{}'", d.format("%Y-%m-%d")),
                _ => sql_literal(value),
            },
            Value::Time(t) => match self {
                Dialect::Oracle => format!("TO_DATE('{}', 'HH24:MI:SS')", t.format("%H:%M:%S")),
                Dialect::Sqlite | Dialect::SqlServer => format!("'{}'", value),
                _ => sql_literal(value),
            },
            Value::Timestamp(ts) => match self {
                Dialect::Oracle => format!(
                    "TO_TIMESTAMP('{}', 'YYYY-MM-DD HH24:MI:SS.FF')",
                    ts.format("%Y-%m-%d %H:%M:%S%.f")
                ),
                Dialect::Sqlite | Dialect::SqlServer => format!("'{}'", value),
                _ => sql_literal(value),
            },
            _ => sql_literal(value),
        }
    }

    /// The form a value takes when bound as a statement parameter.
    pub fn parameter(&self, value: &Value) -> Value {
        match value {
            Value::Boolean(b) if !self.supports_boolean_literals() => Value::Integer(*b as i64),
            other => other.clone(),
        }
    }

    /// Column type for `CREATE TABLE`. An explicit native type wins.
    pub fn type_name(&self, column: &Column) -> String {
        if let Some(native) = &column.native_type {
            return native.clone();
        }
        let size = column.size;
        let sized = |name: &str, default: Option<u32>| match size.or(default) {
            Some(n) => format!("{}({})", name, n),
            None => name.to_string(),
        };
        let varchar_default = match self {
            Dialect::Sqlite | Dialect::PostgreSql => None,
            _ => Some(255),
        };
        match (self, column.column_type) {
            (Dialect::Sqlite, ColumnType::Other | ColumnType::Null) => String::new(),
            (_, ColumnType::Other | ColumnType::Null) => sized("VARCHAR", varchar_default),

            (Dialect::PostgreSql, ColumnType::Double) => "DOUBLE PRECISION".into(),
            (Dialect::PostgreSql, ColumnType::TinyInt) => "SMALLINT".into(),
            (Dialect::PostgreSql, ColumnType::Clob | ColumnType::LongVarchar) => "TEXT".into(),
            (Dialect::PostgreSql, ColumnType::Binary | ColumnType::Varbinary | ColumnType::Blob) => {
                "BYTEA".into()
            }

            (Dialect::MySql, ColumnType::Clob | ColumnType::LongVarchar) => "LONGTEXT".into(),
            (Dialect::MySql, ColumnType::Blob) => "LONGBLOB".into(),

            (Dialect::SqlServer, ColumnType::Boolean) => "BIT".into(),
            (Dialect::SqlServer, ColumnType::Timestamp) => "DATETIME2".into(),
            (Dialect::SqlServer, ColumnType::Double) => "FLOAT".into(),
            (Dialect::SqlServer, ColumnType::Clob | ColumnType::LongVarchar) => "NVARCHAR(MAX)".into(),
            (Dialect::SqlServer, ColumnType::Blob) => "VARBINARY(MAX)".into(),

            (Dialect::Oracle, ColumnType::Varchar | ColumnType::LongVarchar) => {
                sized("VARCHAR2", Some(255))
            }
            (Dialect::Oracle, ColumnType::Boolean | ColumnType::Bit) => "NUMBER(1)".into(),
            (
                Dialect::Oracle,
                ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt,
            ) => "NUMBER".into(),
            (Dialect::Oracle, ColumnType::Double | ColumnType::Float | ColumnType::Real) => {
                "BINARY_DOUBLE".into()
            }
            (Dialect::Oracle, ColumnType::Time) => "DATE".into(),

            (Dialect::Db2, ColumnType::Boolean | ColumnType::Bit) => "SMALLINT".into(),
            (Dialect::Db2, ColumnType::TinyInt) => "SMALLINT".into(),

            (_, ColumnType::Varchar) => sized("VARCHAR", varchar_default),
            (_, ColumnType::Char) => sized("CHAR", Some(1)),
            (_, ColumnType::Decimal | ColumnType::Numeric) => match size {
                Some(n) => format!("{}({})", column.column_type.sql_name(), n),
                None => column.column_type.sql_name().to_string(),
            },
            (_, other) => other.sql_name().to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_quoting() {
        assert_eq!(Dialect::Ansi.quote("col1"), "col1");
        assert_eq!(Dialect::Ansi.quote("yo!"), "\"yo!\"");
        assert_eq!(Dialect::Ansi.quote("order"), "\"order\"");
        assert_eq!(Dialect::MySql.quote("my col"), "`my col`");
        assert_eq!(Dialect::SqlServer.quote("select"), "[select]");
        assert_eq!(Dialect::Oracle.quote("name"), "\"name\"");
        assert_eq!(Dialect::Oracle.quote("NAME"), "NAME");
        assert_eq!(Dialect::PostgreSql.quote("Name"), "\"Name\"");
        assert_eq!(Dialect::Ansi.quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_literals() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
        assert_eq!(Dialect::Ansi.literal(&date), "DATE '2020-01-31'");
        assert_eq!(Dialect::Sqlite.literal(&date), "'2020-01-31'");
        assert_eq!(Dialect::Oracle.literal(&date), "TO_DATE('2020-01-31', 'YYYY-MM-DD')");
        assert_eq!(Dialect::SqlServer.literal(&Value::Boolean(true)), "1");
        assert_eq!(Dialect::PostgreSql.literal(&Value::Boolean(false)), "FALSE");
        assert_eq!(Dialect::MySql.literal(&Value::from("a\\b")), "'a\\\\b'");
    }

    #[test]
    fn test_type_names() {
        let name = Column::new("name", ColumnType::Varchar);
        assert_eq!(Dialect::Sqlite.type_name(&name), "VARCHAR");
        assert_eq!(Dialect::MySql.type_name(&name), "VARCHAR(255)");
        assert_eq!(Dialect::Oracle.type_name(&name.clone().with_size(40)), "VARCHAR2(40)");
        let flag = Column::new("flag", ColumnType::Boolean);
        assert_eq!(Dialect::SqlServer.type_name(&flag), "BIT");
        assert_eq!(Dialect::PostgreSql.type_name(&flag), "BOOLEAN");
        let native = Column::new("x", ColumnType::Integer).with_native_type("SERIAL");
        assert_eq!(Dialect::PostgreSql.type_name(&native), "SERIAL");
    }
}
