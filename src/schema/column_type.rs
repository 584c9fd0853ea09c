use std::fmt;

use crate::data::value::{parse_boolean, parse_date, parse_time, parse_timestamp, Value, ValueKind};
use crate::error::{MetaQueryError, Result};

/// The coarse bucket every [`ColumnType`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuperColumnType {
    Number,
    Literal,
    Boolean,
    Binary,
    Time,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Numeric,
    Float,
    Double,
    Real,
    Char,
    Varchar,
    LongVarchar,
    Clob,
    Binary,
    Varbinary,
    Blob,
    Date,
    Time,
    Timestamp,
    Other,
    Null,
}

impl ColumnType {
    pub fn super_type(&self) -> SuperColumnType {
        match self {
            ColumnType::Boolean | ColumnType::Bit => SuperColumnType::Boolean,
            ColumnType::TinyInt
            | ColumnType::SmallInt
            | ColumnType::Integer
            | ColumnType::BigInt
            | ColumnType::Decimal
            | ColumnType::Numeric
            | ColumnType::Float
            | ColumnType::Double
            | ColumnType::Real => SuperColumnType::Number,
            ColumnType::Char | ColumnType::Varchar | ColumnType::LongVarchar | ColumnType::Clob => {
                SuperColumnType::Literal
            }
            ColumnType::Binary | ColumnType::Varbinary | ColumnType::Blob => SuperColumnType::Binary,
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp => SuperColumnType::Time,
            ColumnType::Other | ColumnType::Null => SuperColumnType::Other,
        }
    }

    /// The value representation columns of this type prefer. `None` for
    /// `OTHER` and `NULL`, which accept any value unchanged.
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            ColumnType::Boolean | ColumnType::Bit => Some(ValueKind::Boolean),
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => {
                Some(ValueKind::Integer)
            }
            ColumnType::Decimal
            | ColumnType::Numeric
            | ColumnType::Float
            | ColumnType::Double
            | ColumnType::Real => Some(ValueKind::Float),
            ColumnType::Char | ColumnType::Varchar | ColumnType::LongVarchar | ColumnType::Clob => {
                Some(ValueKind::String)
            }
            ColumnType::Binary | ColumnType::Varbinary | ColumnType::Blob => Some(ValueKind::Binary),
            ColumnType::Date => Some(ValueKind::Date),
            ColumnType::Time => Some(ValueKind::Time),
            ColumnType::Timestamp => Some(ValueKind::Timestamp),
            ColumnType::Other | ColumnType::Null => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.super_type() == SuperColumnType::Number
    }

    pub fn is_literal(&self) -> bool {
        self.super_type() == SuperColumnType::Literal
    }

    pub fn is_time_based(&self) -> bool {
        self.super_type() == SuperColumnType::Time
    }

    /// The type a value naturally maps to, used when a table is created from
    /// sample data.
    pub fn for_value(value: &Value) -> ColumnType {
        match value.kind() {
            ValueKind::Null => ColumnType::Other,
            ValueKind::Boolean => ColumnType::Boolean,
            ValueKind::Integer => ColumnType::BigInt,
            ValueKind::Float => ColumnType::Double,
            ValueKind::String => ColumnType::Varchar,
            ValueKind::Binary => ColumnType::Blob,
            ValueKind::Date => ColumnType::Date,
            ValueKind::Time => ColumnType::Time,
            ValueKind::Timestamp => ColumnType::Timestamp,
        }
    }

    /// Maps a back-end's native type name (e.g. `VARCHAR(255)`, `INT8`,
    /// `DATETIME`) onto the closest column type.
    pub fn from_native(native: &str) -> ColumnType {
        let upper = native.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "" => ColumnType::Other,
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "BIT" => ColumnType::Bit,
            "TINYINT" => ColumnType::TinyInt,
            "SMALLINT" | "INT2" => ColumnType::SmallInt,
            "BIGINT" | "INT8" | "LONG" => ColumnType::BigInt,
            "DECIMAL" | "MONEY" => ColumnType::Decimal,
            "NUMERIC" | "NUMBER" => ColumnType::Numeric,
            "FLOAT" => ColumnType::Float,
            "DOUBLE" | "DOUBLE PRECISION" => ColumnType::Double,
            "REAL" => ColumnType::Real,
            "CHAR" | "CHARACTER" | "NCHAR" => ColumnType::Char,
            "LONGVARCHAR" => ColumnType::LongVarchar,
            "CLOB" | "TEXT" => ColumnType::Clob,
            "BINARY" => ColumnType::Binary,
            "VARBINARY" => ColumnType::Varbinary,
            "BLOB" | "BYTEA" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "TIME" => ColumnType::Time,
            "TIMESTAMP" | "DATETIME" => ColumnType::Timestamp,
            "NULL" => ColumnType::Null,
            other => {
                if other.contains("INT") {
                    ColumnType::Integer
                } else if other.contains("CHAR") || other.contains("STRING") {
                    ColumnType::Varchar
                } else if other.contains("BOOL") {
                    ColumnType::Boolean
                } else if other.contains("TIMESTAMP") || other.contains("DATETIME") {
                    ColumnType::Timestamp
                } else if other.contains("REAL") || other.contains("FLOA") || other.contains("DOUB") {
                    ColumnType::Double
                } else if other.contains("BLOB") || other.contains("BINARY") {
                    ColumnType::Blob
                } else {
                    ColumnType::Other
                }
            }
        }
    }

    /// Coerces a value to this type's preferred representation.
    pub fn convert(&self, value: Value) -> Result<Value> {
        let kind = match self.value_kind() {
            Some(kind) => kind,
            None => return Ok(value),
        };
        if value.is_null() || value.kind() == kind {
            return Ok(value);
        }
        let fail = |value: &Value| MetaQueryError::ValueConversion {
            value: value.to_string(),
            target: *self,
        };
        let converted = match (kind, &value) {
            (ValueKind::Integer, Value::Float(f)) if f.fract() == 0.0 => Some(Value::Integer(*f as i64)),
            (ValueKind::Integer, Value::Boolean(b)) => Some(Value::Integer(*b as i64)),
            (ValueKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (ValueKind::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            (ValueKind::Float, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (ValueKind::Boolean, Value::Integer(i)) => Some(Value::Boolean(*i != 0)),
            (ValueKind::Boolean, Value::String(s)) => parse_boolean(s).map(Value::Boolean),
            (ValueKind::String, Value::Binary(bytes)) => {
                String::from_utf8(bytes.clone()).ok().map(Value::String)
            }
            (ValueKind::String, other) => Some(Value::String(other.to_string())),
            (ValueKind::Binary, Value::String(s)) => Some(Value::Binary(s.clone().into_bytes())),
            (ValueKind::Date, Value::Timestamp(ts)) => Some(Value::Date(ts.date())),
            (ValueKind::Date, Value::String(s)) => parse_date(s).map(Value::Date),
            (ValueKind::Time, Value::Timestamp(ts)) => Some(Value::Time(ts.time())),
            (ValueKind::Time, Value::String(s)) => parse_time(s).map(Value::Time),
            (ValueKind::Timestamp, Value::Date(_)) => value.as_timestamp().map(Value::Timestamp),
            (ValueKind::Timestamp, Value::String(s)) => parse_timestamp(s).map(Value::Timestamp),
            _ => None,
        };
        converted.ok_or_else(|| fail(&value))
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Bit => "BIT",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Real => "REAL",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::LongVarchar => "LONGVARCHAR",
            ColumnType::Clob => "CLOB",
            ColumnType::Binary => "BINARY",
            ColumnType::Varbinary => "VARBINARY",
            ColumnType::Blob => "BLOB",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Other => "OTHER",
            ColumnType::Null => "NULL",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native() {
        assert_eq!(ColumnType::from_native("VARCHAR(255)"), ColumnType::Varchar);
        assert_eq!(ColumnType::from_native("integer"), ColumnType::Integer);
        assert_eq!(ColumnType::from_native("UNSIGNED BIG INT"), ColumnType::Integer);
        assert_eq!(ColumnType::from_native("DATETIME"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_native("NVARCHAR(10)"), ColumnType::Varchar);
        assert_eq!(ColumnType::from_native(""), ColumnType::Other);
    }

    #[test]
    fn test_super_type() {
        assert_eq!(ColumnType::BigInt.super_type(), SuperColumnType::Number);
        assert_eq!(ColumnType::Clob.super_type(), SuperColumnType::Literal);
        assert_eq!(ColumnType::Timestamp.super_type(), SuperColumnType::Time);
        assert_eq!(ColumnType::Bit.value_kind(), Some(ValueKind::Boolean));
        assert_eq!(ColumnType::Other.value_kind(), None);
    }

    #[test]
    fn test_convert() {
        assert_eq!(
            ColumnType::Integer.convert(Value::from(" 42")).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            ColumnType::Boolean.convert(Value::from("false")).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            ColumnType::Varchar.convert(Value::Integer(7)).unwrap(),
            Value::from("7")
        );
        assert!(matches!(
            ColumnType::Timestamp.convert(Value::from("2013-01-04 00:00:00")),
            Ok(Value::Timestamp(_))
        ));
        assert!(ColumnType::Integer.convert(Value::Null).unwrap().is_null());

        let err = ColumnType::Integer.convert(Value::from("abc")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert abc to INTEGER");
    }
}
