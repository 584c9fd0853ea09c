pub mod builder;
pub mod filter;
pub mod from_item;
pub mod parser;
pub mod select_item;
pub mod statement;

pub use builder::{FilterBuilder, ItemRef, QueryBuilder, TableRef, WhereClause};
pub use filter::{FilterItem, LogicalOperator, Operand, OperatorType};
pub use from_item::{FromItem, JoinType};
pub use select_item::{AggregateFunction, ScalarFunction, SelectExpr, SelectItem};
pub use statement::{Direction, OrderByItem, Query};

use crate::data::Value;

/// Renders a value as an ANSI SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{:.1}", f)
            } else {
                f.to_string()
            }
        }
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Binary(_) => format!("X'{}'", value),
        Value::Date(_) => format!("DATE '{}'", value),
        Value::Time(_) => format!("TIME '{}'", value),
        Value::Timestamp(_) => format!("TIMESTAMP '{}'", value),
    }
}
