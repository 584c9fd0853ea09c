use std::fmt;

use crate::data::Value;
use crate::error::{MetaQueryError, Result};

use super::{sql_literal, SelectItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Equals,
    DifferentFrom,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl OperatorType {
    pub fn sql(&self) -> &'static str {
        match self {
            OperatorType::Equals => "=",
            OperatorType::DifferentFrom => "<>",
            OperatorType::LessThan => "<",
            OperatorType::LessThanOrEqual => "<=",
            OperatorType::GreaterThan => ">",
            OperatorType::GreaterThanOrEqual => ">=",
            OperatorType::Like => "LIKE",
            OperatorType::NotLike => "NOT LIKE",
            OperatorType::In => "IN",
            OperatorType::NotIn => "NOT IN",
            OperatorType::IsNull => "IS NULL",
            OperatorType::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn takes_operand(&self) -> bool {
        !matches!(self, OperatorType::IsNull | OperatorType::IsNotNull)
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, OperatorType::In | OperatorType::NotIn)
    }

    /// The operator satisfied exactly when this one is false, under
    /// three-valued logic.
    pub fn negated(&self) -> OperatorType {
        match self {
            OperatorType::Equals => OperatorType::DifferentFrom,
            OperatorType::DifferentFrom => OperatorType::Equals,
            OperatorType::LessThan => OperatorType::GreaterThanOrEqual,
            OperatorType::LessThanOrEqual => OperatorType::GreaterThan,
            OperatorType::GreaterThan => OperatorType::LessThanOrEqual,
            OperatorType::GreaterThanOrEqual => OperatorType::LessThan,
            OperatorType::Like => OperatorType::NotLike,
            OperatorType::NotLike => OperatorType::Like,
            OperatorType::In => OperatorType::NotIn,
            OperatorType::NotIn => OperatorType::In,
            OperatorType::IsNull => OperatorType::IsNotNull,
            OperatorType::IsNotNull => OperatorType::IsNull,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Right-hand side of an atomic filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Value(Value),
    List(Vec<Value>),
    Item(SelectItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterItem {
    Atomic {
        item: SelectItem,
        operator: OperatorType,
        operand: Operand,
    },
    Compound {
        logic: LogicalOperator,
        children: Vec<FilterItem>,
    },
    /// Raw predicate text, only usable against SQL back-ends.
    Expression(String),
}

impl FilterItem {
    pub fn new(item: SelectItem, operator: OperatorType, operand: impl Into<Value>) -> Self {
        FilterItem::Atomic {
            item,
            operator,
            operand: Operand::Value(operand.into()),
        }
    }

    pub fn compare_items(item: SelectItem, operator: OperatorType, other: SelectItem) -> Self {
        FilterItem::Atomic {
            item,
            operator,
            operand: Operand::Item(other),
        }
    }

    pub fn in_list(item: SelectItem, values: Vec<Value>) -> Self {
        FilterItem::Atomic {
            item,
            operator: OperatorType::In,
            operand: Operand::List(values),
        }
    }

    pub fn is_null(item: SelectItem) -> Self {
        FilterItem::Atomic {
            item,
            operator: OperatorType::IsNull,
            operand: Operand::None,
        }
    }

    pub fn is_not_null(item: SelectItem) -> Self {
        FilterItem::Atomic {
            item,
            operator: OperatorType::IsNotNull,
            operand: Operand::None,
        }
    }

    pub fn and(children: Vec<FilterItem>) -> Self {
        FilterItem::Compound {
            logic: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterItem>) -> Self {
        FilterItem::Compound {
            logic: LogicalOperator::Or,
            children,
        }
    }

    /// True for atomic filters comparing against a value (or list of values)
    /// with an operator other than IS [NOT] NULL; only these are bound as
    /// statement parameters.
    pub fn is_prepared_parameter_candidate(&self) -> bool {
        match self {
            FilterItem::Atomic {
                operator, operand, ..
            } => {
                operator.takes_operand() && matches!(operand, Operand::Value(_) | Operand::List(_))
            }
            _ => false,
        }
    }

    /// Whether any atomic filter in the tree tests an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            FilterItem::Atomic { item, operand, .. } => {
                item.is_aggregate() || matches!(operand, Operand::Item(other) if other.is_aggregate())
            }
            FilterItem::Compound { children, .. } => children.iter().any(|c| c.contains_aggregate()),
            FilterItem::Expression(_) => false,
        }
    }

    /// Visits every select item referenced by the filter tree.
    pub fn for_each_item<'a>(&'a self, f: &mut dyn FnMut(&'a SelectItem)) {
        match self {
            FilterItem::Atomic { item, operand, .. } => {
                f(item);
                if let Operand::Item(other) = operand {
                    f(other);
                }
            }
            FilterItem::Compound { children, .. } => {
                for child in children {
                    child.for_each_item(f);
                }
            }
            FilterItem::Expression(_) => {}
        }
    }

    /// The logical negation, pushed down to the atomic filters.
    pub fn negate(self) -> FilterItem {
        match self {
            FilterItem::Atomic {
                item,
                operator,
                operand,
            } => FilterItem::Atomic {
                item,
                operator: operator.negated(),
                operand,
            },
            FilterItem::Compound { logic, children } => FilterItem::Compound {
                logic: match logic {
                    LogicalOperator::And => LogicalOperator::Or,
                    LogicalOperator::Or => LogicalOperator::And,
                },
                children: children.into_iter().map(FilterItem::negate).collect(),
            },
            FilterItem::Expression(text) => FilterItem::Expression(format!("NOT ({})", text)),
        }
    }
}

impl fmt::Display for FilterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterItem::Atomic {
                item,
                operator,
                operand,
            } => {
                write!(f, "{} {}", item.expression_sql(true), operator.sql())?;
                match operand {
                    Operand::None => Ok(()),
                    Operand::Value(v) => write!(f, " {}", sql_literal(v)),
                    Operand::List(values) => {
                        let values: Vec<String> = values.iter().map(sql_literal).collect();
                        write!(f, " ({})", values.join(", "))
                    }
                    Operand::Item(other) => write!(f, " {}", other.expression_sql(true)),
                }
            }
            FilterItem::Compound { logic, children } => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", logic.sql())))
            }
            FilterItem::Expression(text) => write!(f, "{}", text),
        }
    }
}

/// Converts a comparison operand to the type of the item it is compared
/// with, so that `id = '3'` against an INTEGER column compares numbers.
pub(crate) fn coerce_operand(item: &SelectItem, operator: OperatorType, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    if matches!(operator, OperatorType::Like | OperatorType::NotLike) {
        return Ok(match value {
            Value::String(_) => value,
            other => Value::String(other.to_string()),
        });
    }
    match item.expected_type() {
        Some(column_type) => column_type.convert(value.clone()).map_err(|_| {
            MetaQueryError::construction(format!(
                "Incompatible types in comparison: {} {} {}",
                item.expression_sql(true),
                operator.sql(),
                sql_literal(&value)
            ))
        }),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};

    fn item(name: &str) -> SelectItem {
        SelectItem::column(Column::new(name, ColumnType::Integer))
    }

    #[test]
    fn test_prepared_parameter_candidates() {
        assert!(FilterItem::new(item("a"), OperatorType::Equals, 1).is_prepared_parameter_candidate());
        assert!(FilterItem::in_list(item("a"), vec![Value::from(1)]).is_prepared_parameter_candidate());
        assert!(!FilterItem::is_null(item("a")).is_prepared_parameter_candidate());
        assert!(!FilterItem::compare_items(item("a"), OperatorType::Equals, item("b"))
            .is_prepared_parameter_candidate());
    }

    #[test]
    fn test_display() {
        let filter = FilterItem::or(vec![
            FilterItem::new(item("a"), OperatorType::GreaterThan, 1),
            FilterItem::is_null(item("b")),
        ]);
        assert_eq!(filter.to_string(), "(a > 1 OR b IS NULL)");
        let filter = FilterItem::in_list(item("a"), vec![Value::from(1), Value::from("x")]);
        assert_eq!(filter.to_string(), "a IN (1, 'x')");
    }

    #[test]
    fn test_negate() {
        let filter = FilterItem::and(vec![
            FilterItem::new(item("a"), OperatorType::LessThan, 1),
            FilterItem::is_null(item("b")),
        ])
        .negate();
        assert_eq!(filter.to_string(), "(a >= 1 OR b IS NOT NULL)");
    }
}
