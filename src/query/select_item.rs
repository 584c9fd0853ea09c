use std::fmt;

use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::schema::{Column, ColumnType};

use super::sql_literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::First => "FIRST",
            AggregateFunction::Last => "LAST",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "FIRST" => Some(AggregateFunction::First),
            "LAST" => Some(AggregateFunction::Last),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    Upper,
    Lower,
    Trim,
    Length,
    Concat,
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Upper => "UPPER",
            ScalarFunction::Lower => "LOWER",
            ScalarFunction::Trim => "TRIM",
            ScalarFunction::Length => "LENGTH",
            ScalarFunction::Concat => "CONCAT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "UPPER" | "UCASE" => Some(ScalarFunction::Upper),
            "LOWER" | "LCASE" => Some(ScalarFunction::Lower),
            "TRIM" => Some(ScalarFunction::Trim),
            "LENGTH" | "LEN" | "CHAR_LENGTH" => Some(ScalarFunction::Length),
            "CONCAT" => Some(ScalarFunction::Concat),
            _ => None,
        }
    }

    /// CONCAT takes one or more arguments, the others exactly one.
    pub fn check_arity(&self, count: usize) -> Result<()> {
        let ok = match self {
            ScalarFunction::Concat => count >= 1,
            _ => count == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(MetaQueryError::construction(format!(
                "{} does not take {} argument(s)",
                self.name(),
                count
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectExpr {
    Column(Column),
    /// `argument == None` is `COUNT(*)`.
    Aggregate {
        function: AggregateFunction,
        argument: Option<Box<SelectItem>>,
    },
    Scalar {
        function: ScalarFunction,
        args: Vec<SelectItem>,
    },
    Literal(Value),
    /// Free-form expression text passed through to SQL back-ends as is.
    Expression(String),
    /// An output item of a sub-query in the FROM clause.
    SubQueryRef(Box<SelectItem>),
}

/// A projection element. `from` names the from-item (alias or table name)
/// the item was resolved against, when it needs qualification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectItem {
    pub expr: SelectExpr,
    pub alias: Option<String>,
    pub from: Option<String>,
}

impl SelectItem {
    fn of(expr: SelectExpr) -> Self {
        Self {
            expr,
            alias: None,
            from: None,
        }
    }

    pub fn column(column: Column) -> Self {
        Self::of(SelectExpr::Column(column))
    }

    pub fn count_all() -> Self {
        Self::of(SelectExpr::Aggregate {
            function: AggregateFunction::Count,
            argument: None,
        })
    }

    pub fn aggregate(function: AggregateFunction, argument: SelectItem) -> Self {
        Self::of(SelectExpr::Aggregate {
            function,
            argument: Some(Box::new(argument)),
        })
    }

    pub fn scalar(function: ScalarFunction, args: Vec<SelectItem>) -> Self {
        Self::of(SelectExpr::Scalar { function, args })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::of(SelectExpr::Literal(value.into()))
    }

    pub fn expression(text: impl Into<String>) -> Self {
        Self::of(SelectExpr::Expression(text.into()))
    }

    pub fn sub_query_ref(inner: SelectItem, alias: impl Into<String>) -> Self {
        Self {
            expr: SelectExpr::SubQueryRef(Box::new(inner)),
            alias: None,
            from: Some(alias.into()),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// The column this item reads, looking through functions.
    pub fn source_column(&self) -> Option<&Column> {
        match &self.expr {
            SelectExpr::Column(c) => Some(c),
            SelectExpr::Aggregate {
                argument: Some(arg), ..
            } => arg.source_column(),
            SelectExpr::Scalar { args, .. } => args.iter().find_map(|a| a.source_column()),
            SelectExpr::SubQueryRef(inner) => inner.source_column(),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self.expr,
            SelectExpr::Aggregate { .. } | SelectExpr::Scalar { .. }
        )
    }

    /// Whether an aggregate appears anywhere in the item.
    pub fn is_aggregate(&self) -> bool {
        match &self.expr {
            SelectExpr::Aggregate { .. } => true,
            SelectExpr::Scalar { args, .. } => args.iter().any(|a| a.is_aggregate()),
            _ => false,
        }
    }

    pub fn is_count_all(&self) -> bool {
        matches!(
            self.expr,
            SelectExpr::Aggregate {
                function: AggregateFunction::Count,
                argument: None
            }
        )
    }

    pub fn equals_ignore_alias(&self, other: &SelectItem) -> bool {
        if self.expr != other.expr {
            return false;
        }
        match (&self.from, &other.from) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }

    /// The item's type where it can be determined without data.
    pub fn expected_type(&self) -> Option<ColumnType> {
        match &self.expr {
            SelectExpr::Column(c) => Some(c.column_type),
            SelectExpr::Aggregate { function, argument } => match function {
                AggregateFunction::Count => Some(ColumnType::BigInt),
                AggregateFunction::Sum | AggregateFunction::Avg => Some(ColumnType::Double),
                _ => argument.as_ref().and_then(|a| a.expected_type()),
            },
            SelectExpr::Scalar { function, .. } => match function {
                ScalarFunction::Length => Some(ColumnType::Integer),
                _ => Some(ColumnType::Varchar),
            },
            SelectExpr::Literal(v) => Some(ColumnType::for_value(v)),
            SelectExpr::SubQueryRef(inner) => inner.expected_type(),
            SelectExpr::Expression(_) => None,
        }
    }

    /// The name the item is presented under: its alias, else its expression.
    pub fn label(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            SelectExpr::Column(c) => c.name.clone(),
            SelectExpr::SubQueryRef(inner) => inner.label(),
            _ => self.expression_sql(false),
        }
    }

    /// The SQL of the expression itself, without the alias.
    pub fn expression_sql(&self, qualify: bool) -> String {
        match &self.expr {
            SelectExpr::Column(c) => self.qualified(&c.name, qualify),
            SelectExpr::Aggregate { function, argument } => match argument {
                Some(arg) => format!("{}({})", function.name(), arg.expression_sql(qualify)),
                None => format!("{}(*)", function.name()),
            },
            SelectExpr::Scalar { function, args } => {
                let args: Vec<String> = args.iter().map(|a| a.expression_sql(qualify)).collect();
                format!("{}({})", function.name(), args.join(", "))
            }
            SelectExpr::Literal(v) => sql_literal(v),
            SelectExpr::Expression(text) => text.clone(),
            SelectExpr::SubQueryRef(inner) => self.qualified(&inner.label(), qualify),
        }
    }

    fn qualified(&self, name: &str, qualify: bool) -> String {
        match &self.from {
            Some(from) if qualify => format!("{}.{}", from, name),
            _ => name.to_string(),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression_sql(true))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

impl From<Column> for SelectItem {
    fn from(column: Column) -> Self {
        SelectItem::column(column)
    }
}

impl From<&Column> for SelectItem {
    fn from(column: &Column) -> Self {
        SelectItem::column(column.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Column {
        let mut c = Column::new(name, ColumnType::Integer);
        c.table = "t".into();
        c
    }

    #[test]
    fn test_display() {
        let item = SelectItem::column(col("a")).with_from("t").with_alias("x");
        assert_eq!(item.to_string(), "t.a AS x");
        assert_eq!(SelectItem::count_all().to_string(), "COUNT(*)");
        let sum = SelectItem::aggregate(AggregateFunction::Sum, SelectItem::column(col("b")));
        assert_eq!(sum.to_string(), "SUM(b)");
        assert_eq!(SelectItem::literal("it's").to_string(), "'it''s'");
    }

    #[test]
    fn test_aggregate_detection() {
        let max = SelectItem::aggregate(AggregateFunction::Max, SelectItem::column(col("a")));
        assert!(max.is_aggregate());
        let upper = SelectItem::scalar(ScalarFunction::Upper, vec![max.clone()]);
        assert!(upper.is_aggregate());
        assert!(!SelectItem::column(col("a")).is_aggregate());
        assert_eq!(max.source_column().map(|c| c.name.as_str()), Some("a"));
        assert_eq!(max.expected_type(), Some(ColumnType::Integer));
    }

    #[test]
    fn test_equals_ignore_alias() {
        let a = SelectItem::column(col("a")).with_alias("x");
        let b = SelectItem::column(col("a"));
        assert_ne!(a, b);
        assert!(a.equals_ignore_alias(&b));
        assert_eq!(a.label(), "x");
        assert_eq!(b.label(), "a");
    }
}
