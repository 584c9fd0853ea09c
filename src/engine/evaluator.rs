use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::{
    FilterItem, LogicalOperator, Operand, OperatorType, ScalarFunction, SelectExpr, SelectItem,
};

/// Three-valued logic truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::True
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

/// The select items describing the values of rows flowing between stages.
#[derive(Debug, Clone, Default)]
pub struct RowLayout {
    items: Vec<SelectItem>,
}

impl RowLayout {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn concat(&self, other: &RowLayout) -> RowLayout {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        RowLayout { items }
    }

    /// Exact match, then ignoring aliases, then the same column of the same
    /// table taken from another metadata snapshot.
    pub fn index_of(&self, item: &SelectItem) -> Option<usize> {
        if let Some(i) = self.items.iter().position(|i| i == item) {
            return Some(i);
        }
        if let Some(i) = self.items.iter().position(|i| i.equals_ignore_alias(item)) {
            return Some(i);
        }
        let column = match &item.expr {
            SelectExpr::Column(c) => c,
            _ => return None,
        };
        self.items.iter().position(|candidate| match &candidate.expr {
            SelectExpr::Column(other) => {
                other.same_as(column)
                    && match (&candidate.from, &item.from) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        _ => true,
                    }
            }
            _ => false,
        })
    }
}

/// A select item resolved against a layout.
#[derive(Debug, Clone)]
pub enum CompiledItem {
    Index(usize),
    Literal(Value),
    Scalar(ScalarFunction, Vec<CompiledItem>),
}

impl CompiledItem {
    pub fn eval(&self, row: &[Value]) -> Result<Value> {
        match self {
            CompiledItem::Index(i) => row.get(*i).cloned().ok_or_else(|| {
                MetaQueryError::InvalidState(format!("Row has no value at index {}", i))
            }),
            CompiledItem::Literal(v) => Ok(v.clone()),
            CompiledItem::Scalar(function, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(apply_scalar(*function, values))
            }
        }
    }
}

pub fn compile_item(item: &SelectItem, layout: &RowLayout) -> Result<CompiledItem> {
    if let Some(i) = layout.index_of(item) {
        return Ok(CompiledItem::Index(i));
    }
    match &item.expr {
        SelectExpr::Literal(v) => Ok(CompiledItem::Literal(v.clone())),
        SelectExpr::Scalar { function, args } => {
            function.check_arity(args.len())?;
            let args = args
                .iter()
                .map(|a| compile_item(a, layout))
                .collect::<Result<Vec<_>>>()?;
            Ok(CompiledItem::Scalar(*function, args))
        }
        SelectExpr::Expression(text) => layout
            .items()
            .iter()
            .position(|i| i.label().eq_ignore_ascii_case(text))
            .map(CompiledItem::Index)
            .ok_or_else(|| {
                MetaQueryError::unsupported(format!(
                    "Expression '{}' cannot be evaluated in memory",
                    text
                ))
            }),
        _ => Err(MetaQueryError::construction(format!(
            "'{}' is not available at this point of the query",
            item.expression_sql(true)
        ))),
    }
}

fn apply_scalar(function: ScalarFunction, values: Vec<Value>) -> Value {
    if values.is_empty() || values.iter().any(Value::is_null) {
        return Value::Null;
    }
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let first = text(&values[0]);
    match function {
        ScalarFunction::Upper => Value::String(first.to_uppercase()),
        ScalarFunction::Lower => Value::String(first.to_lowercase()),
        ScalarFunction::Trim => Value::String(first.trim().to_string()),
        ScalarFunction::Length => Value::Integer(first.chars().count() as i64),
        ScalarFunction::Concat => Value::String(values.iter().map(text).collect()),
    }
}

#[derive(Debug, Clone)]
pub enum CompiledOperand {
    None,
    Value(Value),
    List(Vec<Value>),
    Item(CompiledItem),
}

/// A filter resolved against a layout.
#[derive(Debug, Clone)]
pub enum CompiledFilter {
    Atomic {
        left: CompiledItem,
        operator: OperatorType,
        operand: CompiledOperand,
    },
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
}

impl CompiledFilter {
    pub fn eval(&self, row: &[Value]) -> Result<Truth> {
        match self {
            CompiledFilter::Atomic {
                left,
                operator,
                operand,
            } => {
                let value = left.eval(row)?;
                Ok(match operand {
                    CompiledOperand::None => evaluate(*operator, &value, &Value::Null),
                    CompiledOperand::Value(v) => evaluate_against_literal(*operator, &value, v),
                    CompiledOperand::List(list) => match operator {
                        OperatorType::NotIn => in_list(&value, list).not(),
                        _ => in_list(&value, list),
                    },
                    CompiledOperand::Item(item) => evaluate(*operator, &value, &item.eval(row)?),
                })
            }
            CompiledFilter::And(children) => {
                let mut result = Truth::True;
                for child in children {
                    result = result.and(child.eval(row)?);
                    if result == Truth::False {
                        break;
                    }
                }
                Ok(result)
            }
            CompiledFilter::Or(children) => {
                let mut result = Truth::False;
                for child in children {
                    result = result.or(child.eval(row)?);
                    if result == Truth::True {
                        break;
                    }
                }
                Ok(result)
            }
        }
    }
}

pub fn compile_filter(filter: &FilterItem, layout: &RowLayout) -> Result<CompiledFilter> {
    match filter {
        FilterItem::Atomic {
            item,
            operator,
            operand,
        } => Ok(CompiledFilter::Atomic {
            left: compile_item(item, layout)?,
            operator: *operator,
            operand: match operand {
                Operand::None => CompiledOperand::None,
                Operand::Value(v) => CompiledOperand::Value(v.clone()),
                Operand::List(list) => CompiledOperand::List(list.clone()),
                Operand::Item(other) => CompiledOperand::Item(compile_item(other, layout)?),
            },
        }),
        FilterItem::Compound { logic, children } => {
            let children = children
                .iter()
                .map(|c| compile_filter(c, layout))
                .collect::<Result<Vec<_>>>()?;
            Ok(match logic {
                LogicalOperator::And => CompiledFilter::And(children),
                LogicalOperator::Or => CompiledFilter::Or(children),
            })
        }
        FilterItem::Expression(text) => Err(MetaQueryError::unsupported(format!(
            "Expression filter '{}' cannot be evaluated in memory",
            text
        ))),
    }
}

/// A literal NULL operand turns `=`/`<>` into `IS NULL`/`IS NOT NULL`, the
/// same rewrite SQL back-ends receive.
fn evaluate_against_literal(operator: OperatorType, value: &Value, literal: &Value) -> Truth {
    if literal.is_null() {
        match operator {
            OperatorType::Equals => return Truth::from_bool(value.is_null()),
            OperatorType::DifferentFrom => return Truth::from_bool(!value.is_null()),
            _ => {}
        }
    }
    evaluate(operator, value, literal)
}

/// Applies a binary (or null-test) operator under three-valued logic.
pub fn evaluate(operator: OperatorType, left: &Value, right: &Value) -> Truth {
    match operator {
        OperatorType::IsNull => return Truth::from_bool(left.is_null()),
        OperatorType::IsNotNull => return Truth::from_bool(!left.is_null()),
        _ => {}
    }
    if left.is_null() || right.is_null() {
        return Truth::Unknown;
    }
    match operator {
        OperatorType::Like | OperatorType::NotLike => {
            let text = match left {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let pattern = match right {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let matched = Truth::from_bool(like_match(&text, &pattern));
            if operator == OperatorType::Like {
                matched
            } else {
                matched.not()
            }
        }
        OperatorType::In => in_list(left, std::slice::from_ref(right)),
        OperatorType::NotIn => in_list(left, std::slice::from_ref(right)).not(),
        _ => {
            let ordering = left.compare(right);
            match (operator, ordering) {
                (OperatorType::Equals, o) => Truth::from_bool(o == Some(Ordering::Equal)),
                (OperatorType::DifferentFrom, o) => Truth::from_bool(o != Some(Ordering::Equal)),
                (_, None) => Truth::Unknown,
                (OperatorType::LessThan, Some(o)) => Truth::from_bool(o == Ordering::Less),
                (OperatorType::LessThanOrEqual, Some(o)) => Truth::from_bool(o != Ordering::Greater),
                (OperatorType::GreaterThan, Some(o)) => Truth::from_bool(o == Ordering::Greater),
                (OperatorType::GreaterThanOrEqual, Some(o)) => Truth::from_bool(o != Ordering::Less),
                _ => Truth::Unknown,
            }
        }
    }
}

/// `value IN (list)`: false for an empty list, UNKNOWN when nothing matches
/// but the value or a list element is NULL.
pub fn in_list(value: &Value, list: &[Value]) -> Truth {
    if list.is_empty() {
        return Truth::False;
    }
    if value.is_null() {
        return Truth::Unknown;
    }
    let mut saw_null = false;
    for element in list {
        match value.sql_equals(element) {
            Some(true) => return Truth::True,
            Some(false) => {}
            None => saw_null = true,
        }
    }
    if saw_null {
        Truth::Unknown
    } else {
        Truth::False
    }
}

/// Case-sensitive SQL LIKE: `%` matches any run, `_` a single character and
/// `\` escapes the next pattern character.
pub fn like_match(text: &str, pattern: &str) -> bool {
    like_match_impl(&mut text.chars().peekable(), &mut pattern.chars().peekable())
}

fn like_match_impl(text: &mut Peekable<Chars>, pattern: &mut Peekable<Chars>) -> bool {
    loop {
        match (pattern.peek().copied(), text.peek().copied()) {
            (None, None) => return true,
            (None, Some(_)) => return false,
            (Some('%'), _) => {
                pattern.next();
                while pattern.peek() == Some(&'%') {
                    pattern.next();
                }
                if pattern.peek().is_none() {
                    return true;
                }
                loop {
                    let mut pattern_clone = pattern.clone();
                    let mut text_clone = text.clone();
                    if like_match_impl(&mut text_clone, &mut pattern_clone) {
                        return true;
                    }
                    if text.next().is_none() {
                        return false;
                    }
                }
            }
            (Some('_'), Some(_)) => {
                pattern.next();
                text.next();
            }
            (Some('\\'), t) => {
                pattern.next();
                let literal = pattern.next().unwrap_or('\\');
                if t != Some(literal) {
                    return false;
                }
                text.next();
            }
            (Some(p), Some(t)) => {
                if p != t {
                    return false;
                }
                pattern.next();
                text.next();
            }
            (Some(_), None) => return false,
        }
    }
}
