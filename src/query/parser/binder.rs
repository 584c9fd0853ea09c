use crate::data::value::{parse_date, parse_time, parse_timestamp};
use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::filter::coerce_operand;
use crate::query::{
    AggregateFunction, FilterItem, FromItem, JoinType, Operand, OperatorType, OrderByItem, Query,
    ScalarFunction, SelectItem,
};
use crate::schema::Table;

use super::syntax::*;

/// Resolves table names for the binder.
pub trait TableLookup {
    fn lookup_table(&self, schema: Option<&str>, name: &str) -> Result<Table>;
}

struct ScopeEntry {
    qualifier: Option<String>,
    table_name: Option<String>,
    items: Vec<SelectItem>,
}

impl ScopeEntry {
    fn answers_to(&self, name: &str) -> bool {
        self.qualifier.as_deref().is_some_and(|q| q.eq_ignore_ascii_case(name))
            || self.table_name.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(name))
    }

    fn find(&self, column: &str) -> Option<&SelectItem> {
        self.items
            .iter()
            .find(|i| i.label() == column)
            .or_else(|| self.items.iter().find(|i| i.label().eq_ignore_ascii_case(column)))
    }
}

/// The items visible to expressions of a query: the outputs of every leaf
/// from-item, each addressable by its qualifier.
pub struct Scope {
    entries: Vec<ScopeEntry>,
}

impl Scope {
    pub fn new(from: &[FromItem]) -> Self {
        let entries = from
            .iter()
            .flat_map(|f| f.leaves())
            .map(|leaf| ScopeEntry {
                qualifier: leaf.qualifier().map(str::to_string),
                table_name: match leaf {
                    FromItem::Table { table, .. } => Some(table.name().to_string()),
                    _ => None,
                },
                items: leaf.output_items(),
            })
            .collect();
        Self { entries }
    }

    pub fn all_items(&self) -> Vec<SelectItem> {
        self.entries.iter().flat_map(|e| e.items.iter().cloned()).collect()
    }

    pub fn items_of(&self, qualifier: &str) -> Result<Vec<SelectItem>> {
        self.entries
            .iter()
            .find(|e| e.answers_to(qualifier))
            .map(|e| e.items.clone())
            .ok_or_else(|| {
                MetaQueryError::construction(format!("No from item named '{}'", qualifier))
            })
    }

    pub fn resolve(&self, qualifier: Option<&str>, column: &str) -> Result<SelectItem> {
        if let Some(qualifier) = qualifier {
            let entry = self
                .entries
                .iter()
                .find(|e| e.answers_to(qualifier))
                .ok_or_else(|| {
                    MetaQueryError::construction(format!("No from item named '{}'", qualifier))
                })?;
            return entry.find(column).cloned().ok_or_else(|| {
                MetaQueryError::construction(format!(
                    "Could not resolve column '{}.{}'",
                    qualifier, column
                ))
            });
        }

        let matches: Vec<&SelectItem> = self.entries.iter().filter_map(|e| e.find(column)).collect();
        match matches.as_slice() {
            [] => Err(MetaQueryError::construction(format!(
                "Could not resolve column '{}'",
                column
            ))),
            [single] => Ok((*single).clone()),
            _ => Err(MetaQueryError::construction(format!(
                "Column reference '{}' is ambiguous",
                column
            ))),
        }
    }
}

pub struct Binder<'a, L: TableLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: TableLookup + ?Sized> Binder<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    pub fn bind_statement(&self, stmt: &SelectStatement) -> Result<Query> {
        let mut query = Query::new();
        query.distinct = stmt.distinct;
        for source in &stmt.from {
            query.from.push(self.bind_from(source)?);
        }
        let scope = Scope::new(&query.from);

        for column in &stmt.columns {
            match column {
                SelectColumn::AllColumns => {
                    if query.from.is_empty() {
                        return Err(MetaQueryError::construction("SELECT * requires a FROM clause"));
                    }
                    query.select.extend(scope.all_items());
                }
                SelectColumn::TableAllColumns(qualifier) => {
                    query.select.extend(scope.items_of(qualifier)?);
                }
                SelectColumn::Expr { expr, alias } => {
                    let mut item = bind_item(expr, &scope)?;
                    if alias.is_some() {
                        item.alias = alias.clone();
                    }
                    query.select.push(item);
                }
            }
        }

        if let Some(expr) = &stmt.where_clause {
            query.where_items.push(bind_filter(expr, &scope)?);
        }
        for expr in &stmt.group_by {
            query.group_by.push(bind_output_ref(expr, &query.select, &scope)?);
        }
        if let Some(expr) = &stmt.having {
            query.having.push(bind_filter(expr, &scope)?);
        }
        for order in &stmt.order_by {
            let item = bind_output_ref(&order.expr, &query.select, &scope)?;
            query.order_by.push(if order.ascending {
                OrderByItem::asc(item)
            } else {
                OrderByItem::desc(item)
            });
        }

        query.max_rows = stmt.limit.map(|n| n as usize);
        query.first_row = stmt.offset.filter(|o| *o > 0).map(|o| o as usize + 1);
        query.validate()?;
        Ok(query)
    }

    fn bind_from(&self, source: &FromSource) -> Result<FromItem> {
        match source {
            FromSource::Table(table_ref) => {
                let table = self
                    .lookup
                    .lookup_table(table_ref.schema.as_deref(), &table_ref.name)?;
                Ok(FromItem::Table {
                    table,
                    alias: table_ref.alias.clone(),
                })
            }
            FromSource::SubQuery { query, alias } => Ok(FromItem::SubQuery {
                query: Box::new(self.bind_statement(query)?),
                alias: alias.clone(),
            }),
            FromSource::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let left = self.bind_from(left)?;
                let right = self.bind_from(right)?;
                let scope = Scope::new(&[left.clone(), right.clone()]);
                let on = bind_filter(condition, &scope)?;
                let join_type = match join_type {
                    JoinKind::Inner => JoinType::Inner,
                    JoinKind::Left => JoinType::Left,
                    JoinKind::Right => JoinType::Right,
                    JoinKind::Full => JoinType::Full,
                };
                Ok(FromItem::join(left, right, join_type, on))
            }
        }
    }
}

/// ORDER BY and GROUP BY may also name a select item by alias or ordinal.
fn bind_output_ref(expr: &Expr, select: &[SelectItem], scope: &Scope) -> Result<SelectItem> {
    match expr {
        Expr::Integer(n) => {
            let index = usize::try_from(*n).ok().filter(|n| *n >= 1).ok_or_else(|| {
                MetaQueryError::construction(format!("Invalid select item ordinal {}", n))
            })?;
            select.get(index - 1).cloned().ok_or_else(|| {
                MetaQueryError::construction(format!("Select item ordinal {} out of range", n))
            })
        }
        Expr::Column(ColumnRef {
            table: None,
            column,
        }) => {
            if let Some(item) = select
                .iter()
                .find(|s| s.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(column)))
            {
                return Ok(item.clone());
            }
            bind_item(expr, scope)
        }
        _ => bind_item(expr, scope),
    }
}

pub fn literal_value(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Integer(i) => Ok(Value::Integer(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Temporal(kind, text) => {
            let value = match kind {
                TemporalKind::Date => parse_date(text).map(Value::Date),
                TemporalKind::Time => parse_time(text).map(Value::Time),
                TemporalKind::Timestamp => parse_timestamp(text).map(Value::Timestamp),
            };
            value.ok_or_else(|| {
                MetaQueryError::construction(format!("Invalid {:?} literal '{}'", kind, text))
            })
        }
        other => Err(MetaQueryError::construction(format!(
            "Expected a literal, found {:?}",
            other
        ))),
    }
}

pub fn bind_item(expr: &Expr, scope: &Scope) -> Result<SelectItem> {
    match expr {
        Expr::Column(ColumnRef { table, column }) => scope.resolve(table.as_deref(), column),
        Expr::Function {
            name,
            args,
            distinct,
        } => {
            if let Some(function) = AggregateFunction::from_name(name) {
                if *distinct {
                    return Err(MetaQueryError::construction(format!(
                        "{}(DISTINCT ...) is not supported",
                        function.name()
                    )));
                }
                return match args.as_slice() {
                    [Expr::Wildcard] if function == AggregateFunction::Count => {
                        Ok(SelectItem::count_all())
                    }
                    [arg] => Ok(SelectItem::aggregate(function, bind_item(arg, scope)?)),
                    _ => Err(MetaQueryError::construction(format!(
                        "{} takes exactly one argument",
                        function.name()
                    ))),
                };
            }
            let function = ScalarFunction::from_name(name).ok_or_else(|| {
                MetaQueryError::construction(format!("Unknown function '{}'", name))
            })?;
            function.check_arity(args.len())?;
            let args = args
                .iter()
                .map(|a| bind_item(a, scope))
                .collect::<Result<Vec<_>>>()?;
            Ok(SelectItem::scalar(function, args))
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Concat,
            right,
        } => {
            let mut args = Vec::new();
            for side in [left, right] {
                let item = bind_item(side, scope)?;
                match item.expr {
                    crate::query::SelectExpr::Scalar {
                        function: ScalarFunction::Concat,
                        args: inner,
                    } if item.alias.is_none() => args.extend(inner),
                    _ => args.push(item),
                }
            }
            Ok(SelectItem::scalar(ScalarFunction::Concat, args))
        }
        e if e.is_literal() => Ok(SelectItem::literal(literal_value(e)?)),
        other => Err(MetaQueryError::construction(format!(
            "Unsupported select expression {:?}",
            other
        ))),
    }
}

fn operator_of(op: BinaryOperator) -> Option<OperatorType> {
    match op {
        BinaryOperator::Eq => Some(OperatorType::Equals),
        BinaryOperator::NotEq => Some(OperatorType::DifferentFrom),
        BinaryOperator::Lt => Some(OperatorType::LessThan),
        BinaryOperator::LtEq => Some(OperatorType::LessThanOrEqual),
        BinaryOperator::Gt => Some(OperatorType::GreaterThan),
        BinaryOperator::GtEq => Some(OperatorType::GreaterThanOrEqual),
        _ => None,
    }
}

/// `1 < a` is `a > 1`.
fn mirrored(operator: OperatorType) -> OperatorType {
    match operator {
        OperatorType::LessThan => OperatorType::GreaterThan,
        OperatorType::LessThanOrEqual => OperatorType::GreaterThanOrEqual,
        OperatorType::GreaterThan => OperatorType::LessThan,
        OperatorType::GreaterThanOrEqual => OperatorType::LessThanOrEqual,
        other => other,
    }
}

fn typed(item: SelectItem, operator: OperatorType, value: Value) -> Result<FilterItem> {
    let value = coerce_operand(&item, operator, value)?;
    Ok(FilterItem::Atomic {
        item,
        operator,
        operand: Operand::Value(value),
    })
}

pub fn bind_filter(expr: &Expr, scope: &Scope) -> Result<FilterItem> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And | BinaryOperator::Or => {
                let mut children = Vec::new();
                for side in [left, right] {
                    match bind_filter(side, scope)? {
                        FilterItem::Compound {
                            logic,
                            children: inner,
                        } if (logic == crate::query::LogicalOperator::And)
                            == (*op == BinaryOperator::And) =>
                        {
                            children.extend(inner)
                        }
                        other => children.push(other),
                    }
                }
                Ok(if *op == BinaryOperator::And {
                    FilterItem::and(children)
                } else {
                    FilterItem::or(children)
                })
            }
            _ => {
                let operator = operator_of(*op).ok_or_else(|| {
                    MetaQueryError::construction(format!("{:?} is not a predicate", op))
                })?;
                match (left.is_literal(), right.is_literal()) {
                    (false, true) => typed(bind_item(left, scope)?, operator, literal_value(right)?),
                    (true, false) => typed(
                        bind_item(right, scope)?,
                        mirrored(operator),
                        literal_value(left)?,
                    ),
                    (false, false) => Ok(FilterItem::compare_items(
                        bind_item(left, scope)?,
                        operator,
                        bind_item(right, scope)?,
                    )),
                    (true, true) => Err(MetaQueryError::construction(
                        "Comparison between two literals is not supported",
                    )),
                }
            }
        },
        Expr::Not(inner) => Ok(bind_filter(inner, scope)?.negate()),
        Expr::IsNull { expr, negated } => {
            let item = bind_item(expr, scope)?;
            Ok(if *negated {
                FilterItem::is_not_null(item)
            } else {
                FilterItem::is_null(item)
            })
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let item = bind_item(expr, scope)?;
            let operator = if *negated {
                OperatorType::NotIn
            } else {
                OperatorType::In
            };
            let values = list
                .iter()
                .map(|e| literal_value(e).and_then(|v| coerce_operand(&item, operator, v)))
                .collect::<Result<Vec<_>>>()?;
            Ok(FilterItem::Atomic {
                item,
                operator,
                operand: Operand::List(values),
            })
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let operator = if *negated {
                OperatorType::NotLike
            } else {
                OperatorType::Like
            };
            typed(bind_item(expr, scope)?, operator, literal_value(pattern)?)
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let item = bind_item(expr, scope)?;
            let filter = FilterItem::and(vec![
                typed(item.clone(), OperatorType::GreaterThanOrEqual, literal_value(low)?)?,
                typed(item, OperatorType::LessThanOrEqual, literal_value(high)?)?,
            ]);
            Ok(if *negated { filter.negate() } else { filter })
        }
        Expr::Column(_) | Expr::Function { .. } => {
            typed(bind_item(expr, scope)?, OperatorType::Equals, Value::Boolean(true))
        }
        other => Err(MetaQueryError::construction(format!(
            "Unsupported predicate {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::Parser;
    use crate::schema::{Column, ColumnType, Schema};

    struct Catalog(Schema);

    impl TableLookup for Catalog {
        fn lookup_table(&self, _schema: Option<&str>, name: &str) -> Result<Table> {
            self.0
                .table_by_name(name)
                .cloned()
                .ok_or_else(|| MetaQueryError::TableNotFound(name.to_string()))
        }
    }

    fn catalog() -> Catalog {
        let mut schema = Schema::new("s");
        let mut person = Table::new("person");
        person.add_column(Column::new("id", ColumnType::Integer)).unwrap();
        person.add_column(Column::new("name", ColumnType::Varchar)).unwrap();
        let mut pet = Table::new("pet");
        pet.add_column(Column::new("id", ColumnType::Integer)).unwrap();
        pet.add_column(Column::new("owner", ColumnType::Integer)).unwrap();
        schema.add_table(person).unwrap();
        schema.add_table(pet).unwrap();
        Catalog(schema)
    }

    fn bind(sql: &str) -> Result<Query> {
        let catalog = catalog();
        let stmt = Parser::new(sql)?.parse()?;
        Binder::new(&catalog).bind_statement(&stmt)
    }

    #[test]
    fn test_bind_simple() {
        let query = bind("SELECT name FROM person WHERE id > '3' ORDER BY name DESC").unwrap();
        assert_eq!(query.select.len(), 1);
        assert_eq!(query.select[0].source_column().unwrap().name, "name");
        match &query.where_items[0] {
            FilterItem::Atomic { operand, .. } => {
                assert_eq!(*operand, Operand::Value(Value::Integer(3)))
            }
            other => panic!("unexpected filter {:?}", other),
        }
        assert!(!query.order_by[0].is_ascending());
    }

    #[test]
    fn test_bind_join_and_ambiguity() {
        let query =
            bind("SELECT p.name, x.id FROM person p JOIN pet x ON p.id = x.owner").unwrap();
        assert_eq!(query.select[1].from.as_deref(), Some("x"));
        let err = bind("SELECT id FROM person, pet").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_bind_errors_are_construction_errors() {
        use crate::error::ErrorKind;
        let err = bind("SELECT nope FROM person").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryConstruction);
        let err = bind("SELECT id FROM person WHERE id = 'abc'").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryConstruction);
        let err = bind("SELECT * FROM missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_bind_limits_and_ordinals() {
        let query = bind("SELECT name, id FROM person ORDER BY 2 LIMIT 5 OFFSET 10").unwrap();
        assert_eq!(query.order_by[0].item.source_column().unwrap().name, "id");
        assert_eq!(query.max_rows, Some(5));
        assert_eq!(query.first_row, Some(11));
    }

    #[test]
    fn test_bind_not_between() {
        let query = bind("SELECT id FROM person WHERE id NOT BETWEEN 1 AND 3").unwrap();
        assert_eq!(
            query.where_items[0].to_string(),
            "(person.id < 1 OR person.id > 3)"
        );
    }

    #[test]
    fn test_bind_sub_query() {
        let query = bind("SELECT q.n FROM (SELECT name AS n FROM person) q").unwrap();
        assert_eq!(query.select[0].label(), "n");
        assert_eq!(query.from[0].tables()[0].name(), "person");
    }
}
