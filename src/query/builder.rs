use crate::adapter::{DataContext, DataContextExt};
use crate::data::{DataSet, Value};
use crate::error::{MetaQueryError, Result};
use crate::schema::{Column, Table};

use super::filter::coerce_operand;
use super::parser::binder::{bind_item, Scope};
use super::parser::Parser;
use super::{FilterItem, FromItem, Operand, OperatorType, OrderByItem, Query, SelectItem};

/// A table given to a builder, either by (optionally schema-qualified) name
/// or as a resolved [`Table`].
#[derive(Debug, Clone)]
pub enum TableRef {
    Name(String),
    Table(Table),
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::Name(name.to_string())
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::Name(name)
    }
}

impl From<Table> for TableRef {
    fn from(table: Table) -> Self {
        TableRef::Table(table)
    }
}

impl From<&Table> for TableRef {
    fn from(table: &Table) -> Self {
        TableRef::Table(table.clone())
    }
}

/// A select item given to a builder, either by name or expression text
/// (`"name"`, `"t.name"`, `"COUNT(*)"`) or already resolved.
#[derive(Debug, Clone)]
pub enum ItemRef {
    Name(String),
    Item(SelectItem),
}

impl From<&str> for ItemRef {
    fn from(name: &str) -> Self {
        ItemRef::Name(name.to_string())
    }
}

impl From<String> for ItemRef {
    fn from(name: String) -> Self {
        ItemRef::Name(name)
    }
}

impl From<SelectItem> for ItemRef {
    fn from(item: SelectItem) -> Self {
        ItemRef::Item(item)
    }
}

impl From<&Column> for ItemRef {
    fn from(column: &Column) -> Self {
        ItemRef::Item(SelectItem::column(column.clone()))
    }
}

impl From<Column> for ItemRef {
    fn from(column: Column) -> Self {
        ItemRef::Item(SelectItem::column(column))
    }
}

/// Resolves an item against the given from items. Plain names are looked up
/// directly so identifiers that are not valid SQL (`"yo!"`) still resolve;
/// anything else goes through the expression parser.
pub(crate) fn resolve_item(from: &[FromItem], item: ItemRef) -> Result<SelectItem> {
    let name = match item {
        ItemRef::Item(item) => return resolve_given(from, item),
        ItemRef::Name(name) => name,
    };
    let scope = Scope::new(from);
    if let Ok(item) = scope.resolve(None, &name) {
        return Ok(item);
    }
    let expr = Parser::new(&name)
        .and_then(|mut p| p.parse_standalone_expr())
        .map_err(|e| {
            MetaQueryError::construction(format!("Could not resolve select item '{}': {}", name, e))
        })?;
    bind_item(&expr, &scope)
}

/// A column handed in directly gets qualified by the from item holding its table.
fn resolve_given(from: &[FromItem], mut item: SelectItem) -> Result<SelectItem> {
    if item.from.is_some() {
        return Ok(item);
    }
    if let Some(column) = item.source_column().cloned() {
        let holder = from
            .iter()
            .flat_map(|f| f.leaves())
            .find(|leaf| matches!(leaf, FromItem::Table { table, .. } if table.name().eq_ignore_ascii_case(&column.table)));
        match holder {
            Some(leaf) if !item.is_function() => {
                item.from = leaf.qualifier().map(str::to_string);
            }
            Some(_) => {}
            None if !from.is_empty() && !column.table.is_empty() => {
                return Err(MetaQueryError::construction(format!(
                    "Column '{}' does not belong to any from item",
                    column.qualified_label()
                )))
            }
            None => {}
        }
    }
    Ok(item)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSlot {
    Where,
    Having,
}

/// A builder that accepts filters, shared by the query and the row update
/// and delete builders.
pub trait WhereClause: Sized {
    fn resolve(&self, item: ItemRef) -> Result<SelectItem>;

    fn filters_mut(&mut self, slot: FilterSlot) -> &mut Vec<FilterItem>;

    /// Keeps the first error; it is reported when the builder executes.
    fn record_error(&mut self, error: MetaQueryError);

    fn where_(self, item: impl Into<ItemRef>) -> FilterBuilder<Self> {
        let item = self.resolve(item.into());
        FilterBuilder::new(self, item, FilterSlot::Where, Combine::And)
    }

    /// Adds a raw predicate, only understood by SQL back-ends.
    fn where_expression(mut self, text: impl Into<String>) -> Self {
        self.filters_mut(FilterSlot::Where)
            .push(FilterItem::Expression(text.into()));
        self
    }

    fn where_filter(mut self, filter: FilterItem) -> Self {
        self.filters_mut(FilterSlot::Where).push(filter);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    And,
    Or,
}

/// Pending filter on one item; the operator methods complete it and hand
/// back the parent builder.
pub struct FilterBuilder<P: WhereClause> {
    parent: P,
    item: Result<SelectItem>,
    slot: FilterSlot,
    combine: Combine,
}

impl<P: WhereClause> FilterBuilder<P> {
    fn new(parent: P, item: Result<SelectItem>, slot: FilterSlot, combine: Combine) -> Self {
        Self {
            parent,
            item,
            slot,
            combine,
        }
    }

    fn finish(self, operator: OperatorType, operand: Operand) -> P {
        let FilterBuilder {
            mut parent,
            item,
            slot,
            combine,
        } = self;
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                parent.record_error(e);
                return parent;
            }
        };
        let operand = match operand {
            Operand::Value(v) => coerce_operand(&item, operator, v).map(Operand::Value),
            Operand::List(values) => values
                .into_iter()
                .map(|v| coerce_operand(&item, operator, v))
                .collect::<Result<Vec<_>>>()
                .map(Operand::List),
            other => Ok(other),
        };
        let operand = match operand {
            Ok(operand) => operand,
            Err(e) => {
                parent.record_error(e);
                return parent;
            }
        };
        let filter = FilterItem::Atomic {
            item,
            operator,
            operand,
        };
        let filters = parent.filters_mut(slot);
        match (combine, filters.pop()) {
            (Combine::Or, Some(FilterItem::Compound { logic, mut children }))
                if logic == super::LogicalOperator::Or =>
            {
                children.push(filter);
                filters.push(FilterItem::Compound { logic, children });
            }
            (Combine::Or, Some(previous)) => filters.push(FilterItem::or(vec![previous, filter])),
            (_, previous) => {
                filters.extend(previous);
                filters.push(filter);
            }
        }
        parent
    }

    fn with_item(self, operator: OperatorType, other: impl Into<ItemRef>) -> P {
        let other = self.parent.resolve(other.into());
        match other {
            Ok(other) => self.finish(operator, Operand::Item(other)),
            Err(e) => {
                let mut parent = self.parent;
                parent.record_error(e);
                parent
            }
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::Equals, Operand::Value(value.into()))
    }

    pub fn ne(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::DifferentFrom, Operand::Value(value.into()))
    }

    pub fn lt(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::LessThan, Operand::Value(value.into()))
    }

    pub fn le(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::LessThanOrEqual, Operand::Value(value.into()))
    }

    pub fn gt(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::GreaterThan, Operand::Value(value.into()))
    }

    pub fn ge(self, value: impl Into<Value>) -> P {
        self.finish(OperatorType::GreaterThanOrEqual, Operand::Value(value.into()))
    }

    pub fn like(self, pattern: impl Into<String>) -> P {
        self.finish(OperatorType::Like, Operand::Value(Value::String(pattern.into())))
    }

    pub fn not_like(self, pattern: impl Into<String>) -> P {
        self.finish(OperatorType::NotLike, Operand::Value(Value::String(pattern.into())))
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> P {
        let values = values.into_iter().map(Into::into).collect();
        self.finish(OperatorType::In, Operand::List(values))
    }

    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> P {
        let values = values.into_iter().map(Into::into).collect();
        self.finish(OperatorType::NotIn, Operand::List(values))
    }

    pub fn is_null(self) -> P {
        self.finish(OperatorType::IsNull, Operand::None)
    }

    pub fn is_not_null(self) -> P {
        self.finish(OperatorType::IsNotNull, Operand::None)
    }

    /// Compares against another item, e.g. `where_("a.id").eq_item("b.id")`.
    pub fn eq_item(self, other: impl Into<ItemRef>) -> P {
        self.with_item(OperatorType::Equals, other)
    }

    pub fn compare_item(self, operator: OperatorType, other: impl Into<ItemRef>) -> P {
        self.with_item(operator, other)
    }
}

/// Fluent query construction against a data context.
///
/// String arguments are resolved as soon as they are given, against the
/// context's schemas and the from items added so far. Resolution failures
/// are kept and reported by [`build`](QueryBuilder::build) or
/// [`execute`](QueryBuilder::execute).
pub struct QueryBuilder<'a, C: DataContext + ?Sized> {
    context: &'a C,
    query: Query,
    error: Option<MetaQueryError>,
}

impl<'a, C: DataContext + ?Sized> QueryBuilder<'a, C> {
    pub fn new(context: &'a C) -> Self {
        Self {
            context,
            query: Query::new(),
            error: None,
        }
    }

    fn add_from(mut self, table: TableRef, alias: Option<String>) -> Self {
        let table = match table {
            TableRef::Table(table) => Ok(table),
            TableRef::Name(name) => self.context.table_by_qualified_label(&name),
        };
        match table {
            Ok(table) => self.query.from.push(FromItem::Table { table, alias }),
            Err(e) => self.record_error(e),
        }
        self
    }

    pub fn from(self, table: impl Into<TableRef>) -> Self {
        self.add_from(table.into(), None)
    }

    pub fn from_as(self, table: impl Into<TableRef>, alias: impl Into<String>) -> Self {
        self.add_from(table.into(), Some(alias.into()))
    }

    pub fn from_item(mut self, item: FromItem) -> Self {
        self.query.from.push(item);
        self
    }

    pub fn select(mut self, item: impl Into<ItemRef>) -> Self {
        match item.into() {
            ItemRef::Name(name) if name == "*" => return self.select_all(),
            item => match self.resolve(item) {
                Ok(item) => self.query.select.push(item),
                Err(e) => self.record_error(e),
            },
        }
        self
    }

    pub fn select_as(mut self, item: impl Into<ItemRef>, alias: impl Into<String>) -> Self {
        match self.resolve(item.into()) {
            Ok(item) => self.query.select.push(item.with_alias(alias)),
            Err(e) => self.record_error(e),
        }
        self
    }

    pub fn select_all(mut self) -> Self {
        self.query = self.query.select_all();
        self
    }

    pub fn select_count(mut self) -> Self {
        self.query.select.push(SelectItem::count_all());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    /// Adds a further condition combined with the previous one by AND.
    pub fn and(self, item: impl Into<ItemRef>) -> FilterBuilder<Self> {
        self.where_(item)
    }

    /// Adds a further condition combined with the previous one by OR.
    pub fn or(self, item: impl Into<ItemRef>) -> FilterBuilder<Self> {
        let item = self.resolve(item.into());
        FilterBuilder::new(self, item, FilterSlot::Where, Combine::Or)
    }

    pub fn group_by(mut self, item: impl Into<ItemRef>) -> Self {
        match self.resolve(item.into()) {
            Ok(item) => self.query.group_by.push(item),
            Err(e) => self.record_error(e),
        }
        self
    }

    pub fn having(self, item: impl Into<ItemRef>) -> FilterBuilder<Self> {
        let item = self.resolve(item.into());
        FilterBuilder::new(self, item, FilterSlot::Having, Combine::And)
    }

    pub fn order_by(mut self, item: impl Into<ItemRef>) -> Self {
        match self.resolve_order_item(item.into()) {
            Ok(item) => self.query.order_by.push(OrderByItem::asc(item)),
            Err(e) => self.record_error(e),
        }
        self
    }

    pub fn order_by_desc(mut self, item: impl Into<ItemRef>) -> Self {
        match self.resolve_order_item(item.into()) {
            Ok(item) => self.query.order_by.push(OrderByItem::desc(item)),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Order items may name a select item by its alias.
    fn resolve_order_item(&self, item: ItemRef) -> Result<SelectItem> {
        if let ItemRef::Name(name) = &item {
            if let Some(selected) = self
                .query
                .select
                .iter()
                .find(|s| s.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name)))
            {
                return Ok(selected.clone());
            }
        }
        self.resolve(item)
    }

    pub fn limit(mut self, max_rows: usize) -> Self {
        self.query.max_rows = Some(max_rows);
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.first_row = if offset == 0 { None } else { Some(offset.saturating_add(1)) };
        self
    }

    pub fn first_row(mut self, first_row: usize) -> Self {
        self.query.first_row = Some(first_row);
        self
    }

    pub fn build(self) -> Result<Query> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.query.validate()?;
        Ok(self.query)
    }

    pub fn execute(self) -> Result<DataSet> {
        let context = self.context;
        let query = self.build()?;
        context.execute_query(&query)
    }

    pub fn to_sql(self) -> Result<String> {
        Ok(self.build()?.to_string())
    }
}

impl<'a, C: DataContext + ?Sized> WhereClause for QueryBuilder<'a, C> {
    fn resolve(&self, item: ItemRef) -> Result<SelectItem> {
        resolve_item(&self.query.from, item)
    }

    fn filters_mut(&mut self, slot: FilterSlot) -> &mut Vec<FilterItem> {
        match slot {
            FilterSlot::Where => &mut self.query.where_items,
            FilterSlot::Having => &mut self.query.having,
        }
    }

    fn record_error(&mut self, error: MetaQueryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}
