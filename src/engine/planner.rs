use std::fmt;

use crate::error::{MetaQueryError, Result};
use crate::query::{
    FilterItem, FromItem, JoinType, OrderByItem, Query, SelectExpr, SelectItem,
};
use crate::schema::{Column, Table};

#[derive(Debug, Clone)]
pub enum Plan {
    /// Materialize `columns` of a table, in that order.
    Scan {
        table: Table,
        qualifier: String,
        columns: Vec<Column>,
        max_rows: Option<usize>,
    },

    SubQuery {
        query: Box<Query>,
        alias: String,
    },

    Join {
        left: Box<Plan>,
        right: Box<Plan>,
        join_type: JoinType,
        on: FilterItem,
    },

    CrossJoin {
        left: Box<Plan>,
        right: Box<Plan>,
    },

    Filter {
        input: Box<Plan>,
        predicate: FilterItem,
    },

    /// Emits `group_by ++ aggregates` per group.
    Aggregate {
        input: Box<Plan>,
        group_by: Vec<SelectItem>,
        aggregates: Vec<SelectItem>,
    },

    /// The first `visible` items are the query's select list; the rest are
    /// order keys that are not selected.
    Projection {
        input: Box<Plan>,
        items: Vec<SelectItem>,
        visible: usize,
        distinct: bool,
    },

    Sort {
        input: Box<Plan>,
        order_by: Vec<OrderByItem>,
    },

    Limit {
        input: Box<Plan>,
        offset: usize,
        limit: Option<usize>,
    },

    /// Drops trailing hidden columns.
    Trim {
        input: Box<Plan>,
        width: usize,
    },
}

pub struct Planner<'q> {
    query: &'q Query,
}

impl<'q> Planner<'q> {
    pub fn new(query: &'q Query) -> Self {
        Self { query }
    }

    pub fn plan(&self) -> Result<Plan> {
        let query = self.query;

        // FROM items are combined as a cross product
        let mut plan: Option<Plan> = None;
        for from in &query.from {
            let next = self.plan_from(from)?;
            plan = Some(match plan {
                None => next,
                Some(left) => Plan::CrossJoin {
                    left: Box::new(left),
                    right: Box::new(next),
                },
            });
        }
        let mut plan =
            plan.ok_or_else(|| MetaQueryError::construction("Query has no from items"))?;

        if let Some(predicate) = query.where_filter() {
            plan = Plan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }

        if query.is_grouped() {
            plan = Plan::Aggregate {
                input: Box::new(plan),
                group_by: query.group_by.clone(),
                aggregates: self.aggregates(),
            };
            if let Some(predicate) = query.having_filter() {
                plan = Plan::Filter {
                    input: Box::new(plan),
                    predicate,
                };
            }
        }

        let mut items = query.select.clone();
        for order in &query.order_by {
            let selected = items.iter().any(|i| i.equals_ignore_alias(&order.item));
            if !selected {
                items.push(order.item.clone());
            }
        }
        let visible = query.select.len();
        let hidden = items.len() > visible;
        plan = Plan::Projection {
            input: Box::new(plan),
            items,
            visible,
            distinct: query.distinct,
        };

        if !query.order_by.is_empty() {
            plan = Plan::Sort {
                input: Box::new(plan),
                order_by: query.order_by.clone(),
            };
        }

        if query.offset() > 0 || query.max_rows.is_some() {
            plan = Plan::Limit {
                input: Box::new(plan),
                offset: query.offset(),
                limit: query.max_rows,
            };
        }

        if hidden {
            plan = Plan::Trim {
                input: Box::new(plan),
                width: visible,
            };
        }
        Ok(plan)
    }

    fn plan_from(&self, from: &FromItem) -> Result<Plan> {
        match from {
            FromItem::Table { table, .. } => {
                let qualifier = from.qualifier().unwrap_or(table.name()).to_string();
                let columns = self.referenced_columns(table, &qualifier)?;
                Ok(Plan::Scan {
                    table: table.clone(),
                    qualifier,
                    columns,
                    max_rows: self.scan_limit(),
                })
            }
            FromItem::SubQuery { query, alias } => Ok(Plan::SubQuery {
                query: query.clone(),
                alias: alias.clone().unwrap_or_default(),
            }),
            FromItem::Join {
                left,
                right,
                join_type,
                on,
            } => Ok(Plan::Join {
                left: Box::new(self.plan_from(left)?),
                right: Box::new(self.plan_from(right)?),
                join_type: *join_type,
                on: on.clone(),
            }),
        }
    }

    /// A single unfiltered, unordered table may stop reading early.
    fn scan_limit(&self) -> Option<usize> {
        let query = self.query;
        let simple = query.from.len() == 1
            && matches!(query.from[0], FromItem::Table { .. })
            && query.where_items.is_empty()
            && !query.is_grouped()
            && query.order_by.is_empty()
            && !query.distinct;
        if simple {
            query.max_rows.map(|m| m.saturating_add(query.offset()))
        } else {
            None
        }
    }

    /// Columns of `table` used anywhere in the query, in table order. Falls
    /// back to the first column so that row counts survive.
    fn referenced_columns(&self, table: &Table, qualifier: &str) -> Result<Vec<Column>> {
        let mut referenced: Vec<String> = Vec::new();
        let mut visit = |item: &SelectItem| {
            collect_columns(item, &mut |column, from| {
                let same_table = column.table.eq_ignore_ascii_case(table.name());
                let same_source = from.map_or(true, |f| f.eq_ignore_ascii_case(qualifier));
                if same_table
                    && same_source
                    && !referenced.iter().any(|c| c.eq_ignore_ascii_case(&column.name))
                {
                    referenced.push(column.name.clone());
                }
            })
        };

        let query = self.query;
        query.select.iter().for_each(&mut visit);
        query.group_by.iter().for_each(&mut visit);
        query.order_by.iter().for_each(|o| visit(&o.item));
        for filter in query.where_items.iter().chain(&query.having) {
            filter.for_each_item(&mut visit);
        }
        for from in &query.from {
            visit_join_conditions(from, &mut visit);
        }

        for name in &referenced {
            if table.column_by_name(name).is_none() {
                return Err(MetaQueryError::ColumnNotFound(format!(
                    "{}.{}",
                    table.name(),
                    name
                )));
            }
        }
        let mut columns: Vec<Column> = table
            .columns()
            .iter()
            .filter(|c| referenced.iter().any(|r| r.eq_ignore_ascii_case(&c.name)))
            .cloned()
            .collect();
        if columns.is_empty() {
            columns.extend(table.columns().first().cloned());
        }
        Ok(columns)
    }

    /// Distinct aggregate expressions needed by the select list, HAVING and
    /// ORDER BY, without aliases.
    fn aggregates(&self) -> Vec<SelectItem> {
        let mut aggregates: Vec<SelectItem> = Vec::new();
        let mut visit = |item: &SelectItem| collect_aggregates(item, &mut aggregates);
        let query = self.query;
        query.select.iter().for_each(&mut visit);
        query.order_by.iter().for_each(|o| visit(&o.item));
        for filter in &query.having {
            filter.for_each_item(&mut visit);
        }
        aggregates
    }
}

fn collect_columns(item: &SelectItem, f: &mut dyn FnMut(&Column, Option<&str>)) {
    match &item.expr {
        SelectExpr::Column(c) => f(c, item.from.as_deref()),
        SelectExpr::Aggregate {
            argument: Some(arg),
            ..
        } => collect_columns(arg, f),
        SelectExpr::Scalar { args, .. } => {
            for arg in args {
                collect_columns(arg, f);
            }
        }
        _ => {}
    }
}

fn collect_aggregates(item: &SelectItem, out: &mut Vec<SelectItem>) {
    match &item.expr {
        SelectExpr::Aggregate { .. } => {
            if !out.iter().any(|a| a.equals_ignore_alias(item)) {
                out.push(SelectItem {
                    alias: None,
                    ..item.clone()
                });
            }
        }
        SelectExpr::Scalar { args, .. } => {
            for arg in args {
                collect_aggregates(arg, out);
            }
        }
        _ => {}
    }
}

fn visit_join_conditions<'a>(from: &'a FromItem, visit: &mut dyn FnMut(&'a SelectItem)) {
    if let FromItem::Join {
        left, right, on, ..
    } = from
    {
        on.for_each_item(visit);
        visit_join_conditions(left, visit);
        visit_join_conditions(right, visit);
    }
}

impl Plan {
    fn fmt_indent(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Plan::Scan {
                table,
                qualifier,
                columns,
                max_rows,
            } => {
                let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                write!(f, "{}Scan {} AS {} [{}]", pad, table.qualified_label(), qualifier, names.join(", "))?;
                if let Some(max) = max_rows {
                    write!(f, " max_rows={}", max)?;
                }
                writeln!(f)
            }
            Plan::SubQuery { query, alias } => writeln!(f, "{}SubQuery {} ({})", pad, alias, query),
            Plan::Join {
                left,
                right,
                join_type,
                on,
            } => {
                writeln!(f, "{}{} ON {}", pad, join_type.sql(), on)?;
                left.fmt_indent(f, depth + 1)?;
                right.fmt_indent(f, depth + 1)
            }
            Plan::CrossJoin { left, right } => {
                writeln!(f, "{}CrossJoin", pad)?;
                left.fmt_indent(f, depth + 1)?;
                right.fmt_indent(f, depth + 1)
            }
            Plan::Filter { input, predicate } => {
                writeln!(f, "{}Filter {}", pad, predicate)?;
                input.fmt_indent(f, depth + 1)
            }
            Plan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let keys: Vec<String> = group_by.iter().map(|g| g.to_string()).collect();
                let aggs: Vec<String> = aggregates.iter().map(|a| a.to_string()).collect();
                writeln!(f, "{}Aggregate keys=[{}] aggregates=[{}]", pad, keys.join(", "), aggs.join(", "))?;
                input.fmt_indent(f, depth + 1)
            }
            Plan::Projection {
                input,
                items,
                visible,
                distinct,
            } => {
                let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                writeln!(
                    f,
                    "{}Projection{} [{}] visible={}",
                    pad,
                    if *distinct { " DISTINCT" } else { "" },
                    items.join(", "),
                    visible
                )?;
                input.fmt_indent(f, depth + 1)
            }
            Plan::Sort { input, order_by } => {
                let keys: Vec<String> = order_by.iter().map(|o| o.to_string()).collect();
                writeln!(f, "{}Sort [{}]", pad, keys.join(", "))?;
                input.fmt_indent(f, depth + 1)
            }
            Plan::Limit {
                input,
                offset,
                limit,
            } => {
                writeln!(f, "{}Limit offset={} limit={:?}", pad, offset, limit)?;
                input.fmt_indent(f, depth + 1)
            }
            Plan::Trim { input, width } => {
                writeln!(f, "{}Trim width={}", pad, width)?;
                input.fmt_indent(f, depth + 1)
            }
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{AggregateFunction, OperatorType};
    use crate::schema::ColumnType;

    fn table() -> Table {
        let mut table = Table::new("person");
        table.add_column(Column::new("id", ColumnType::Integer)).unwrap();
        table.add_column(Column::new("name", ColumnType::Varchar)).unwrap();
        table.add_column(Column::new("age", ColumnType::Integer)).unwrap();
        table
    }

    fn item(table: &Table, name: &str) -> SelectItem {
        SelectItem::column(table.column_by_name(name).unwrap().clone()).with_from("person")
    }

    #[test]
    fn test_scan_projects_referenced_columns() {
        let t = table();
        let query = Query::new()
            .from_table(t.clone())
            .select(item(&t, "name"))
            .where_item(FilterItem::new(item(&t, "id"), OperatorType::Equals, 1));
        let plan = Planner::new(&query).plan().unwrap();
        let text = plan.to_string();
        assert!(text.contains("Scan person AS person [id, name]"), "{}", text);
        assert!(text.starts_with("Projection"));
    }

    #[test]
    fn test_count_scans_one_column_and_limit_pushdown() {
        let t = table();
        let query = Query::new().from_table(t.clone()).select_count();
        let plan = Planner::new(&query).plan().unwrap();
        assert!(plan.to_string().contains("[id]"));

        let query = Query::new()
            .from_table(t.clone())
            .select(item(&t, "name"))
            .first_row(3)
            .max_rows(2);
        let plan = Planner::new(&query).plan().unwrap();
        assert!(plan.to_string().contains("max_rows=4"));
    }

    #[test]
    fn test_hidden_order_column_is_trimmed() {
        let t = table();
        let max = SelectItem::aggregate(AggregateFunction::Max, item(&t, "age"));
        let query = Query::new()
            .from_table(t.clone())
            .select(item(&t, "name"))
            .group_by(item(&t, "name"))
            .order_by(OrderByItem::desc(max));
        let plan = Planner::new(&query).plan().unwrap();
        match plan {
            Plan::Trim { width, input } => {
                assert_eq!(width, 1);
                assert!(matches!(*input, Plan::Sort { .. }));
            }
            other => panic!("unexpected plan {}", other),
        }
    }
}
