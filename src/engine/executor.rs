use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::adapter::DataContext;
use crate::data::dataset::DataSetRows;
use crate::data::{DataSet, RowSource, Value, ValueKind};
use crate::error::{MetaQueryError, Result};
use crate::query::{Direction, Query, SelectExpr, SelectItem};

use super::aggregate::{group_rows, AggregateSpec};
use super::evaluator::{compile_filter, compile_item, RowLayout};
use super::join::NestedLoopJoin;
use super::planner::{Plan, Planner};
use super::{NullOrdering, RowStream};

/// Runs a query over the context's raw table rows.
pub fn execute<C: DataContext + ?Sized>(context: &C, query: &Query) -> Result<DataSet> {
    query.validate()?;
    let plan = Planner::new(query).plan()?;
    debug!("Executing query in memory:\n{}", plan);
    let (_, stream) = Executor::new(context).run(plan)?;
    Ok(DataSet::new(query.select.clone(), Pipeline(Some(stream))))
}

/// Owns the upstream iterator chain; closing drops it, which closes every
/// back-end cursor it holds.
struct Pipeline(Option<RowStream>);

impl RowSource for Pipeline {
    fn next_values(&mut self) -> Result<Option<Vec<Value>>> {
        match self.0.as_mut() {
            Some(stream) => stream.next().transpose(),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.0 = None;
    }
}

pub struct Executor<'c, C: DataContext + ?Sized> {
    context: &'c C,
    null_ordering: NullOrdering,
}

impl<'c, C: DataContext + ?Sized> Executor<'c, C> {
    pub fn new(context: &'c C) -> Self {
        Self {
            context,
            null_ordering: context.null_ordering(),
        }
    }

    pub fn run(&self, plan: Plan) -> Result<(RowLayout, RowStream)> {
        match plan {
            Plan::Scan {
                table,
                qualifier,
                columns,
                max_rows,
            } => {
                let data_set = self.context.materialize_table(&table, &columns, max_rows)?;
                let layout = RowLayout::new(
                    columns
                        .into_iter()
                        .map(|c| SelectItem::column(c).with_from(qualifier.as_str()))
                        .collect(),
                );
                let stream: RowStream = Box::new(DataSetRows(data_set));
                Ok((layout, stream))
            }

            Plan::SubQuery { query, alias } => {
                let data_set = self.context.execute_query(&query)?;
                let layout = RowLayout::new(
                    query
                        .select
                        .iter()
                        .map(|item| SelectItem::sub_query_ref(item.clone(), alias.as_str()))
                        .collect(),
                );
                Ok((layout, Box::new(DataSetRows(data_set))))
            }

            Plan::Join {
                left,
                right,
                join_type,
                on,
            } => {
                let (left_layout, left_rows) = self.run(*left)?;
                let (right_layout, right_rows) = self.run(*right)?;
                let layout = left_layout.concat(&right_layout);
                let on = compile_filter(&on, &layout)?;
                let join = NestedLoopJoin::new(
                    left_rows,
                    left_layout.len(),
                    right_rows,
                    right_layout.len(),
                    join_type,
                    Some(on),
                )?;
                Ok((layout, Box::new(join)))
            }

            Plan::CrossJoin { left, right } => {
                let (left_layout, left_rows) = self.run(*left)?;
                let (right_layout, right_rows) = self.run(*right)?;
                let layout = left_layout.concat(&right_layout);
                let join = NestedLoopJoin::new(
                    left_rows,
                    left_layout.len(),
                    right_rows,
                    right_layout.len(),
                    crate::query::JoinType::Inner,
                    None,
                )?;
                Ok((layout, Box::new(join)))
            }

            Plan::Filter { input, predicate } => {
                let (layout, rows) = self.run(*input)?;
                let predicate = compile_filter(&predicate, &layout)?;
                let filtered = rows.filter_map(move |row| match row {
                    Ok(row) => match predicate.eval(&row) {
                        Ok(truth) if truth.is_true() => Some(Ok(row)),
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    },
                    Err(e) => Some(Err(e)),
                });
                Ok((layout, Box::new(filtered)))
            }

            Plan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let (layout, rows) = self.run(*input)?;
                let keys = group_by
                    .iter()
                    .map(|g| compile_item(g, &layout))
                    .collect::<Result<Vec<_>>>()?;
                let specs = aggregates
                    .iter()
                    .map(|a| aggregate_spec(a, &layout))
                    .collect::<Result<Vec<_>>>()?;
                let grouped = group_rows(rows, &keys, &specs)?;
                let mut items = group_by;
                items.extend(aggregates);
                Ok((RowLayout::new(items), Box::new(grouped.into_iter().map(Ok::<_, MetaQueryError>))))
            }

            Plan::Projection {
                input,
                items,
                visible,
                distinct,
            } => {
                let (layout, rows) = self.run(*input)?;
                let compiled = items
                    .iter()
                    .map(|i| compile_item(i, &layout))
                    .collect::<Result<Vec<_>>>()?;
                let projected = rows.map(move |row| {
                    let row = row?;
                    compiled.iter().map(|c| c.eval(&row)).collect::<Result<Vec<_>>>()
                });
                let stream: RowStream = if distinct {
                    let mut seen: HashSet<Vec<Value>> = HashSet::new();
                    Box::new(projected.filter(move |row| match row {
                        Ok(row) => seen.insert(row[..visible].to_vec()),
                        Err(_) => true,
                    }))
                } else {
                    Box::new(projected)
                };
                Ok((RowLayout::new(items), stream))
            }

            Plan::Sort { input, order_by } => {
                let (layout, rows) = self.run(*input)?;
                let keys = order_by
                    .iter()
                    .map(|o| -> Result<_> { Ok((compile_item(&o.item, &layout)?, o.direction)) })
                    .collect::<Result<Vec<_>>>()?;
                let mut keyed = rows
                    .map(|row| -> Result<(Vec<Value>, Vec<Value>)> {
                        let row = row?;
                        let key = keys
                            .iter()
                            .map(|(k, _)| k.eval(&row))
                            .collect::<Result<Vec<_>>>()?;
                        Ok((key, row))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let nulls = self.null_ordering;
                keyed.sort_by(|(a, _), (b, _)| {
                    for (i, (_, direction)) in keys.iter().enumerate() {
                        let ordering = compare_for_sort(&a[i], &b[i], nulls);
                        let ordering = match direction {
                            Direction::Ascending => ordering,
                            Direction::Descending => ordering.reverse(),
                        };
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                    Ordering::Equal
                });
                let sorted = keyed
                    .into_iter()
                    .map(|(_, row)| Ok::<_, MetaQueryError>(row));
                Ok((layout, Box::new(sorted)))
            }

            Plan::Limit {
                input,
                offset,
                limit,
            } => {
                let (layout, rows) = self.run(*input)?;
                let limited = rows.skip(offset).take(limit.unwrap_or(usize::MAX));
                Ok((layout, Box::new(limited)))
            }

            Plan::Trim { input, width } => {
                let (layout, rows) = self.run(*input)?;
                let layout = RowLayout::new(layout.items()[..width].to_vec());
                let trimmed = rows.map(move |row| -> Result<Vec<Value>> {
                    let mut row = row?;
                    row.truncate(width);
                    Ok(row)
                });
                Ok((layout, Box::new(trimmed)))
            }
        }
    }
}

fn aggregate_spec(item: &SelectItem, layout: &RowLayout) -> Result<AggregateSpec> {
    match &item.expr {
        SelectExpr::Aggregate { function, argument } => Ok(AggregateSpec {
            function: *function,
            argument: argument
                .as_ref()
                .map(|a| compile_item(a, layout))
                .transpose()?,
        }),
        _ => Err(MetaQueryError::construction(format!(
            "'{}' is not an aggregate",
            item
        ))),
    }
}

/// Natural ascending order with NULL placement; values of unrelated types
/// fall back to their text form so the sort stays total.
pub fn compare_for_sort(a: &Value, b: &Value, nulls: NullOrdering) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match nulls {
            NullOrdering::High => Ordering::Greater,
            NullOrdering::Low => Ordering::Less,
        },
        (false, true) => match nulls {
            NullOrdering::High => Ordering::Less,
            NullOrdering::Low => Ordering::Greater,
        },
        (false, false) => sort_rank(a).cmp(&sort_rank(b)).then_with(|| {
            a.compare(b).unwrap_or_else(|| match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.to_string().cmp(&b.to_string()),
            })
        }),
    }
}

/// Values of different kinds never compare by coercion when sorting, so a
/// column mixing kinds still sorts in a total order: kind first, then value.
fn sort_rank(value: &Value) -> u8 {
    match value.kind() {
        ValueKind::Null => 0,
        ValueKind::Boolean => 1,
        ValueKind::Integer | ValueKind::Float => 2,
        ValueKind::String => 3,
        ValueKind::Binary => 4,
        ValueKind::Date | ValueKind::Timestamp => 5,
        ValueKind::Time => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_ordering() {
        let one = Value::from(1);
        assert_eq!(compare_for_sort(&Value::Null, &one, NullOrdering::High), Ordering::Greater);
        assert_eq!(compare_for_sort(&Value::Null, &one, NullOrdering::Low), Ordering::Less);
        assert_eq!(compare_for_sort(&one, &Value::from(2.5), NullOrdering::High), Ordering::Less);
        assert_eq!(compare_for_sort(&Value::Null, &Value::Null, NullOrdering::High), Ordering::Equal);
    }

    #[test]
    fn test_mixed_kinds_sort_totally() {
        let mut values = vec![
            Value::from("9"),
            Value::from(10),
            Value::from("10a"),
            Value::from(2.5),
            Value::from(true),
            Value::from("abc"),
        ];
        values.sort_by(|a, b| compare_for_sort(a, b, NullOrdering::High));
        assert_eq!(
            values,
            vec![
                Value::from(true),
                Value::from(2.5),
                Value::from(10),
                Value::from("10a"),
                Value::from("9"),
                Value::from("abc"),
            ]
        );
        for a in &values {
            for b in &values {
                let forward = compare_for_sort(a, b, NullOrdering::High);
                assert_eq!(forward.reverse(), compare_for_sort(b, a, NullOrdering::High));
            }
        }
    }
}
