use std::cmp::Ordering;
use std::collections::HashMap;

use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::AggregateFunction;
use crate::schema::ColumnType;

use super::evaluator::CompiledItem;

/// Running state of one aggregate over one group. NULL inputs are skipped
/// by every function; `COUNT(*)` is fed a non-null marker per row.
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    count: i64,
    int_sum: Option<i64>,
    float_sum: f64,
    value: Option<Value>,
}

impl Accumulator {
    pub fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            count: 0,
            int_sum: Some(0),
            float_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.count += 1;
        match self.function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                let n = numeric(&value)?;
                self.float_sum += n.as_float().unwrap_or(0.0);
                self.int_sum = match (self.int_sum, &n) {
                    (Some(sum), Value::Integer(i)) => sum.checked_add(*i),
                    _ => None,
                };
            }
            AggregateFunction::Min => {
                if self.value.as_ref().map_or(true, |current| {
                    value.compare(current) == Some(Ordering::Less)
                }) {
                    self.value = Some(value);
                }
            }
            AggregateFunction::Max => {
                if self.value.as_ref().map_or(true, |current| {
                    value.compare(current) == Some(Ordering::Greater)
                }) {
                    self.value = Some(value);
                }
            }
            AggregateFunction::First => {
                if self.value.is_none() {
                    self.value = Some(value);
                }
            }
            AggregateFunction::Last => self.value = Some(value),
        }
        Ok(())
    }

    pub fn finish(self) -> Value {
        match self.function {
            AggregateFunction::Count => Value::Integer(self.count),
            _ if self.count == 0 => Value::Null,
            AggregateFunction::Sum => match self.int_sum {
                Some(sum) => Value::Integer(sum),
                None => Value::Float(self.float_sum),
            },
            AggregateFunction::Avg => Value::Float(self.float_sum / self.count as f64),
            _ => self.value.unwrap_or(Value::Null),
        }
    }
}

fn numeric(value: &Value) -> Result<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) => Ok(value.clone()),
        Value::Boolean(b) => Ok(Value::Integer(*b as i64)),
        Value::String(_) => ColumnType::Double.convert(value.clone()),
        other => Err(MetaQueryError::ValueConversion {
            value: other.to_string(),
            target: ColumnType::Double,
        }),
    }
}

/// An aggregate to compute per group; `argument == None` counts rows.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub argument: Option<CompiledItem>,
}

/// Groups rows by key, preserving the order in which groups are first seen,
/// and emits `keys ++ aggregates` per group. Without keys a single row is
/// produced even for empty input.
pub fn group_rows<I>(rows: I, keys: &[CompiledItem], aggregates: &[AggregateSpec]) -> Result<Vec<Vec<Value>>>
where
    I: Iterator<Item = Result<Vec<Value>>>,
{
    let fresh = || -> Vec<Accumulator> {
        aggregates.iter().map(|a| Accumulator::new(a.function)).collect()
    };
    let mut positions: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
    if keys.is_empty() {
        groups.push((Vec::new(), fresh()));
        positions.insert(Vec::new(), 0);
    }

    for row in rows {
        let row = row?;
        let key = keys.iter().map(|k| k.eval(&row)).collect::<Result<Vec<_>>>()?;
        let index = match positions.get(&key) {
            Some(&i) => i,
            None => {
                groups.push((key.clone(), fresh()));
                positions.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        let accumulators = &mut groups[index].1;
        for (spec, acc) in aggregates.iter().zip(accumulators.iter_mut()) {
            let value = match &spec.argument {
                Some(arg) => arg.eval(&row)?,
                None => Value::Boolean(true),
            };
            acc.update(value)?;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(mut key, accumulators)| {
            key.extend(accumulators.into_iter().map(Accumulator::finish));
            key
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: AggregateFunction, values: Vec<Value>) -> Value {
        let mut acc = Accumulator::new(function);
        for v in values {
            acc.update(v).unwrap();
        }
        acc.finish()
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let values = vec![Value::from(3), Value::Null, Value::from(1), Value::from(2)];
        assert_eq!(run(AggregateFunction::Count, values.clone()), Value::Integer(3));
        assert_eq!(run(AggregateFunction::Sum, values.clone()), Value::Integer(6));
        assert_eq!(run(AggregateFunction::Avg, values.clone()), Value::Float(2.0));
        assert_eq!(run(AggregateFunction::Min, values.clone()), Value::Integer(1));
        assert_eq!(run(AggregateFunction::Max, values.clone()), Value::Integer(3));
        assert_eq!(run(AggregateFunction::First, values.clone()), Value::Integer(3));
        assert_eq!(run(AggregateFunction::Last, values), Value::Integer(2));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(run(AggregateFunction::Count, vec![]), Value::Integer(0));
        assert!(run(AggregateFunction::Sum, vec![Value::Null]).is_null());
        assert!(run(AggregateFunction::Max, vec![]).is_null());
    }

    #[test]
    fn test_sum_of_strings() {
        let sum = run(AggregateFunction::Sum, vec![Value::from("1.5"), Value::from(2)]);
        assert_eq!(sum, Value::Float(3.5));
        let mut acc = Accumulator::new(AggregateFunction::Sum);
        assert!(acc.update(Value::from("abc")).is_err());
    }

    #[test]
    fn test_group_order_and_empty() {
        let rows = vec![
            vec![Value::from("b"), Value::from(1)],
            vec![Value::from("a"), Value::from(2)],
            vec![Value::from("b"), Value::from(3)],
            vec![Value::Null, Value::from(4)],
        ];
        let keys = vec![CompiledItem::Index(0)];
        let aggregates = vec![AggregateSpec {
            function: AggregateFunction::Sum,
            argument: Some(CompiledItem::Index(1)),
        }];
        let grouped = group_rows(rows.into_iter().map(Ok), &keys, &aggregates).unwrap();
        assert_eq!(
            grouped,
            vec![
                vec![Value::from("b"), Value::from(4)],
                vec![Value::from("a"), Value::from(2)],
                vec![Value::Null, Value::from(4)],
            ]
        );

        let count = vec![AggregateSpec {
            function: AggregateFunction::Count,
            argument: None,
        }];
        let empty = group_rows(std::iter::empty(), &[], &count).unwrap();
        assert_eq!(empty, vec![vec![Value::Integer(0)]]);
        let empty = group_rows(std::iter::empty(), &keys, &count).unwrap();
        assert!(empty.is_empty());
    }
}
