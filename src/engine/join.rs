use std::collections::VecDeque;

use crate::data::Value;
use crate::error::Result;
use crate::query::JoinType;

use super::evaluator::CompiledFilter;
use super::RowStream;

/// Nested loop join for arbitrary predicates. One side is streamed, the
/// other is materialized; RIGHT joins stream the right side so they run as
/// a mirrored LEFT join. Output rows are always `left ++ right`.
pub struct NestedLoopJoin {
    outer: RowStream,
    inner_rows: Vec<Vec<Value>>,
    outer_width: usize,
    inner_width: usize,
    /// `None` is a cross product.
    on: Option<CompiledFilter>,
    join_type: JoinType,
    swapped: bool,
    matched_inner: Vec<bool>,
    pending: VecDeque<Vec<Value>>,
    outer_done: bool,
}

impl NestedLoopJoin {
    pub fn new(
        left: RowStream,
        left_width: usize,
        right: RowStream,
        right_width: usize,
        join_type: JoinType,
        on: Option<CompiledFilter>,
    ) -> Result<Self> {
        let swapped = join_type == JoinType::Right;
        let (outer, outer_width, inner, inner_width) = if swapped {
            (right, right_width, left, left_width)
        } else {
            (left, left_width, right, right_width)
        };
        let inner_rows = inner.collect::<Result<Vec<_>>>()?;
        let matched_inner = vec![false; inner_rows.len()];
        Ok(Self {
            outer,
            inner_rows,
            outer_width,
            inner_width,
            on,
            join_type,
            swapped,
            matched_inner,
            pending: VecDeque::new(),
            outer_done: false,
        })
    }

    fn combine(&self, outer: &[Value], inner: &[Value]) -> Vec<Value> {
        let mut row = Vec::with_capacity(outer.len() + inner.len());
        if self.swapped {
            row.extend_from_slice(inner);
            row.extend_from_slice(outer);
        } else {
            row.extend_from_slice(outer);
            row.extend_from_slice(inner);
        }
        row
    }

    fn probe(&mut self, outer: Vec<Value>) -> Result<()> {
        let mut matched = false;
        for i in 0..self.inner_rows.len() {
            let joined = self.combine(&outer, &self.inner_rows[i]);
            let accept = match &self.on {
                Some(on) => on.eval(&joined)?.is_true(),
                None => true,
            };
            if accept {
                matched = true;
                self.matched_inner[i] = true;
                self.pending.push_back(joined);
            }
        }
        if !matched && self.join_type != JoinType::Inner {
            let nulls = vec![Value::Null; self.inner_width];
            let padded = self.combine(&outer, &nulls);
            self.pending.push_back(padded);
        }
        Ok(())
    }

    fn emit_unmatched_inner(&mut self) {
        if self.join_type != JoinType::Full {
            return;
        }
        for (row, matched) in self.inner_rows.iter().zip(&self.matched_inner) {
            if !matched {
                let mut padded = vec![Value::Null; self.outer_width];
                padded.extend_from_slice(row);
                self.pending.push_back(padded);
            }
        }
    }
}

impl Iterator for NestedLoopJoin {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.outer_done {
                return None;
            }
            match self.outer.next() {
                Some(Ok(row)) => {
                    if let Err(e) = self.probe(row) {
                        self.outer_done = true;
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => {
                    self.outer_done = true;
                    return Some(Err(e));
                }
                None => {
                    self.outer_done = true;
                    self.emit_unmatched_inner();
                }
            }
        }
    }
}
