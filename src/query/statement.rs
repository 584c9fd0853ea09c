use std::fmt;

use crate::error::{MetaQueryError, Result};
use crate::schema::Table;

use super::{FilterItem, FromItem, SelectExpr, SelectItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByItem {
    pub item: SelectItem,
    pub direction: Direction,
}

impl OrderByItem {
    pub fn asc(item: SelectItem) -> Self {
        Self {
            item,
            direction: Direction::Ascending,
        }
    }

    pub fn desc(item: SelectItem) -> Self {
        Self {
            item,
            direction: Direction::Descending,
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == Direction::Ascending
    }
}

impl fmt::Display for OrderByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        write!(f, "{} {}", self.item.expression_sql(true), direction)
    }
}

/// A query value. Where items are combined with AND; `first_row` is 1-based.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub select: Vec<SelectItem>,
    pub distinct: bool,
    pub from: Vec<FromItem>,
    pub where_items: Vec<FilterItem>,
    pub group_by: Vec<SelectItem>,
    pub having: Vec<FilterItem>,
    pub order_by: Vec<OrderByItem>,
    pub max_rows: Option<usize>,
    pub first_row: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, item: impl Into<SelectItem>) -> Self {
        self.select.push(item.into());
        self
    }

    /// Selects every output item of the current from items.
    pub fn select_all(mut self) -> Self {
        let items: Vec<SelectItem> = self.from.iter().flat_map(|f| f.output_items()).collect();
        self.select.extend(items);
        self
    }

    pub fn select_count(self) -> Self {
        self.select(SelectItem::count_all())
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, item: FromItem) -> Self {
        self.from.push(item);
        self
    }

    pub fn from_table(self, table: Table) -> Self {
        self.from(FromItem::table(table))
    }

    pub fn where_item(mut self, filter: FilterItem) -> Self {
        self.where_items.push(filter);
        self
    }

    pub fn group_by(mut self, item: impl Into<SelectItem>) -> Self {
        self.group_by.push(item.into());
        self
    }

    pub fn having(mut self, filter: FilterItem) -> Self {
        self.having.push(filter);
        self
    }

    pub fn order_by(mut self, item: OrderByItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn first_row(mut self, first_row: usize) -> Self {
        self.first_row = Some(first_row);
        self
    }

    /// Number of leading rows to skip (`first_row - 1`).
    pub fn offset(&self) -> usize {
        self.first_row.map(|r| r.saturating_sub(1)).unwrap_or(0)
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
            || self.select.iter().any(|s| s.is_aggregate())
            || self.having.iter().any(|h| h.contains_aggregate())
    }

    /// Checks the query is complete and its grouping is consistent.
    pub fn validate(&self) -> Result<()> {
        if self.select.is_empty() {
            return Err(MetaQueryError::construction("Query has no select items"));
        }
        if self.from.is_empty() {
            return Err(MetaQueryError::construction("Query has no from items"));
        }
        if self.first_row == Some(0) {
            return Err(MetaQueryError::construction("First row is 1-based, got 0"));
        }
        for filter in &self.where_items {
            if filter.contains_aggregate() {
                return Err(MetaQueryError::construction(format!(
                    "Aggregates are not allowed in WHERE: {}",
                    filter
                )));
            }
        }
        if self.group_by.iter().any(|g| g.is_aggregate()) {
            return Err(MetaQueryError::construction("Cannot group by an aggregate"));
        }
        if self.is_grouped() {
            for item in &self.select {
                self.check_grouped(item)?;
            }
            for order in &self.order_by {
                self.check_grouped(&order.item)?;
            }
        }
        for from in &self.from {
            for leaf in from.leaves() {
                if let FromItem::SubQuery { query, .. } = leaf {
                    query.validate()?;
                }
            }
        }
        Ok(())
    }

    fn check_grouped(&self, item: &SelectItem) -> Result<()> {
        if item.is_aggregate() || self.group_by.iter().any(|g| g.equals_ignore_alias(item)) {
            return Ok(());
        }
        match &item.expr {
            SelectExpr::Literal(_) | SelectExpr::Expression(_) => Ok(()),
            SelectExpr::Scalar { args, .. } => {
                for arg in args {
                    self.check_grouped(arg)?;
                }
                Ok(())
            }
            _ => Err(MetaQueryError::construction(format!(
                "'{}' is neither aggregated nor part of the GROUP BY clause",
                item.expression_sql(true)
            ))),
        }
    }

    /// The where items folded into a single filter.
    pub fn where_filter(&self) -> Option<FilterItem> {
        combine(&self.where_items)
    }

    pub fn having_filter(&self) -> Option<FilterItem> {
        combine(&self.having)
    }
}

fn combine(filters: &[FilterItem]) -> Option<FilterItem> {
    match filters.len() {
        0 => None,
        1 => Some(filters[0].clone()),
        _ => Some(FilterItem::and(filters.to_vec())),
    }
}

fn join_display<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "{}", join_display(&self.select, ", "))?;
        if !self.from.is_empty() {
            write!(f, " FROM {}", join_display(&self.from, ", "))?;
        }
        if !self.where_items.is_empty() {
            write!(f, " WHERE {}", join_display(&self.where_items, " AND "))?;
        }
        if !self.group_by.is_empty() {
            let items: Vec<String> = self.group_by.iter().map(|g| g.expression_sql(true)).collect();
            write!(f, " GROUP BY {}", items.join(", "))?;
        }
        if !self.having.is_empty() {
            write!(f, " HAVING {}", join_display(&self.having, " AND "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join_display(&self.order_by, ", "))?;
        }
        if self.offset() > 0 {
            write!(f, " OFFSET {} ROWS", self.offset())?;
        }
        if let Some(max_rows) = self.max_rows {
            write!(f, " FETCH NEXT {} ROWS ONLY", max_rows)?;
        }
        Ok(())
    }
}
