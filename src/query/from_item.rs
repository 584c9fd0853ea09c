use std::fmt;

use crate::schema::Table;

use super::{FilterItem, Query, SelectItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table {
        table: Table,
        alias: Option<String>,
    },
    SubQuery {
        query: Box<Query>,
        alias: Option<String>,
    },
    Join {
        left: Box<FromItem>,
        right: Box<FromItem>,
        join_type: JoinType,
        on: FilterItem,
    },
}

impl FromItem {
    pub fn table(table: Table) -> Self {
        FromItem::Table { table, alias: None }
    }

    pub fn table_as(table: Table, alias: impl Into<String>) -> Self {
        FromItem::Table {
            table,
            alias: Some(alias.into()),
        }
    }

    pub fn sub_query(query: Query, alias: impl Into<String>) -> Self {
        FromItem::SubQuery {
            query: Box::new(query),
            alias: Some(alias.into()),
        }
    }

    pub fn join(left: FromItem, right: FromItem, join_type: JoinType, on: FilterItem) -> Self {
        FromItem::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            on,
        }
    }

    /// The name select items use to qualify themselves against this item:
    /// the alias, else the table name. Joins have none.
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            FromItem::Table { table, alias } => Some(alias.as_deref().unwrap_or(table.name())),
            FromItem::SubQuery { alias, .. } => alias.as_deref(),
            FromItem::Join { .. } => None,
        }
    }

    /// The leaf items of a (possibly nested) join, left to right.
    pub fn leaves(&self) -> Vec<&FromItem> {
        match self {
            FromItem::Join { left, right, .. } => {
                let mut leaves = left.leaves();
                leaves.extend(right.leaves());
                leaves
            }
            other => vec![other],
        }
    }

    /// Every table read by this item, including those inside sub-queries.
    pub fn tables(&self) -> Vec<&Table> {
        match self {
            FromItem::Table { table, .. } => vec![table],
            FromItem::SubQuery { query, .. } => query.from.iter().flat_map(|f| f.tables()).collect(),
            FromItem::Join { left, right, .. } => {
                let mut tables = left.tables();
                tables.extend(right.tables());
                tables
            }
        }
    }

    /// The items a query can select from this item: a table's columns or a
    /// sub-query's outputs, qualified by this item.
    pub fn output_items(&self) -> Vec<SelectItem> {
        match self {
            FromItem::Table { table, .. } => {
                let qualifier = self.qualifier().unwrap_or(table.name());
                table
                    .columns()
                    .iter()
                    .map(|c| SelectItem::column(c.clone()).with_from(qualifier))
                    .collect()
            }
            FromItem::SubQuery { query, alias } => query
                .select
                .iter()
                .map(|item| {
                    SelectItem::sub_query_ref(item.clone(), alias.clone().unwrap_or_default())
                })
                .collect(),
            FromItem::Join { left, right, .. } => {
                let mut items = left.output_items();
                items.extend(right.output_items());
                items
            }
        }
    }
}

impl fmt::Display for FromItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromItem::Table { table, alias } => {
                write!(f, "{}", table.qualified_label())?;
                if let Some(alias) = alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
            FromItem::SubQuery { query, alias } => {
                write!(f, "({})", query)?;
                if let Some(alias) = alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
            FromItem::Join {
                left,
                right,
                join_type,
                on,
            } => write!(f, "{} {} {} ON {}", left, join_type.sql(), right, on),
        }
    }
}
