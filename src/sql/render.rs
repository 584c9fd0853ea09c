use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::query::{
    AggregateFunction, Direction, FilterItem, FromItem, JoinType, LogicalOperator, Operand,
    OperatorType, Query, ScalarFunction, SelectExpr, SelectItem,
};
use crate::schema::Table;
use crate::update::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, UpdateStatement,
};

use super::dialect::{ConcatStyle, Dialect, LimitStyle};
use super::SqlStatement;

/// Accumulates SQL text and, unless values are inlined, the parameters in
/// the order their placeholders appear.
pub struct Renderer {
    dialect: Dialect,
    inline: bool,
    qualify: bool,
    parameters: Vec<Value>,
}

impl Renderer {
    pub fn new(dialect: Dialect, inline: bool) -> Self {
        Self {
            dialect,
            inline,
            qualify: true,
            parameters: Vec::new(),
        }
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            parameters: self.parameters,
        }
    }

    fn value(&mut self, value: &Value) -> String {
        if self.inline {
            self.dialect.literal(value)
        } else {
            self.parameters.push(self.dialect.parameter(value));
            "?".to_string()
        }
    }

    pub fn table_name(&self, table: &Table) -> String {
        let name = self.dialect.quote(table.name());
        if table.schema_name().is_empty() {
            name
        } else {
            format!("{}.{}", self.dialect.quote(table.schema_name()), name)
        }
    }

    fn qualified(&self, item: &SelectItem, name: &str) -> String {
        match &item.from {
            Some(from) if self.qualify => {
                format!("{}.{}", self.dialect.quote(from), self.dialect.quote(name))
            }
            _ => self.dialect.quote(name),
        }
    }

    pub fn item(&self, item: &SelectItem) -> Result<String> {
        Ok(match &item.expr {
            SelectExpr::Column(column) => self.qualified(item, &column.name),
            SelectExpr::SubQueryRef(inner) => self.qualified(item, &inner.label()),
            SelectExpr::Aggregate { function, argument } => {
                if matches!(function, AggregateFunction::First | AggregateFunction::Last) {
                    return Err(MetaQueryError::unsupported(format!(
                        "{} has no SQL equivalent in {}",
                        function.name(),
                        self.dialect
                    )));
                }
                match argument {
                    Some(arg) => format!("{}({})", function.name(), self.item(arg)?),
                    None => format!("{}(*)", function.name()),
                }
            }
            SelectExpr::Scalar { function, args } => {
                let args = args.iter().map(|a| self.item(a)).collect::<Result<Vec<_>>>()?;
                self.scalar(*function, args)
            }
            SelectExpr::Literal(v) => self.dialect.literal(v),
            SelectExpr::Expression(text) => text.clone(),
        })
    }

    fn scalar(&self, function: ScalarFunction, args: Vec<String>) -> String {
        match function {
            ScalarFunction::Concat => match self.dialect.concat_style() {
                ConcatStyle::Operator => format!("({})", args.join(" || ")),
                ConcatStyle::Plus => format!("({})", args.join(" + ")),
                ConcatStyle::Function => format!("CONCAT({})", args.join(", ")),
            },
            ScalarFunction::Length => {
                let name = match self.dialect {
                    Dialect::SqlServer => "LEN",
                    Dialect::MySql => "CHAR_LENGTH",
                    _ => "LENGTH",
                };
                format!("{}({})", name, args.join(", "))
            }
            other => format!("{}({})", other.name(), args.join(", ")),
        }
    }

    fn select_item(&self, item: &SelectItem) -> Result<String> {
        let mut sql = self.item(item)?;
        if let Some(alias) = &item.alias {
            sql.push_str(" AS ");
            sql.push_str(&self.dialect.quote(alias));
        }
        Ok(sql)
    }

    fn from_item(&mut self, from: &FromItem, full_join_as: Option<JoinType>) -> Result<String> {
        match from {
            FromItem::Table { table, alias } => {
                let mut sql = self.table_name(table);
                if let Some(alias) = alias {
                    sql.push(' ');
                    sql.push_str(&self.dialect.quote(alias));
                }
                Ok(sql)
            }
            FromItem::SubQuery { query, alias } => {
                let inner = self.query_body(query)?;
                let mut sql = format!("({})", inner);
                if let Some(alias) = alias {
                    sql.push(' ');
                    sql.push_str(&self.dialect.quote(alias));
                }
                Ok(sql)
            }
            FromItem::Join {
                left,
                right,
                join_type,
                on,
            } => {
                let join_type = match (join_type, full_join_as) {
                    (JoinType::Full, Some(substitute)) => substitute,
                    (JoinType::Full, None) if !self.dialect.supports_full_join() => {
                        return Err(MetaQueryError::unsupported(format!(
                            "FULL JOIN is not supported by {}",
                            self.dialect
                        )))
                    }
                    (other, _) => *other,
                };
                let left = self.from_item(left, None)?;
                let right = self.from_item(right, None)?;
                let on = self.filter(on)?;
                Ok(format!("{} {} {} ON {}", left, join_type.sql(), right, on))
            }
        }
    }

    pub fn filter(&mut self, filter: &FilterItem) -> Result<String> {
        match filter {
            FilterItem::Atomic {
                item,
                operator,
                operand,
            } => {
                let left = self.item(item)?;
                match operand {
                    Operand::None => Ok(format!("{} {}", left, operator.sql())),
                    Operand::Value(v) if v.is_null() => match operator {
                        OperatorType::Equals => Ok(format!("{} IS NULL", left)),
                        OperatorType::DifferentFrom => Ok(format!("{} IS NOT NULL", left)),
                        _ => Ok(format!("{} {} NULL", left, operator.sql())),
                    },
                    Operand::Value(v) => {
                        let escape = match (operator, v) {
                            (OperatorType::Like | OperatorType::NotLike, Value::String(s))
                                if s.contains('\\') =>
                            {
                                if self.dialect == Dialect::MySql {
                                    " ESCAPE '\\\\'"
                                } else {
                                    " ESCAPE '\\'"
                                }
                            }
                            _ => "",
                        };
                        let value = self.value(v);
                        Ok(format!("{} {} {}{}", left, operator.sql(), value, escape))
                    }
                    Operand::List(values) if values.is_empty() => Ok(match operator {
                        OperatorType::NotIn => "1=1".to_string(),
                        _ => "1=0".to_string(),
                    }),
                    Operand::List(values) => {
                        let values: Vec<String> = values.iter().map(|v| self.value(v)).collect();
                        Ok(format!("{} {} ({})", left, operator.sql(), values.join(", ")))
                    }
                    Operand::Item(other) => {
                        Ok(format!("{} {} {}", left, operator.sql(), self.item(other)?))
                    }
                }
            }
            FilterItem::Compound { logic, children } => {
                let separator = match logic {
                    LogicalOperator::And => " AND ",
                    LogicalOperator::Or => " OR ",
                };
                let parts = children
                    .iter()
                    .map(|c| self.filter(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(separator)))
            }
            FilterItem::Expression(text) => Ok(text.clone()),
        }
    }

    fn filters(&mut self, filters: &[FilterItem]) -> Result<String> {
        let parts = filters
            .iter()
            .map(|f| self.filter(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" AND "))
    }

    /// The query without its row window.
    fn query_body(&mut self, query: &Query) -> Result<String> {
        self.select_part(query, None, None)
    }

    fn select_part(&mut self, query: &Query, top: Option<usize>, full_join_as: Option<JoinType>) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(top) = top {
            sql.push_str(&format!("TOP {} ", top));
        }
        let items = query
            .select
            .iter()
            .map(|i| self.select_item(i))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(&items.join(", "));

        let from = query
            .from
            .iter()
            .map(|f| self.from_item(f, full_join_as))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" FROM ");
        sql.push_str(&from.join(", "));

        if !query.where_items.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters(&query.where_items)?);
        }
        if !query.group_by.is_empty() {
            let items = query
                .group_by
                .iter()
                .map(|g| self.item(g))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&items.join(", "));
        }
        if !query.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.filters(&query.having)?);
        }
        if !query.order_by.is_empty() {
            let items = query
                .order_by
                .iter()
                .map(|o| -> Result<String> {
                    let direction = match o.direction {
                        Direction::Ascending => "ASC",
                        Direction::Descending => "DESC",
                    };
                    Ok(format!("{} {}", self.item(&o.item)?, direction))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }
        Ok(sql)
    }

    pub fn query(mut self, query: &Query) -> Result<SqlStatement> {
        if !self.dialect.supports_full_join() && has_full_join(query) {
            return self.full_join_union(query);
        }
        let offset = query.offset();
        let max_rows = query.max_rows;
        if offset > 0 && !self.dialect.supports_first_row() {
            return Err(MetaQueryError::unsupported(format!(
                "{} cannot skip rows",
                self.dialect
            )));
        }

        let sql = match self.dialect.limit_style() {
            LimitStyle::Top => self.select_part(query, max_rows, None)?,
            LimitStyle::RowNum => {
                let body = self.query_body(query)?;
                match max_rows {
                    Some(m) => format!("SELECT * FROM ({}) WHERE ROWNUM <= {}", body, m),
                    None => body,
                }
            }
            style => {
                let mut sql = self.query_body(query)?;
                sql.push_str(&window(self.dialect, style, offset, max_rows));
                sql
            }
        };
        Ok(self.finish(sql))
    }

    /// `a FULL JOIN b` as `a LEFT JOIN b UNION a RIGHT JOIN b`; only for
    /// plain projections since UNION removes duplicates.
    fn full_join_union(mut self, query: &Query) -> Result<SqlStatement> {
        let plain = query.from.len() == 1
            && query.group_by.is_empty()
            && query.having.is_empty()
            && query.order_by.is_empty()
            && query.max_rows.is_none()
            && query.first_row.is_none()
            && !query.select.iter().any(|s| s.is_aggregate());
        if !plain {
            return Err(MetaQueryError::unsupported(format!(
                "FULL JOIN is not supported by {}",
                self.dialect
            )));
        }
        let left = self.select_part(query, None, Some(JoinType::Left))?;
        let right = self.select_part(query, None, Some(JoinType::Right))?;
        Ok(self.finish(format!("{} UNION {}", left, right)))
    }

    pub fn insert(mut self, insert: &InsertStatement) -> Result<SqlStatement> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, value) in insert.values.assignments() {
            columns.push(self.dialect.quote(&column.name));
            values.push(self.value(value));
        }
        let table = self.table_name(&insert.table);
        let sql = if columns.is_empty() {
            match self.dialect {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", table),
                _ => format!("INSERT INTO {} DEFAULT VALUES", table),
            }
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(","),
                values.join(",")
            )
        };
        Ok(self.finish(sql))
    }

    pub fn update(mut self, update: &UpdateStatement) -> Result<SqlStatement> {
        self.qualify = false;
        let mut assignments = Vec::new();
        for (column, value) in update.values.assignments() {
            let name = self.dialect.quote(&column.name);
            assignments.push(format!("{}={}", name, self.value(value)));
        }
        if assignments.is_empty() {
            return Err(MetaQueryError::construction(format!(
                "Update of {} sets no columns",
                update.table.name()
            )));
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.table_name(&update.table),
            assignments.join(",")
        );
        if !update.where_items.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters(&update.where_items)?);
        }
        Ok(self.finish(sql))
    }

    pub fn delete(mut self, delete: &DeleteStatement) -> Result<SqlStatement> {
        self.qualify = false;
        let mut sql = format!("DELETE FROM {}", self.table_name(&delete.table));
        if !delete.where_items.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters(&delete.where_items)?);
        }
        Ok(self.finish(sql))
    }

    pub fn create_table(self, create: &CreateTableStatement) -> Result<SqlStatement> {
        let table = &create.table;
        if table.column_count() == 0 {
            return Err(MetaQueryError::construction(format!(
                "Table {} has no columns",
                table.name()
            )));
        }
        let mut parts: Vec<String> = table
            .columns()
            .iter()
            .map(|c| {
                let mut part = self.dialect.quote(&c.name);
                let type_name = self.dialect.type_name(c);
                if !type_name.is_empty() {
                    part.push(' ');
                    part.push_str(&type_name);
                }
                if c.nullable == Some(false) {
                    part.push_str(" NOT NULL");
                }
                part
            })
            .collect();
        let keys: Vec<String> = table
            .primary_keys()
            .iter()
            .map(|c| self.dialect.quote(&c.name))
            .collect();
        if !keys.is_empty() {
            parts.push(format!("PRIMARY KEY({})", keys.join(",")));
        }
        let sql = format!("CREATE TABLE {} ({})", self.table_name(table), parts.join(","));
        Ok(self.finish(sql))
    }

    pub fn drop_table(self, drop: &DropTableStatement) -> Result<SqlStatement> {
        let sql = format!("DROP TABLE {}", self.table_name(&drop.table));
        Ok(self.finish(sql))
    }
}

fn window(dialect: Dialect, style: LimitStyle, offset: usize, max_rows: Option<usize>) -> String {
    let mut sql = String::new();
    match style {
        LimitStyle::OffsetFetch | LimitStyle::FetchFirst => {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {} ROWS", offset));
            }
            if let Some(m) = max_rows {
                let word = if style == LimitStyle::OffsetFetch { "NEXT" } else { "FIRST" };
                sql.push_str(&format!(" FETCH {} {} ROWS ONLY", word, m));
            }
        }
        LimitStyle::LimitOffset => {
            match max_rows {
                Some(m) => sql.push_str(&format!(" LIMIT {}", m)),
                // SQLite only accepts OFFSET after a LIMIT
                None if offset > 0 && dialect == Dialect::Sqlite => sql.push_str(" LIMIT -1"),
                None => {}
            }
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        LimitStyle::MySqlLimit => match (offset, max_rows) {
            (0, Some(m)) => sql.push_str(&format!(" LIMIT {}", m)),
            (o, Some(m)) => sql.push_str(&format!(" LIMIT {}, {}", o, m)),
            (0, None) => {}
            (o, None) => sql.push_str(&format!(" LIMIT {}, 18446744073709551615", o)),
        },
        LimitStyle::Top | LimitStyle::RowNum => {}
    }
    sql
}

fn has_full_join(query: &Query) -> bool {
    fn visit(from: &FromItem) -> bool {
        match from {
            FromItem::Join {
                left,
                right,
                join_type,
                ..
            } => *join_type == JoinType::Full || visit(left) || visit(right),
            FromItem::SubQuery { query, .. } => has_full_join(query),
            FromItem::Table { .. } => false,
        }
    }
    query.from.iter().any(visit)
}
