//! Query and update rendering for SQL back-ends.

pub mod dialect;
pub mod registry;
pub mod render;

pub use dialect::{ConcatStyle, Dialect, IdentifierCase, LimitStyle};
pub use registry::DialectRegistry;
pub use render::Renderer;

use std::fmt;

use crate::data::Value;
use crate::error::Result;
use crate::query::Query;
use crate::update::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, UpdateStatement,
};

/// SQL text plus the values for its `?` placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Renders queries and updates as SQL for one dialect.
///
/// With `inline` set every value is written as a literal and the parameter
/// list stays empty. Constructs the dialect cannot express are reported as
/// `Unsupported` errors so callers can fall back to in-memory execution.
pub trait QueryRewriter: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn name(&self) -> &str {
        self.dialect().name()
    }

    fn render_query(&self, query: &Query, inline: bool) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), inline).query(query)
    }

    fn render_insert(&self, insert: &InsertStatement, inline: bool) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), inline).insert(insert)
    }

    fn render_update(&self, update: &UpdateStatement, inline: bool) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), inline).update(update)
    }

    fn render_delete(&self, delete: &DeleteStatement, inline: bool) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), inline).delete(delete)
    }

    fn render_create_table(&self, create: &CreateTableStatement) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), true).create_table(create)
    }

    fn render_drop_table(&self, drop: &DropTableStatement) -> Result<SqlStatement> {
        Renderer::new(self.dialect(), true).drop_table(drop)
    }
}

/// The built-in rewriter of a [`Dialect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectRewriter {
    dialect: Dialect,
}

impl DialectRewriter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl Default for DialectRewriter {
    fn default() -> Self {
        Self::new(Dialect::Ansi)
    }
}

impl QueryRewriter for DialectRewriter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }
}
