//! SQL text to [`Query`](crate::query::Query): a recursive-descent parser
//! producing an unbound syntax tree, and a binder resolving it against a
//! schema.

pub mod binder;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod syntax;

pub use binder::{Binder, Scope, TableLookup};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};

use crate::error::Result;

use super::Query;

/// Parses and binds a SELECT statement.
pub fn parse_query<L: TableLookup + ?Sized>(lookup: &L, sql: &str) -> Result<Query> {
    let stmt = Parser::new(sql)?.parse()?;
    Binder::new(lookup).bind_statement(&stmt)
}
