use thiserror::Error;

use super::lexer::{Lexer, Token, TokenKind};
use super::syntax::*;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found:?} at position {position}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: usize,
    },
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Lexer error: {0}")]
    LexerError(String),
}

/// Words that end a clause and so can never be taken as an implicit alias.
const CLAUSE_WORDS: &[&str] = &["FETCH", "ROWS", "ROW", "ONLY"];

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().map_err(ParseError::LexerError)?;
        Ok(Self { tokens, position: 0 })
    }

    /// Parses one SELECT statement, optionally terminated by `;`.
    pub fn parse(&mut self) -> Result<SelectStatement, ParseError> {
        let stmt = self.parse_select()?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        self.expect(TokenKind::Eof)?;
        Ok(stmt)
    }

    /// Parses a standalone expression such as `COUNT(*)` or `t.name`.
    pub fn parse_standalone_expr(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Eof)?;
        Ok(expr)
    }

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect(TokenKind::Select)?;

        let mut stmt = SelectStatement::default();

        if self.check(&TokenKind::Distinct) {
            self.advance();
            stmt.distinct = true;
        } else if self.check(&TokenKind::All) {
            self.advance();
        }

        stmt.columns = self.parse_select_columns()?;

        if self.check(&TokenKind::From) {
            self.advance();
            loop {
                stmt.from.push(self.parse_from_source()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if self.check(&TokenKind::Where) {
            self.advance();
            stmt.where_clause = Some(self.parse_expr()?);
        }

        if self.check(&TokenKind::Group) {
            self.advance();
            self.expect(TokenKind::By)?;
            stmt.group_by = self.parse_expr_list()?;
        }

        if self.check(&TokenKind::Having) {
            self.advance();
            stmt.having = Some(self.parse_expr()?);
        }

        if self.check(&TokenKind::Order) {
            self.advance();
            self.expect(TokenKind::By)?;
            stmt.order_by = self.parse_order_by_list()?;
        }

        self.parse_row_limits(&mut stmt)?;

        Ok(stmt)
    }

    /// `LIMIT n [OFFSET m]`, `OFFSET m ROWS [FETCH NEXT n ROWS ONLY]` and
    /// `FETCH FIRST n ROWS ONLY`.
    fn parse_row_limits(&mut self, stmt: &mut SelectStatement) -> Result<(), ParseError> {
        if self.check(&TokenKind::Limit) {
            self.advance();
            stmt.limit = Some(self.parse_integer()?);
        }

        if self.check(&TokenKind::Offset) {
            self.advance();
            stmt.offset = Some(self.parse_integer()?);
            if self.check_word("ROWS") || self.check_word("ROW") {
                self.advance();
            }
        }

        if self.check_word("FETCH") {
            self.advance();
            if self.check_word("FIRST") || self.check_word("NEXT") {
                self.advance();
            } else {
                return Err(self.unexpected_token("FIRST or NEXT"));
            }
            stmt.limit = Some(self.parse_integer()?);
            if self.check_word("ROWS") || self.check_word("ROW") {
                self.advance();
            } else {
                return Err(self.unexpected_token("ROWS"));
            }
            if self.check_word("ONLY") {
                self.advance();
            } else {
                return Err(self.unexpected_token("ONLY"));
            }
        }

        Ok(())
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = Vec::new();

        loop {
            columns.push(self.parse_select_column()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_select_column(&mut self) -> Result<SelectColumn, ParseError> {
        if self.check(&TokenKind::Star) {
            self.advance();
            return Ok(SelectColumn::AllColumns);
        }

        // table.*
        if self.peek_identifier().is_some()
            && self.peek_next_kind() == Some(&TokenKind::Dot)
            && self.tokens.get(self.position + 2).map(|t| &t.kind) == Some(&TokenKind::Star)
        {
            let name = self.parse_identifier()?;
            self.advance();
            self.advance();
            return Ok(SelectColumn::TableAllColumns(name));
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectColumn::Expr { expr, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.check(&TokenKind::As) {
            self.advance();
            return Ok(Some(self.parse_identifier()?));
        }
        match self.peek_kind() {
            Some(TokenKind::Identifier(name))
                if !CLAUSE_WORDS.iter().any(|w| name.eq_ignore_ascii_case(w)) =>
            {
                Ok(Some(self.parse_identifier()?))
            }
            Some(TokenKind::QuotedIdentifier(_)) => Ok(Some(self.parse_identifier()?)),
            _ => Ok(None),
        }
    }

    fn parse_from_source(&mut self) -> Result<FromSource, ParseError> {
        let mut source = self.parse_from_primary()?;

        while let Some(join_type) = self.parse_join_type()? {
            let right = self.parse_from_primary()?;
            self.expect(TokenKind::On)?;
            let condition = self.parse_expr()?;
            source = FromSource::Join {
                left: Box::new(source),
                right: Box::new(right),
                join_type,
                condition,
            };
        }

        Ok(source)
    }

    fn parse_from_primary(&mut self) -> Result<FromSource, ParseError> {
        if self.check(&TokenKind::LParen) {
            self.advance();
            let query = self.parse_select()?;
            self.expect(TokenKind::RParen)?;
            let alias = self.parse_optional_alias()?;
            return Ok(FromSource::SubQuery {
                query: Box::new(query),
                alias,
            });
        }

        let first = self.parse_identifier()?;
        let (schema, name) = if self.check(&TokenKind::Dot) {
            self.advance();
            (Some(first), self.parse_identifier()?)
        } else {
            (None, first)
        };
        let alias = self.parse_optional_alias()?;
        Ok(FromSource::Table(TableRef {
            schema,
            name,
            alias,
        }))
    }

    /// Consumes a join introducer (`[INNER|LEFT|RIGHT|FULL] [OUTER] JOIN`).
    fn parse_join_type(&mut self) -> Result<Option<JoinKind>, ParseError> {
        let join_type = match self.peek_kind() {
            Some(TokenKind::Join) => {
                self.advance();
                return Ok(Some(JoinKind::Inner));
            }
            Some(TokenKind::Inner) => JoinKind::Inner,
            Some(TokenKind::Left) => JoinKind::Left,
            Some(TokenKind::Right) => JoinKind::Right,
            Some(TokenKind::Full) => JoinKind::Full,
            _ => return Ok(None),
        };
        self.advance();
        if join_type != JoinKind::Inner && self.check(&TokenKind::Outer) {
            self.advance();
        }
        self.expect(TokenKind::Join)?;
        Ok(Some(join_type))
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>, ParseError> {
        let mut items = Vec::new();

        loop {
            let expr = self.parse_expr()?;
            let ascending = if self.check(&TokenKind::Desc) {
                self.advance();
                false
            } else {
                if self.check(&TokenKind::Asc) {
                    self.advance();
                }
                true
            };
            items.push(OrderByExpr { expr, ascending });

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(items)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();

        loop {
            exprs.push(self.parse_expr()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;

        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let expr = self.parse_not_expr()?;
            Ok(Expr::Not(Box::new(expr)))
        } else {
            self.parse_comparison_expr()
        }
    }

    fn consume_negation(&mut self, keyword: &TokenKind) -> Option<bool> {
        if self.check(keyword) {
            self.advance();
            Some(false)
        } else if self.check(&TokenKind::Not) && self.peek_next_kind() == Some(keyword) {
            self.advance();
            self.advance();
            Some(true)
        } else {
            None
        }
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_concat_expr()?;

        loop {
            if self.check(&TokenKind::Is) {
                self.advance();
                let negated = if self.check(&TokenKind::Not) {
                    self.advance();
                    true
                } else {
                    false
                };
                self.expect(TokenKind::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                };
            } else if let Some(negated) = self.consume_negation(&TokenKind::In) {
                self.expect(TokenKind::LParen)?;
                let list = if self.check(&TokenKind::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenKind::RParen)?;
                left = Expr::InList {
                    expr: Box::new(left),
                    list,
                    negated,
                };
            } else if let Some(negated) = self.consume_negation(&TokenKind::Like) {
                let pattern = self.parse_concat_expr()?;
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                };
            } else if let Some(negated) = self.consume_negation(&TokenKind::Between) {
                let low = self.parse_concat_expr()?;
                self.expect(TokenKind::And)?;
                let high = self.parse_concat_expr()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
            } else if let Some(op) = self.parse_comparison_op() {
                let right = self.parse_concat_expr()?;
                left = Expr::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_comparison_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => Some(BinaryOperator::Eq),
            Some(TokenKind::NotEq) => Some(BinaryOperator::NotEq),
            Some(TokenKind::Lt) => Some(BinaryOperator::Lt),
            Some(TokenKind::LtEq) => Some(BinaryOperator::LtEq),
            Some(TokenKind::Gt) => Some(BinaryOperator::Gt),
            Some(TokenKind::GtEq) => Some(BinaryOperator::GtEq),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn parse_concat_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;

        while self.check(&TokenKind::Concat) {
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Concat,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            return match self.peek_kind().cloned() {
                Some(TokenKind::Integer(n)) => {
                    self.advance();
                    Ok(Expr::Integer(-n))
                }
                Some(TokenKind::Float(f)) => {
                    self.advance();
                    Ok(Expr::Float(-f))
                }
                _ => Err(self.unexpected_token("numeric literal")),
            };
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Integer(n)) => {
                self.advance();
                Ok(Expr::Integer(n))
            }
            Some(TokenKind::Float(f)) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            Some(TokenKind::String(s)) => {
                self.advance();
                Ok(Expr::String(s))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Expr::Null)
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            Some(TokenKind::Identifier(word)) => {
                if let (Some(kind), Some(TokenKind::String(text))) =
                    (temporal_kind(&word), self.peek_next_kind().cloned())
                {
                    self.advance();
                    self.advance();
                    return Ok(Expr::Temporal(kind, text));
                }
                self.parse_column_or_function()
            }
            Some(TokenKind::QuotedIdentifier(_)) => self.parse_column_or_function(),
            _ => Err(self.unexpected_token("expression")),
        }
    }

    fn parse_column_or_function(&mut self) -> Result<Expr, ParseError> {
        let name = self.parse_identifier()?;

        if self.check(&TokenKind::LParen) {
            self.advance();
            let distinct = if self.check(&TokenKind::Distinct) {
                self.advance();
                true
            } else {
                false
            };
            let args = if self.check(&TokenKind::Star) {
                self.advance();
                vec![Expr::Wildcard]
            } else if self.check(&TokenKind::RParen) {
                Vec::new()
            } else {
                self.parse_expr_list()?
            };
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Function {
                name,
                args,
                distinct,
            });
        }

        if self.check(&TokenKind::Dot) {
            self.advance();
            let column = self.parse_identifier()?;
            return Ok(Expr::Column(ColumnRef {
                table: Some(name),
                column,
            }));
        }

        Ok(Expr::Column(ColumnRef {
            table: None,
            column: name,
        }))
    }

    fn peek_identifier(&self) -> Option<&str> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) | Some(TokenKind::QuotedIdentifier(name)) => {
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_identifier() {
            Some(name) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected_token("identifier")),
        }
    }

    fn parse_integer(&mut self) -> Result<u64, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Integer(n)) if *n >= 0 => {
                let n = *n as u64;
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected_token("integer")),
        }
    }

    /// Matches an unquoted identifier used as a contextual keyword.
    fn check_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Identifier(name)) if name.eq_ignore_ascii_case(word))
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|t| &t.kind)
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position + 1).map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", expected)))
        }
    }

    fn unexpected_token(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.position) {
            Some(token) if token.kind != TokenKind::Eof || expected == "Eof" => {
                ParseError::UnexpectedToken {
                    expected: expected.to_string(),
                    found: token.kind.clone(),
                    position: token.position,
                }
            }
            _ => ParseError::UnexpectedEof,
        }
    }
}

fn temporal_kind(word: &str) -> Option<TemporalKind> {
    match word.to_uppercase().as_str() {
        "DATE" => Some(TemporalKind::Date),
        "TIME" => Some(TemporalKind::Time),
        "TIMESTAMP" => Some(TemporalKind::Timestamp),
        _ => None,
    }
}
