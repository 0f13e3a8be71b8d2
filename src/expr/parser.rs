// src/expr/parser.rs

//! Recursive-descent parser producing [`Expr`] trees and [`Program`]s.
//!
//! Precedence, loosest first: `||`, `&&`, comparisons, `+ -`, `* / %`,
//! unary `! -`, then postfix field / index access.

use std::collections::HashSet;

use serde_json::Value;

use crate::expr::lexer::{tokenize, Spanned, StrPart, Token};
use crate::expr::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `_|_`
    Bottom,
    Ident(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Interp(Vec<InterpPart>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Lit(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// One `name: expr` line of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub expr: Expr,
}

/// An ordered list of bindings, e.g.
///
/// ```text
/// ready: context.output.status.readyReplicas
/// isHealth: ready != _|_ && ready > 0
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub bindings: Vec<Binding>,
}

impl Program {
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser::new(tokens, src.chars().count());
        let mut bindings = Vec::new();
        let mut seen = HashSet::new();

        loop {
            parser.skip_separators();
            if parser.at_end() {
                break;
            }

            let pos = parser.current_pos();
            let name = match parser.next() {
                Some(Token::Ident(name)) => name,
                Some(Token::Str(parts)) => plain_string(parts)
                    .ok_or_else(|| parser.error_at(pos, "binding name cannot be interpolated"))?,
                other => {
                    return Err(parser.error_at(
                        pos,
                        format!("expected binding name, found {}", describe(other.as_ref())),
                    ));
                }
            };
            parser.expect(Token::Colon, "':' after binding name")?;
            let expr = parser.parse_expr()?;

            if !seen.insert(name.clone()) {
                return Err(ExprError::DuplicateBinding(name));
            }
            bindings.push(Binding { name, expr });

            match parser.peek() {
                None | Some(Token::Newline | Token::Semi | Token::Comma) => {}
                Some(other) => {
                    let msg = format!("expected end of binding, found {}", describe(Some(other)));
                    return Err(parser.error_at(parser.current_pos(), msg));
                }
            }
        }

        Ok(Program { bindings })
    }

    pub fn binds(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }
}

impl Expr {
    /// Parse a single expression (used by template `${...}` segments).
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser::new(tokens, src.chars().count());
        parser.skip_newlines();
        let expr = parser.parse_expr()?;
        parser.skip_newlines();
        if !parser.at_end() {
            let msg = format!("unexpected trailing {}", describe(parser.peek()));
            return Err(parser.error_at(parser.current_pos(), msg));
        }
        Ok(expr)
    }
}

fn plain_string(parts: Vec<StrPart>) -> Option<String> {
    match parts.as_slice() {
        [StrPart::Lit(s)] => Some(s.clone()),
        _ => None,
    }
}

fn describe(tok: Option<&Token>) -> String {
    match tok {
        None => "end of input".to_string(),
        Some(Token::Ident(s)) => format!("identifier '{s}'"),
        Some(Token::Newline) => "newline".to_string(),
        Some(other) => format!("{other:?}"),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    idx: usize,
    end_pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, end_pos: usize) -> Self {
        Self {
            tokens,
            idx: 0,
            end_pos,
        }
    }

    fn at_end(&self) -> bool {
        self.idx >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|s| &s.tok)
    }

    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.idx)
            .map(|s| s.pos)
            .unwrap_or(self.end_pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx).map(|s| s.tok.clone());
        if tok.is_some() {
            self.idx += 1;
        }
        tok
    }

    fn error_at(&self, pos: usize, msg: impl Into<String>) -> ExprError {
        ExprError::Parse {
            pos,
            msg: msg.into(),
        }
    }

    fn expect(&mut self, want: Token, what: &str) -> Result<(), ExprError> {
        let pos = self.current_pos();
        match self.next() {
            Some(ref tok) if *tok == want => Ok(()),
            other => Err(self.error_at(
                pos,
                format!("expected {what}, found {}", describe(other.as_ref())),
            )),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.idx += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek(),
            Some(Token::Newline | Token::Semi | Token::Comma)
        ) {
            self.idx += 1;
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.idx += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.idx += 1;
            let rhs = self.parse_cmp()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.idx += 1;
        let rhs = self.parse_additive()?;

        // Comparisons do not chain: `a < b < c` is rejected.
        if matches!(
            self.peek(),
            Some(Token::EqEq | Token::NotEq | Token::Lt | Token::Le | Token::Gt | Token::Ge)
        ) {
            return Err(self.error_at(self.current_pos(), "comparison operators cannot be chained"));
        }

        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.idx += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.idx += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        // Operands may continue on the next line after a binary operator.
        self.skip_newlines();
        match self.peek() {
            Some(Token::Bang) => {
                self.idx += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)))
            }
            Some(Token::Minus) => {
                self.idx += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.idx += 1;
                    let pos = self.current_pos();
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Field(Box::new(expr), name);
                        }
                        other => {
                            return Err(self.error_at(
                                pos,
                                format!("expected field name after '.', found {}", describe(other.as_ref())),
                            ));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.idx += 1;
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let pos = self.current_pos();
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::from(i))),
            Some(Token::Float(f)) => serde_json::Number::from_f64(f)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| self.error_at(pos, "non-finite number literal")),
            Some(Token::Bottom) => Ok(Expr::Bottom),
            Some(Token::Str(parts)) => self.string_expr(parts),
            Some(Token::Ident(name)) => {
                let keyword = match name.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    return Ok(Expr::Literal(value));
                }
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.idx += 1;
                    let args = self.parse_args()?;
                    return Ok(Expr::Call(name, args));
                }
                Ok(Expr::Ident(name))
            }
            Some(Token::LParen) => {
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(self.error_at(
                pos,
                format!("expected expression, found {}", describe(other.as_ref())),
            )),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        self.skip_newlines();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.idx += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_newlines();
            let pos = self.current_pos();
            match self.next() {
                Some(Token::Comma) => self.skip_newlines(),
                Some(Token::RParen) => return Ok(args),
                other => {
                    return Err(self.error_at(
                        pos,
                        format!("expected ',' or ')' in call, found {}", describe(other.as_ref())),
                    ));
                }
            }
        }
    }

    fn string_expr(&self, parts: Vec<StrPart>) -> Result<Expr, ExprError> {
        if let Some(s) = plain_string(parts.clone()) {
            return Ok(Expr::Literal(Value::String(s)));
        }

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                StrPart::Lit(s) => out.push(InterpPart::Lit(s)),
                StrPart::Interp(tokens) => {
                    let end = tokens.last().map(|s| s.pos).unwrap_or(self.end_pos);
                    let mut inner = Parser::new(tokens, end);
                    inner.skip_newlines();
                    let expr = inner.parse_expr()?;
                    inner.skip_newlines();
                    if !inner.at_end() {
                        let msg = format!("unexpected trailing {} in interpolation", describe(inner.peek()));
                        return Err(inner.error_at(inner.current_pos(), msg));
                    }
                    out.push(InterpPart::Expr(expr));
                }
            }
        }
        Ok(Expr::Interp(out))
    }
}
