// src/expr/lexer.rs

//! Tokeniser for health, status and template expressions.

use crate::expr::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    /// String literal, split into literal text and `\(...)` interpolations.
    Str(Vec<StrPart>),
    /// `_|_`, the absent value.
    Bottom,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Semi,
    Newline,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    Interp(Vec<Spanned>),
}

/// A token plus its character offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Token,
    pub pos: usize,
}

/// Tokenise a whole source string.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
    };
    lexer.lex(false)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, pos: usize, msg: impl Into<String>) -> ExprError {
        ExprError::Parse {
            pos,
            msg: msg.into(),
        }
    }

    /// Lex tokens. When `in_interp` is set, stop at the `)` that closes the
    /// enclosing `\(` and consume it.
    fn lex(&mut self, in_interp: bool) -> Result<Vec<Spanned>, ExprError> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        let start = self.pos;

        while let Some(c) = self.peek() {
            let pos = self.pos;

            if c == '\n' {
                self.pos += 1;
                out.push(Spanned { tok: Token::Newline, pos });
                continue;
            }
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            if c == '_' && self.peek_at(1) == Some('|') && self.peek_at(2) == Some('_') {
                self.pos += 3;
                out.push(Spanned { tok: Token::Bottom, pos });
                continue;
            }
            if c.is_ascii_alphabetic() || c == '_' || c == '$' {
                let ident = self.lex_ident();
                out.push(Spanned {
                    tok: Token::Ident(ident),
                    pos,
                });
                continue;
            }
            if c.is_ascii_digit() {
                let tok = self.lex_number()?;
                out.push(Spanned { tok, pos });
                continue;
            }
            if c == '"' {
                let parts = self.lex_string()?;
                out.push(Spanned {
                    tok: Token::Str(parts),
                    pos,
                });
                continue;
            }

            if in_interp && c == ')' && depth == 0 {
                self.pos += 1;
                return Ok(out);
            }

            let two = (c, self.peek_at(1).unwrap_or('\0'));
            let (tok, len) = match two {
                ('=', '=') => (Token::EqEq, 2),
                ('!', '=') => (Token::NotEq, 2),
                ('<', '=') => (Token::Le, 2),
                ('>', '=') => (Token::Ge, 2),
                ('&', '&') => (Token::AndAnd, 2),
                ('|', '|') => (Token::OrOr, 2),
                ('<', _) => (Token::Lt, 1),
                ('>', _) => (Token::Gt, 1),
                ('!', _) => (Token::Bang, 1),
                ('.', _) => (Token::Dot, 1),
                ('[', _) => (Token::LBracket, 1),
                (']', _) => (Token::RBracket, 1),
                ('(', _) => (Token::LParen, 1),
                (')', _) => (Token::RParen, 1),
                (',', _) => (Token::Comma, 1),
                (':', _) => (Token::Colon, 1),
                (';', _) => (Token::Semi, 1),
                ('+', _) => (Token::Plus, 1),
                ('-', _) => (Token::Minus, 1),
                ('*', _) => (Token::Star, 1),
                ('/', _) => (Token::Slash, 1),
                ('%', _) => (Token::Percent, 1),
                _ => return Err(self.error(pos, format!("unexpected character '{c}'"))),
            };

            match tok {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }

            self.pos += len;
            out.push(Spanned { tok, pos });
        }

        if in_interp {
            return Err(self.error(start, "unterminated interpolation `\\(`"));
        }
        Ok(out)
    }

    fn lex_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        s
    }

    fn lex_number(&mut self) -> Result<Token, ExprError> {
        let start = self.pos;
        let mut s = String::new();
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.pos += 1;
            } else if c == '.'
                && !is_float
                && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        if is_float {
            s.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| self.error(start, format!("invalid number '{s}': {e}")))
        } else {
            s.parse::<i64>()
                .map(Token::Int)
                .map_err(|e| self.error(start, format!("invalid number '{s}': {e}")))
        }
    }

    fn lex_string(&mut self) -> Result<Vec<StrPart>, ExprError> {
        let start = self.pos;
        // Opening quote.
        self.pos += 1;

        let mut parts = Vec::new();
        let mut lit = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(start, "unterminated string literal"));
            };
            self.pos += 1;

            match c {
                '"' => break,
                '\n' => return Err(self.error(start, "newline in string literal")),
                '\\' => {
                    let Some(esc) = self.peek() else {
                        return Err(self.error(start, "unterminated string literal"));
                    };
                    self.pos += 1;
                    match esc {
                        'n' => lit.push('\n'),
                        't' => lit.push('\t'),
                        'r' => lit.push('\r'),
                        '"' => lit.push('"'),
                        '\\' => lit.push('\\'),
                        '(' => {
                            if !lit.is_empty() {
                                parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                            }
                            let inner = self.lex(true)?;
                            parts.push(StrPart::Interp(inner));
                        }
                        other => {
                            return Err(self.error(
                                self.pos - 2,
                                format!("unknown escape sequence '\\{other}'"),
                            ));
                        }
                    }
                }
                other => lit.push(other),
            }
        }

        if !lit.is_empty() || parts.is_empty() {
            parts.push(StrPart::Lit(lit));
        }
        Ok(parts)
    }
}
