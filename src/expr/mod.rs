// src/expr/mod.rs

//! The small expression language used by `health_policy`, `custom_status`
//! and `${...}` template holes.
//!
//! A [`Program`] is a list of `name: expr` bindings evaluated in order over a
//! JSON scope. Missing data evaluates to [`Val::Absent`] rather than failing.

pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

pub use eval::{display_value, evaluate, Bindings, Val};
pub use parser::{Expr, Program};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at offset {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("field '{0}' is bound more than once")]
    DuplicateBinding(String),
}
