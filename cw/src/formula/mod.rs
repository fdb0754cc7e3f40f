//! A small expression language for pivot formulas.
//!
//! ```text
//! total = sum(_qty)
//! mean  = round(avg(_price), 2)
//! label = if(len(rows) > 1, 'many', 'one')
//! ```
//!
//! `_FIELD` is the column of the current group's values for input field
//! `FIELD`, `rows` is the list of the group's rows. A row is indexed by
//! field name and a list by position: `rows[0]['qty']`, `_qty[-1]`.
//! Names bound with `--before-all` (`NAME = EXPR; ...`) are visible to
//! every formula.

mod eval;
mod lexer;
mod parser;

use thiserror::Error;

pub use eval::{Bindings, Scope, evaluate, evaluate_bindings};
pub use lexer::{Token, tokenize};
pub use parser::{BinaryOp, Expr, Function, UnaryOp, parse, parse_bindings};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("syntax error at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}() takes {expected} argument(s), {found} given")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("index {index} out of range for a list of {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("no field '{0}' in row")]
    MissingField(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,
}

impl FormulaError {
    pub(crate) fn syntax(pos: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            pos,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        FormulaError::Type(message.into())
    }
}
