//! Formula errors.

use thiserror::Error;

/// A formula that cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("Unexpected end of expression '{0}'")]
    UnexpectedEnd(String),

    #[error("Unexpected '{found}' at position {position} in '{source_text}'")]
    UnexpectedToken {
        found: String,
        position: usize,
        source_text: String,
    },

    #[error("Unterminated string literal in '{0}'")]
    UnterminatedString(String),

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("'{0}' is not a defined function")]
    UnknownFunction(String),

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    WrongArity {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("'{0}' cannot be assigned to")]
    InvalidAssignmentTarget(String),

    #[error("Matrix literal rows must have equal length in '{0}'")]
    RaggedMatrix(String),
}

/// A formula that parsed but failed while computing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Operation '{op}' is not defined for {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("'{op}' is not defined for {operand}")]
    UnaryMismatch {
        op: &'static str,
        operand: &'static str,
    },

    #[error("Index {index} is out of range for a {shape} matrix")]
    IndexOutOfRange { index: String, shape: String },

    #[error("{0} values cannot be indexed")]
    NotIndexable(&'static str),

    #[error("A {0} value did not evaluate to a number, a string, or a null")]
    NotACondition(&'static str),

    #[error("Matrix dimensions do not agree for '{0}'")]
    Dimensions(&'static str),

    #[error("Function slot {0} no longer holds a function")]
    StaleFunction(usize),

    #[error("{0}")]
    Call(String),
}
