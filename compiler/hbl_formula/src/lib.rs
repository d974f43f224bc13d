//! Expressions for the HBL interpreter.
//!
//! Every formula statement (`x = y * 2`), loop condition and command
//! argument is parsed here into a postfix [`Formula`] and evaluated against
//! a [`FormulaHost`] that owns the variables and knows how to call user
//! functions.
//!
//! # Design
//!
//! - Names are resolved at parse time: variables to [`VarId`]s in the
//!   [`VariableTable`], user functions to registry slots. Evaluation never
//!   looks a name up.
//! - [`Formula::is_volatile`] marks formulas built from non-constant matrix
//!   or dictionary literals; callers must not cache their results.
//! - The [`simple`] module converts numeric-only formulas into a flat
//!   program over an `f64` array. It shares its arithmetic with the general
//!   evaluator so both paths produce identical bits.

mod error;
mod eval;
mod lexer;
mod ops;
mod parser;
pub mod simple;
mod value;
mod vars;

pub use error::{EvalError, FormulaError};
pub use eval::{assign_indexed, FormulaHost};
pub use ops::{BinaryOp, Builtin, Op, UnaryOp};
pub use parser::{parse_expression, parse_statement, FunctionLookup, NoFunctions, ParseContext};
pub use value::{Dict, Matrix, Value};
pub use vars::{VarId, VariableTable};

/// A compiled expression in postfix order.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    ops: Vec<Op>,
    volatile: bool,
}

impl Formula {
    pub(crate) fn new(ops: Vec<Op>, volatile: bool) -> Self {
        Formula { ops, volatile }
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Depends on transient literal construction; recompile per use.
    #[inline]
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// The single variable this formula reads, if it is nothing else.
    pub fn as_variable(&self) -> Option<VarId> {
        match self.ops.as_slice() {
            [Op::Var(id)] => Some(*id),
            _ => None,
        }
    }
}

/// What a formula statement does once parsed.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Evaluate for the value (or its side effects).
    Expression(Formula),
    /// `x = e` (and compound forms, already expanded).
    Assign { target: VarId, value: Formula },
    /// `m[i][j] = e`. `target` is the read form of the left side: the
    /// container variable, the index expressions, then an `Index` op.
    AssignIndexed { target: Formula, value: Formula },
}
