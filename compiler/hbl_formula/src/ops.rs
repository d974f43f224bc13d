//! Postfix operations and the numeric kernels shared by both evaluators.

use std::fmt;

use smallvec::SmallVec;

use crate::{Value, VarId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    IntDiv,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::IntDiv => "$",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Scalar kernel. Every numeric result in the interpreter goes through
    /// here.
    #[inline]
    pub fn apply_numeric(self, a: f64, b: f64) -> f64 {
        let flag = |c: bool| if c { 1.0 } else { 0.0 };
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            BinaryOp::IntDiv => (a / b).trunc(),
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Eq => flag(a == b),
            BinaryOp::NotEq => flag(a != b),
            BinaryOp::Lt => flag(a < b),
            BinaryOp::LtEq => flag(a <= b),
            BinaryOp::Gt => flag(a > b),
            BinaryOp::GtEq => flag(a >= b),
            BinaryOp::And => flag(a != 0.0 && b != 0.0),
            BinaryOp::Or => flag(a != 0.0 || b != 0.0),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    #[inline]
    pub fn apply_numeric(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Not => {
                if a == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Functions provided by the interpreter itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Arctan,
    Max,
    Min,
    Format,
    Rows,
    Columns,
    Type,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "Abs" => Builtin::Abs,
            "Exp" => Builtin::Exp,
            "Log" => Builtin::Log,
            "Sqrt" => Builtin::Sqrt,
            "Sin" => Builtin::Sin,
            "Cos" => Builtin::Cos,
            "Tan" => Builtin::Tan,
            "Arctan" => Builtin::Arctan,
            "Max" => Builtin::Max,
            "Min" => Builtin::Min,
            "Format" => Builtin::Format,
            "Rows" => Builtin::Rows,
            "Columns" => Builtin::Columns,
            "Type" => Builtin::Type,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "Abs",
            Builtin::Exp => "Exp",
            Builtin::Log => "Log",
            Builtin::Sqrt => "Sqrt",
            Builtin::Sin => "Sin",
            Builtin::Cos => "Cos",
            Builtin::Tan => "Tan",
            Builtin::Arctan => "Arctan",
            Builtin::Max => "Max",
            Builtin::Min => "Min",
            Builtin::Format => "Format",
            Builtin::Rows => "Rows",
            Builtin::Columns => "Columns",
            Builtin::Type => "Type",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Max | Builtin::Min => 2,
            Builtin::Format => 3,
            _ => 1,
        }
    }

    /// Whether the builtin maps numbers to a number and nothing else.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Builtin::Format | Builtin::Rows | Builtin::Columns | Builtin::Type
        )
    }

    /// Numeric kernel; only meaningful when [`Builtin::is_numeric`].
    #[inline]
    pub fn apply_numeric(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(0.0);
        let b = args.get(1).copied().unwrap_or(0.0);
        match self {
            Builtin::Abs => a.abs(),
            Builtin::Exp => a.exp(),
            Builtin::Log => a.ln(),
            Builtin::Sqrt => a.sqrt(),
            Builtin::Sin => a.sin(),
            Builtin::Cos => a.cos(),
            Builtin::Tan => a.tan(),
            Builtin::Arctan => a.atan(),
            Builtin::Max => a.max(b),
            Builtin::Min => a.min(b),
            Builtin::Format | Builtin::Rows | Builtin::Columns | Builtin::Type => f64::NAN,
        }
    }
}

/// One postfix operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Number(f64),
    /// Non-numeric constant (string, folded matrix or dictionary literal).
    Const(Value),
    Var(VarId),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Builtin(Builtin),
    /// Call a user function by registry slot. `refs` holds, per argument,
    /// the variable it names when the argument is a bare variable.
    Call {
        slot: usize,
        name: Box<str>,
        refs: SmallVec<[Option<VarId>; 4]>,
    },
    /// Pop `rows * cols` entries into a matrix.
    MatrixBuild { rows: usize, cols: usize },
    /// Pop `n` key/value pairs into a dictionary.
    DictBuild(usize),
    /// Pop a container then `n` indices (1 or 2).
    Index(u8),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Number(n) => write!(f, "{}", crate::value::format_number(*n)),
            Op::Const(Value::Str(s)) => write!(f, "\"{s}\""),
            Op::Const(v) => write!(f, "{v}"),
            Op::Var(id) => write!(f, "${}", id.index()),
            Op::Unary(UnaryOp::Neg) => f.write_str("neg"),
            Op::Unary(UnaryOp::Not) => f.write_str("!"),
            Op::Binary(op) => f.write_str(op.symbol()),
            Op::Builtin(b) => f.write_str(b.name()),
            Op::Call { name, refs, .. } => write!(f, "call {name}/{}", refs.len()),
            Op::MatrixBuild { rows, cols } => write!(f, "matrix {rows}x{cols}"),
            Op::DictBuild(n) => write!(f, "dict {n}"),
            Op::Index(n) => write!(f, "index/{n}"),
        }
    }
}
