//! General formula evaluation.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{BinaryOp, Builtin, Dict, EvalError, Formula, Matrix, Op, UnaryOp, Value, VarId, VariableTable};


/// What evaluation needs from the interpreter.
pub trait FormulaHost {
    fn variables(&self) -> &VariableTable;

    /// Invoke the user function in registry `slot`.
    ///
    /// `refs[i]` is the caller's variable when argument `i` was written as a
    /// bare variable, which is what by-reference parameters bind to.
    fn call_function(
        &mut self,
        slot: usize,
        args: Vec<Value>,
        refs: &[Option<VarId>],
    ) -> Result<Value, EvalError>;
}

impl Formula {
    /// Evaluate to a single value (undefined for an empty formula).
    pub fn evaluate(&self, host: &mut dyn FormulaHost) -> Result<Value, EvalError> {
        let mut stack = run(&self.ops, host)?;
        Ok(stack.pop().unwrap_or_default())
    }

    /// For an indexed-assignment target (`m[i][j]`): the container variable
    /// and the evaluated indices.
    pub fn evaluate_indices(
        &self,
        host: &mut dyn FormulaHost,
    ) -> Result<Option<(VarId, SmallVec<[Value; 2]>)>, EvalError> {
        let [Op::Var(container), middle @ .., Op::Index(n)] = self.ops.as_slice() else {
            return Ok(None);
        };
        let stack = run(middle, host)?;
        if stack.len() != usize::from(*n) {
            return Ok(None);
        }
        Ok(Some((*container, stack.into_iter().collect())))
    }
}

fn run(ops: &[Op], host: &mut dyn FormulaHost) -> Result<Vec<Value>, EvalError> {
    let mut stack: Vec<Value> = Vec::with_capacity(8);

    for op in ops {
        match op {
            Op::Number(n) => stack.push(Value::Number(*n)),
            Op::Const(v) => stack.push(v.clone()),
            Op::Var(id) => stack.push(host.variables().get(*id).clone()),
            Op::Unary(op) => {
                let a = pop(&mut stack);
                stack.push(unary(*op, a)?);
            }
            Op::Binary(op) => {
                let b = pop(&mut stack);
                let a = pop(&mut stack);
                stack.push(binary(*op, a, b)?);
            }
            Op::Builtin(b) => {
                let args = pop_n(&mut stack, b.arity());
                stack.push(builtin(*b, &args)?);
            }
            Op::Call { slot, refs, .. } => {
                let args = pop_n(&mut stack, refs.len());
                stack.push(host.call_function(*slot, args, refs)?);
            }
            Op::MatrixBuild { rows, cols } => {
                let entries = pop_n(&mut stack, rows * cols);
                let cells = entries
                    .iter()
                    .map(|v| {
                        v.as_number().ok_or(EvalError::UnaryMismatch {
                            op: "matrix literal",
                            operand: v.type_name(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                stack.push(Value::matrix(Matrix::from_cells(*rows, *cols, cells)));
            }
            Op::DictBuild(pairs) => {
                let entries = pop_n(&mut stack, pairs * 2);
                let mut dict = Dict::new();
                let mut it = entries.into_iter();
                while let (Some(key), Some(value)) = (it.next(), it.next()) {
                    dict.insert(key.to_text(), value);
                }
                stack.push(Value::dict(dict));
            }
            Op::Index(n) => {
                let indices = pop_n(&mut stack, usize::from(*n));
                let container = pop(&mut stack);
                stack.push(index(&container, &indices)?);
            }
        }
    }

    Ok(stack)
}

#[inline]
fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or_default()
}

fn pop_n(stack: &mut Vec<Value>, n: usize) -> Vec<Value> {
    let at = stack.len().saturating_sub(n);
    stack.split_off(at)
}

pub(crate) fn unary(op: UnaryOp, a: Value) -> Result<Value, EvalError> {
    match (op, &a) {
        (UnaryOp::Not, _) => Ok(Value::bool(!a.truthiness()?)),
        (UnaryOp::Neg, Value::Matrix(m)) => Ok(Value::matrix(m.map(|x| -x))),
        (UnaryOp::Neg, _) => a
            .as_number()
            .map(|n| Value::Number(op.apply_numeric(n)))
            .ok_or(EvalError::UnaryMismatch {
                op: "-",
                operand: a.type_name(),
            }),
    }
}

pub(crate) fn binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return Ok(Value::Number(op.apply_numeric(x, y)));
    }

    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: a.type_name(),
        right: b.type_name(),
    };

    match (op, &a, &b) {
        (BinaryOp::Add, Value::Str(_), _) | (BinaryOp::Add, _, Value::Str(_)) => {
            Ok(Value::from(format!("{}{}", a.to_text(), b.to_text())))
        }
        (BinaryOp::Eq, _, _) => Ok(Value::bool(a == b)),
        (BinaryOp::NotEq, _, _) => Ok(Value::bool(a != b)),
        (BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq, Value::Str(x), Value::Str(y)) => {
            let ord = x.cmp(y);
            Ok(Value::bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::LtEq => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        (BinaryOp::Mul, Value::Matrix(x), Value::Matrix(y)) => x
            .product(y)
            .map(Value::matrix)
            .ok_or(EvalError::Dimensions("*")),
        (BinaryOp::Add | BinaryOp::Sub, Value::Matrix(x), Value::Matrix(y)) => x
            .zip(y, |p, q| op.apply_numeric(p, q))
            .map(Value::matrix)
            .ok_or(EvalError::Dimensions(op.symbol())),
        (BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div, Value::Matrix(x), _) => {
            let y = b.as_number().ok_or_else(mismatch)?;
            Ok(Value::matrix(x.map(|p| op.apply_numeric(p, y))))
        }
        (BinaryOp::Add | BinaryOp::Mul, _, Value::Matrix(y)) => {
            let x = a.as_number().ok_or_else(mismatch)?;
            Ok(Value::matrix(y.map(|q| op.apply_numeric(x, q))))
        }
        _ => Err(mismatch()),
    }
}

fn builtin(b: Builtin, args: &[Value]) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let number = |i: usize| {
        let v = arg(i);
        v.as_number().ok_or(EvalError::UnaryMismatch {
            op: b.name(),
            operand: v.type_name(),
        })
    };

    match b {
        Builtin::Type => Ok(Value::from(arg(0).type_name())),
        Builtin::Rows => Ok(Value::Number(match &arg(0) {
            Value::Matrix(m) => m.rows() as f64,
            Value::Dict(d) => d.len() as f64,
            _ => 0.0,
        })),
        Builtin::Columns => Ok(Value::Number(match &arg(0) {
            Value::Matrix(m) => m.cols() as f64,
            _ => 0.0,
        })),
        Builtin::Format => {
            let value = number(0)?;
            let width = number(1)?.max(0.0) as usize;
            let precision = number(2)?;
            Ok(Value::from(if precision < 0.0 {
                format!("{:>width$}", crate::value::format_number(value))
            } else {
                let precision = precision as usize;
                format!("{value:>width$.precision$}")
            }))
        }
        _ => {
            let values: SmallVec<[f64; 2]> = (0..b.arity()).map(number).collect::<Result<_, _>>()?;
            Ok(Value::Number(b.apply_numeric(&values)))
        }
    }
}

fn to_index(v: &Value) -> Result<usize, EvalError> {
    match v.as_number() {
        Some(n) if n >= 0.0 && n.is_finite() => Ok(n as usize),
        _ => Err(EvalError::IndexOutOfRange {
            index: v.to_text(),
            shape: "any".into(),
        }),
    }
}

fn index(container: &Value, indices: &[Value]) -> Result<Value, EvalError> {
    match (container, indices) {
        (Value::Matrix(m), [i]) => m.get_linear(to_index(i)?).map(Value::Number),
        (Value::Matrix(m), [r, c]) => m.get(to_index(r)?, to_index(c)?).map(Value::Number),
        (Value::Dict(d), [key]) => Ok(d.get(&key.to_text()).cloned().unwrap_or_default()),
        (Value::Str(s), [i]) => {
            let at = to_index(i)?;
            s.chars().nth(at).map(|c| Value::from(c.to_string())).ok_or_else(|| {
                EvalError::IndexOutOfRange {
                    index: format!("[{at}]"),
                    shape: format!("{}-character string", s.chars().count()),
                }
            })
        }
        (other, _) => Err(EvalError::NotIndexable(other.type_name())),
    }
}

/// Store `value` at `indices` inside `container`.
///
/// An undefined container written with a single index becomes a
/// dictionary.
pub fn assign_indexed(container: &mut Value, indices: &[Value], value: Value) -> Result<(), EvalError> {
    if container.is_undefined() && indices.len() == 1 {
        *container = Value::dict(Dict::new());
    }
    match (container, indices) {
        (Value::Matrix(m), [i]) => {
            let n = number_cell(&value)?;
            Rc::make_mut(m).set_linear(to_index(i)?, n)
        }
        (Value::Matrix(m), [r, c]) => {
            let n = number_cell(&value)?;
            Rc::make_mut(m).set(to_index(r)?, to_index(c)?, n)
        }
        (Value::Dict(d), [key]) => {
            Rc::make_mut(d).insert(key.to_text(), value);
            Ok(())
        }
        (other, _) => Err(EvalError::NotIndexable(other.type_name())),
    }
}

fn number_cell(value: &Value) -> Result<f64, EvalError> {
    value.as_number().ok_or(EvalError::UnaryMismatch {
        op: "matrix element assignment",
        operand: value.type_name(),
    })
}
