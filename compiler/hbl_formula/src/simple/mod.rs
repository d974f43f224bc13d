//! Numeric fast path.
//!
//! A formula is *simple* when every op is a numeric constant, a variable
//! currently holding a number (or nothing), an operator, or a numeric
//! builtin, and its evaluation stack stays within [`MAX_STACK_DEPTH`]. A
//! simple formula converts into a [`SimpleProgram`] that reads variables by
//! position from a flat `f64` array.
//!
//! The kernels are [`BinaryOp::apply_numeric`], [`UnaryOp::apply_numeric`]
//! and [`Builtin::apply_numeric`], the same functions the general evaluator
//! calls for numeric operands.

use crate::{BinaryOp, Builtin, Formula, Op, UnaryOp, Value, VarId, VariableTable};


pub const MAX_STACK_DEPTH: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SimpleOp {
    Number(f64),
    /// Read `values[i]`.
    Load(usize),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Builtin(Builtin),
}

/// A flat numeric program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimpleProgram {
    ops: Vec<SimpleOp>,
    depth: usize,
}

impl SimpleProgram {
    /// Convert op sequences laid end to end; `None` unless every op is
    /// simple. `slot_of` maps a variable to its position in the value array.
    pub fn from_parts(
        parts: &[&[Op]],
        vars: &VariableTable,
        slot_of: &dyn Fn(VarId) -> Option<usize>,
    ) -> Option<SimpleProgram> {
        let mut ops = Vec::new();
        let mut height = 0_usize;
        let mut depth = 0_usize;

        for op in parts.iter().flat_map(|part| part.iter()) {
            let (simple, pops, pushes) = match op {
                Op::Number(n) => (SimpleOp::Number(*n), 0, 1),
                Op::Var(id) => {
                    if !matches!(vars.get(*id), Value::Number(_) | Value::Undefined) {
                        return None;
                    }
                    (SimpleOp::Load(slot_of(*id)?), 0, 1)
                }
                Op::Unary(u) => (SimpleOp::Unary(*u), 1, 1),
                Op::Binary(b) => (SimpleOp::Binary(*b), 2, 1),
                Op::Builtin(b) if b.is_numeric() => (SimpleOp::Builtin(*b), b.arity(), 1),
                _ => return None,
            };
            height = height.checked_sub(pops)? + pushes;
            depth = depth.max(height);
            ops.push(simple);
        }

        (depth <= MAX_STACK_DEPTH).then_some(SimpleProgram { ops, depth })
    }

    pub fn from_formula(
        formula: &Formula,
        vars: &VariableTable,
        slot_of: &dyn Fn(VarId) -> Option<usize>,
    ) -> Option<SimpleProgram> {
        Self::from_parts(&[formula.ops()], vars, slot_of)
    }

    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn ops(&self) -> &[SimpleOp] {
        &self.ops
    }

    /// Run, leaving every produced value on `stack` (cleared first).
    pub fn compute_into(&self, values: &[f64], stack: &mut Vec<f64>) {
        stack.clear();
        for op in &self.ops {
            match *op {
                SimpleOp::Number(n) => stack.push(n),
                SimpleOp::Load(i) => stack.push(values.get(i).copied().unwrap_or(0.0)),
                SimpleOp::Unary(u) => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(u.apply_numeric(a));
                }
                SimpleOp::Binary(b) => {
                    let y = stack.pop().unwrap_or(0.0);
                    let x = stack.pop().unwrap_or(0.0);
                    stack.push(b.apply_numeric(x, y));
                }
                SimpleOp::Builtin(b) => {
                    let at = stack.len().saturating_sub(b.arity());
                    let result = b.apply_numeric(&stack[at..]);
                    stack.truncate(at);
                    stack.push(result);
                }
            }
        }
    }

    /// Run and return the top of the stack.
    pub fn compute(&self, values: &[f64], stack: &mut Vec<f64>) -> f64 {
        self.compute_into(values, stack);
        stack.last().copied().unwrap_or(0.0)
    }
}

impl Formula {
    /// Whether this formula can run on the fast path with the current
    /// variable values.
    pub fn is_simple(&self, vars: &VariableTable) -> bool {
        SimpleProgram::from_formula(self, vars, &|id| Some(id.index())).is_some()
    }

    /// Append the variables this formula reads to `out`, skipping
    /// duplicates.
    pub fn collect_variables(&self, out: &mut Vec<VarId>) {
        for op in &self.ops {
            if let Op::Var(id) = op {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
        }
    }
}
