//! Numeric fast path.
//!
//! A list whose every command is a numeric formula, a matrix cell store or
//! a jump is lowered onto a flat `f64` array: each variable the list reads
//! or writes gets one slot, filled from the variable table on entry and
//! copied back (written slots only) when the run ends. Arithmetic goes
//! through the same kernels as the general evaluator, so both paths agree
//! bit for bit.
//!
//! The lowering is checked against the variable kinds seen at compile time;
//! [`is_applicable`] re-checks them before each run and the dispatcher falls
//! back to normal stepping when a slot no longer holds a number.

use std::rc::Rc;

use hbl_formula::simple::SimpleProgram;
use hbl_formula::{EvalError, Formula, Op, Statement, Value, VarId, VariableTable};
use hbl_ir::{FastPath, FastStep, InstructionList, Opcode};

use crate::{ExecError, Session};


/// What a command parsed into, kept between the two compile passes.
enum Parsed {
    Statement(Rc<Statement>),
    Condition(Option<Rc<Formula>>, usize, usize),
    Skip(usize),
}

/// Lower `list`, or return the index of the first command that keeps it on
/// normal dispatch.
pub(crate) fn compile(session: &mut Session, list: &InstructionList) -> Result<FastPath, usize> {
    let namespace = list.namespace();
    let mut parsed = Vec::with_capacity(list.len());
    let mut variables: Vec<VarId> = Vec::new();
    let mut first_use: Vec<usize> = Vec::new();

    for (i, command) in list.commands().iter().enumerate() {
        match command.opcode() {
            Opcode::Formula => {
                let statement = session.compiled_statement(command, namespace).map_err(|_| i)?;
                match &*statement {
                    Statement::Expression(value) => value.collect_variables(&mut variables),
                    Statement::Assign { target, value } => {
                        push_unique(&mut variables, *target);
                        value.collect_variables(&mut variables);
                    }
                    Statement::AssignIndexed { target, value } => {
                        let Some((_, indices)) = cell_store(target.ops()) else {
                            return Err(i);
                        };
                        for op in indices {
                            if let Op::Var(id) = op {
                                push_unique(&mut variables, *id);
                            }
                        }
                        value.collect_variables(&mut variables);
                    }
                }
                parsed.push(Parsed::Statement(statement));
            }
            Opcode::Jump => {
                let Some(jump) = command.as_jump() else {
                    return Err(i);
                };
                let condition = match &jump.condition {
                    Some(text) => {
                        let formula = session.compiled_expression(command, text, namespace).map_err(|_| i)?;
                        formula.collect_variables(&mut variables);
                        Some(formula)
                    }
                    None => None,
                };
                parsed.push(Parsed::Condition(condition, jump.on_true, jump.on_false));
            }
            Opcode::Nop => parsed.push(Parsed::Skip(i + 1)),
            _ => return Err(i),
        }
        first_use.resize(variables.len(), i);
    }

    let vars = &session.variables;
    let slot_of = |id: VarId| variables.iter().position(|v| *v == id);
    let mut steps = Vec::with_capacity(parsed.len());
    let mut written = Vec::new();
    let mut stack_depth = 0;

    for (i, parsed) in parsed.iter().enumerate() {
        let step = match parsed {
            Parsed::Statement(statement) => match &**statement {
                Statement::Expression(value) => FastStep::Compute {
                    program: SimpleProgram::from_formula(value, vars, &slot_of).ok_or(i)?,
                    store: None,
                },
                Statement::Assign { target, value } => {
                    if !matches!(vars.get(*target), Value::Number(_) | Value::Undefined) {
                        return Err(i);
                    }
                    let store = slot_of(*target).ok_or(i)?;
                    if !written.contains(&store) {
                        written.push(store);
                    }
                    FastStep::Compute {
                        program: SimpleProgram::from_formula(value, vars, &slot_of).ok_or(i)?,
                        store: Some(store),
                    }
                }
                Statement::AssignIndexed { target, value } => {
                    let (matrix, indices) = cell_store(target.ops()).ok_or(i)?;
                    if !matches!(vars.get(matrix), Value::Matrix(_)) {
                        return Err(i);
                    }
                    FastStep::StoreCell {
                        program: SimpleProgram::from_parts(&[value.ops(), indices], vars, &slot_of).ok_or(i)?,
                        matrix,
                    }
                }
            },
            Parsed::Condition(condition, on_true, on_false) => FastStep::Branch {
                program: match condition {
                    Some(formula) => Some(SimpleProgram::from_formula(formula, vars, &slot_of).ok_or(i)?),
                    None => None,
                },
                on_true: *on_true,
                on_false: *on_false,
            },
            Parsed::Skip(next) => FastStep::Branch {
                program: None,
                on_true: *next,
                on_false: *next,
            },
        };
        stack_depth = stack_depth.max(step_depth(&step));
        steps.push(step);
    }

    // Slots the list only reads must already hold numbers.
    if let Some(slot) = (0..variables.len())
        .find(|slot| !written.contains(slot) && !matches!(vars.get(variables[*slot]), Value::Number(_)))
    {
        return Err(first_use[slot]);
    }

    Ok(FastPath {
        variables,
        written,
        steps,
        stack_depth,
    })
}

/// Whether the variable kinds still match what `path` was compiled for.
pub(crate) fn is_applicable(path: &FastPath, variables: &VariableTable) -> bool {
    path.variables.iter().enumerate().all(|(slot, id)| match variables.get(*id) {
        Value::Number(_) => true,
        Value::Undefined => path.written.contains(&slot),
        _ => false,
    })
        && path.steps.iter().all(|step| match step {
            FastStep::StoreCell { matrix, .. } => matches!(variables.get(*matrix), Value::Matrix(_)),
            _ => true,
        })
}

/// Run `list` through its compiled `path`.
pub(crate) fn run(session: &mut Session, list: &InstructionList, path: &FastPath) -> Result<(), ExecError> {
    let mut values = load(path, &session.variables);
    let mut stack = Vec::with_capacity(path.stack_depth);
    let mut pc = 0;

    while pc < path.steps.len() {
        let index = pc;
        pc += 1;
        match &path.steps[index] {
            FastStep::Compute { program, store } => {
                let value = program.compute(&values, &mut stack);
                if let Some(slot) = store {
                    values[*slot] = value;
                }
            }
            FastStep::StoreCell { program, matrix } => {
                program.compute_into(&values, &mut stack);
                if let Err(err) = store_cell(&mut session.variables, *matrix, &stack) {
                    write_back(path, &values, &mut session.variables);
                    session.handle_failure(list, index, err.into())?;
                    values = load(path, &session.variables);
                }
            }
            FastStep::Branch {
                program,
                on_true,
                on_false,
            } => {
                let taken = match program {
                    Some(program) => program.compute(&values, &mut stack) != 0.0,
                    None => true,
                };
                pc = if taken { *on_true } else { *on_false };
            }
        }
    }

    write_back(path, &values, &mut session.variables);
    list.finish();
    Ok(())
}

fn load(path: &FastPath, variables: &VariableTable) -> Vec<f64> {
    path.variables
        .iter()
        .map(|id| variables.get(*id).as_number().unwrap_or(0.0))
        .collect()
}

fn write_back(path: &FastPath, values: &[f64], variables: &mut VariableTable) {
    for &slot in &path.written {
        variables.set(path.variables[slot], Value::Number(values[slot]));
    }
}

/// `stack` holds the value followed by the row and column.
fn store_cell(variables: &mut VariableTable, matrix: VarId, stack: &[f64]) -> Result<(), EvalError> {
    let Some(Value::Matrix(cells)) = variables.get_mut(matrix) else {
        return Err(EvalError::NotIndexable("Unknown"));
    };
    match *stack {
        [value, row, col] => Rc::make_mut(cells).set(to_index(row)?, to_index(col)?, value),
        _ => Err(EvalError::Dimensions("matrix element assignment")),
    }
}

fn to_index(n: f64) -> Result<usize, EvalError> {
    if n >= 0.0 && n.is_finite() {
        Ok(n as usize)
    } else {
        Err(EvalError::IndexOutOfRange {
            index: Value::Number(n).to_text(),
            shape: "any".into(),
        })
    }
}

/// `m[i][j] = ..`: the matrix and the index ops. Other coordinate forms
/// stay on normal dispatch.
fn cell_store(ops: &[Op]) -> Option<(VarId, &[Op])> {
    match ops {
        [Op::Var(matrix), indices @ .., Op::Index(2)] => Some((*matrix, indices)),
        _ => None,
    }
}

fn step_depth(step: &FastStep) -> usize {
    match step {
        FastStep::Compute { program, .. } | FastStep::StoreCell { program, .. } => program.stack_depth(),
        FastStep::Branch { program, .. } => program.as_ref().map_or(0, SimpleProgram::stack_depth),
    }
}

fn push_unique(variables: &mut Vec<VarId>, id: VarId) {
    if !variables.contains(&id) {
        variables.push(id);
    }
}
