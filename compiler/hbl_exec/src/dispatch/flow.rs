//! Formulas, jumps, returns and namespace blocks.

use std::rc::Rc;

use hbl_formula::{assign_indexed, Statement, Value};
use hbl_ir::{Command, CommandData, InstructionList, ReturnTarget};

use crate::{ExecError, Session};

impl Session {
    pub(super) fn formula(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let statement = self.compiled_statement(command, list.namespace())?;
        match &*statement {
            Statement::Expression(formula) => {
                formula.evaluate(self)?;
            }
            Statement::Assign { target, value } => {
                let value = value.evaluate(self)?;
                self.variables.set(*target, value);
            }
            Statement::AssignIndexed { target, value } => {
                let value = value.evaluate(self)?;
                let Some((container, indices)) = target.evaluate_indices(self)? else {
                    return Err(ExecError::message(format!(
                        "'{}' is not an assignable coordinate",
                        command.text(0).unwrap_or_default()
                    )));
                };
                let mut current = self.variables.take(container);
                let written = assign_indexed(&mut current, &indices, value);
                self.variables.set(container, current);
                written?;
            }
        }
        Ok(())
    }

    pub(super) fn jump(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let Some(jump) = command.as_jump() else {
            return Ok(());
        };
        let target = match &jump.condition {
            None => jump.on_true,
            Some(condition) => {
                let formula = self.compiled_expression(command, condition, list.namespace())?;
                if formula.evaluate(self)?.truthiness()? {
                    jump.on_true
                } else {
                    jump.on_false
                }
            }
        };
        list.set_pc(target);
        Ok(())
    }

    pub(super) fn return_value(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let value = match command.text(0) {
            Some(expression) => {
                let formula = self.compiled_expression(command, expression, list.namespace())?;
                formula.evaluate(self)?
            }
            None => Value::Undefined,
        };
        list.set_result(value);
        match command.data() {
            CommandData::Return(ReturnTarget::Index(end)) => list.set_pc(*end),
            _ => list.finish(),
        }
        Ok(())
    }

    /// A `namespace` block: run the embedded list with this list's error
    /// mode and input. A value it returns becomes this list's result.
    pub(super) fn nested(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let Some(inner) = command.nested_list() else {
            return Ok(());
        };
        let inner = Rc::clone(inner);
        inner.set_error_mode(list.error_mode());
        inner.set_input(list.input());
        let value = self.execute_list(&inner)?;
        if !value.is_undefined() {
            list.set_result(value);
        }
        Ok(())
    }
}
