//! The step loop.
//!
//! [`Session::execute_list`] runs one list from its first command until
//! the program counter passes the end or a fatal error raises the session's
//! terminate flag. The loop advances the counter before handing a command
//! to its handler, so jumps and returns simply overwrite it.
//!
//! Handler families live in the sibling modules; every handler returns
//! `Result<(), ExecError>` and leaves error routing to
//! [`Session::handle_failure`].

use std::rc::Rc;
use std::time::Instant;

use hbl_formula::{Statement, Value};
use hbl_ir::{Command, CommandData, Compiled, InstructionList, Opcode, ProfileAction};

use crate::{fast, ErrorChannel, ExecError, Session};

mod execute;
mod flow;
mod io;
mod mpi;
mod objects;
mod runtime;
mod scanner;

impl Session {
    /// Run `list` to completion and hand back its result.
    ///
    /// Re-entrant: the list saves its counter on entry, so a function body
    /// can call itself.
    pub(crate) fn execute_list(&mut self, list: &Rc<InstructionList>) -> Result<Value, ExecError> {
        hbl_stack::ensure_sufficient_stack(|| {
            self.call_stack.push(Rc::clone(list));
            list.enter();
            let outcome = self.run_steps(list);
            let result = list.take_result();
            list.leave();
            self.call_stack.pop();
            outcome.map(|()| result)
        })
    }

    fn run_steps(&mut self, list: &InstructionList) -> Result<(), ExecError> {
        if let Some(path) = list.fast_path() {
            if fast::is_applicable(&path, &self.variables) {
                return fast::run(self, list, &path);
            }
            tracing::debug!("fast path inputs changed kind; using normal dispatch");
        }

        while !list.is_finished() && !self.terminate {
            let index = list.pc();
            let started = list.is_profiling().then(Instant::now);
            let outcome = self.step(list, index);
            if let Some(started) = started {
                list.record_profile(index, started.elapsed().as_secs_f64());
            }
            if let Err(err) = outcome {
                self.handle_failure(list, index, err)?;
            }
        }
        Ok(())
    }

    fn step(&mut self, list: &InstructionList, index: usize) -> Result<(), ExecError> {
        let Some(command) = list.command(index) else {
            list.finish();
            return Ok(());
        };
        list.advance();
        tracing::trace!(
            pc = index,
            opcode = %command.opcode(),
            namespace = list.namespace().unwrap_or_default(),
            "step"
        );

        match command.opcode() {
            Opcode::Nop => Ok(()),
            Opcode::Formula => self.formula(list, command),
            Opcode::Jump => self.jump(list, command),
            Opcode::Return => self.return_value(list, command),
            Opcode::NestedList => self.nested(list, command),
            Opcode::Fprintf => self.fprintf(list, command),
            Opcode::Fscanf | Opcode::Sscanf => self.scan(list, command),
            Opcode::ExecuteCommands | Opcode::ExecuteAFile | Opcode::LoadFunctionLibrary => {
                self.execute_nested(list, command)
            }
            Opcode::GetString => self.get_string(list, command),
            Opcode::Export => self.export(list, command),
            Opcode::DeleteObject => self.delete_object(list, command),
            Opcode::SetParameter => self.set_parameter(list, command),
            Opcode::ChoiceList => self.choice_list(list, command),
            Opcode::Assert => self.assert(list, command),
            Opcode::RequireVersion => self.require_version(list, command),
            Opcode::ClearConstraints => self.clear_constraints(list, command),
            Opcode::SetDialogPrompt => self.set_dialog_prompt(list, command),
            Opcode::Profile => self.profile(list, command),
            Opcode::MpiSend => self.mpi_send(list, command),
            Opcode::MpiReceive => self.mpi_receive(list, command),
            opcode if opcode.is_object_construct() => self.construct(list, command),
            _ => self.payload_operation(list, command),
        }
    }

    /// Route a command's error through the error channel.
    ///
    /// In soft mode the command's receptacles are reset to undefined and
    /// execution continues; otherwise the terminate flag is raised and the
    /// error unwinds. Errors arriving while the flag is up are passing
    /// through from a nested run and were already reported.
    pub(crate) fn handle_failure(
        &mut self,
        list: &InstructionList,
        index: usize,
        err: ExecError,
    ) -> Result<(), ExecError> {
        if self.terminate {
            return Err(err);
        }
        let command = list.command(index);
        tracing::error!(
            pc = index,
            command = %command.map(ToString::to_string).unwrap_or_default(),
            "{err}"
        );
        match ErrorChannel::for_list(&self.variables, list).route(&mut self.variables, list, err) {
            Ok(()) => {
                if let Some(command) = command {
                    self.poison_receptacles(list, command);
                }
                Ok(())
            }
            Err(err) => {
                self.terminate = true;
                Err(err)
            }
        }
    }

    fn poison_receptacles(&mut self, list: &InstructionList, command: &Command) {
        let names: Vec<&str> = match command.opcode() {
            Opcode::Formula => {
                let statement = match command.compiled() {
                    Some(Compiled::Statement(statement)) => Some(statement),
                    _ => self
                        .parse_statement_in(command.text(0).unwrap_or_default(), list.namespace())
                        .ok()
                        .map(Rc::new),
                };
                if let Some(Statement::Assign { target, .. }) = statement.as_deref() {
                    self.variables.set(*target, Value::Undefined);
                }
                return;
            }
            Opcode::GetString | Opcode::ChoiceList | Opcode::Export => command.text(0).into_iter().collect(),
            Opcode::Profile if matches!(command.data(), CommandData::Profile(ProfileAction::Collect)) => {
                command.text(0).into_iter().collect()
            }
            Opcode::MpiReceive => command.texts_from(1).take(2).collect(),
            _ => Vec::new(),
        };
        for name in names {
            self.variables.set_by_name(&list.qualify(name), Value::Undefined);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
