//! `MPISend` and `MPIReceive` over the session's [`Transport`].
//!
//! [`Transport`]: crate::Transport

use hbl_formula::Value;
use hbl_ir::{Command, InstructionList};

use crate::transport::{self, Transport};
use crate::{ExecError, Session};

impl Session {
    /// `MPISend(node, code or object <, input redirect>)`.
    ///
    /// A stored object is sent as its declaration; with a redirect the code
    /// is wrapped in an `ExecuteCommands` call that carries the dictionary.
    pub(super) fn mpi_send(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let node = self.node(command.text(0).unwrap_or_default(), namespace)?;
        let payload = command.text(1).unwrap_or_default();
        let mut code = match self.resolve_object(list, payload).and_then(|name| self.objects.get(&name)) {
            Some(record) => record.source.clone(),
            None => self.literal(payload, namespace)?,
        };

        if let Some(redirect) = command.text(2) {
            let Value::Dict(dict) = self.evaluate_text(redirect, namespace)? else {
                return Err(ExecError::message(format!(
                    "MPISend input redirect '{redirect}' must evaluate to an associative array"
                )));
            };
            let escaped = code.replace('\\', "\\\\").replace('"', "\\\"");
            code = format!("ExecuteCommands(\"{escaped}\", {});", Value::Dict(dict));
        }

        tracing::debug!(node, bytes = code.len(), "MPISend");
        transport::send_string(self.transport_mut("MPISend")?, node, &code, false)?;
        Ok(())
    }

    /// `MPIReceive(from, sender receptacle, result receptacle)`; a negative
    /// `from` accepts any node.
    pub(super) fn mpi_receive(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let from = self.node(command.text(0).unwrap_or_default(), namespace)?;
        let from = (from >= 0).then_some(from);
        let message = transport::receive_string(self.transport_mut("MPIReceive")?, from)?;
        tracing::debug!(sender = message.sender, bytes = message.text.len(), "MPIReceive");

        if let Some(sender) = command.text(1) {
            self.variables
                .set_by_name(&list.qualify(sender), Value::Number(message.sender as f64));
        }
        if message.is_error {
            return Err(ExecError::message(format!(
                "Node {} reported an error: {}",
                message.sender, message.text
            )));
        }
        if let Some(result) = command.text(2) {
            self.variables.set_by_name(&list.qualify(result), Value::from(message.text));
        }
        Ok(())
    }

    fn node(&mut self, text: &str, namespace: Option<&str>) -> Result<i64, ExecError> {
        Ok(self.number(text, namespace)? as i64)
    }

    fn transport_mut(&mut self, what: &str) -> Result<&mut dyn Transport, ExecError> {
        match self.transport.as_deref_mut() {
            Some(transport) => Ok(transport),
            None => Err(ExecError::message(format!("{what} requires a message transport"))),
        }
    }
}
