//! Object declarations, payload operations and object introspection.

use hbl_formula::{Dict, Value};
use hbl_ir::{Command, CommandData, InstructionList, MergeMode, Opcode};
use hbl_segment::scan;

use crate::globals::EXECUTION_ERROR_HANDLING;
use crate::payload::{ConstructRequest, PayloadError};
use crate::{ExecError, ObjectKind, Session, HBL_VERSION};

impl Session {
    pub(super) fn construct(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let opcode = command.opcode();
        let Some(kind) = ObjectKind::from_opcode(opcode) else {
            return Err(PayloadError::Unsupported(opcode.name()).into());
        };
        let Some(id) = command.text(0) else {
            return Ok(());
        };
        let name = list.qualify(id);

        let (operation, first_argument) = match (opcode, command.data()) {
            (Opcode::DataSet, CommandData::DataSet { from_string }) => {
                let operation = if *from_string { "ReadFromString" } else { "ReadDataFile" };
                (Some(operation.to_string()), 1)
            }
            (Opcode::SimulateDataSet, _) => (Some("SimulateDataSet".to_string()), 1),
            (Opcode::DataSetMerge, CommandData::Merge { mode, .. }) => {
                let operation = match mode {
                    MergeMode::Concatenate => "Concatenate",
                    MergeMode::Combine => "Combine",
                };
                (Some(operation.to_string()), 1)
            }
            (Opcode::DataSetFilter, _) => (command.text(1).map(str::to_string), 2),
            _ => (None, 1),
        };

        let texts: Vec<String> = command.texts_from(first_argument).map(str::to_string).collect();
        let arguments = texts.iter().map(|text| self.argument_value(list, text)).collect();
        let request = ConstructRequest {
            opcode,
            kind,
            name,
            operation,
            texts,
            arguments,
            flags: command.data(),
            source: command.source(),
        };
        self.payload.construct(request, &mut self.objects)?;
        Ok(())
    }

    /// Hand an object operation to the payload; a value it returns lands in
    /// the first argument.
    pub(super) fn payload_operation(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let arguments: Vec<String> = command.texts_from(0).map(str::to_string).collect();
        let value = self.payload.operation(command.opcode(), &arguments, &mut self.objects)?;
        if let (Some(value), Some(receptacle)) = (value, arguments.first()) {
            if scan::is_valid_identifier(receptacle, true) {
                self.variables.set_by_name(&list.qualify(receptacle), value);
            }
        }
        Ok(())
    }

    /// `SetParameter`: the error-handling switch is the interpreter's own;
    /// everything else belongs to the payload.
    pub(super) fn set_parameter(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        if command.text(0) == Some(EXECUTION_ERROR_HANDLING) {
            let value = self.number(command.text(1).unwrap_or_default(), list.namespace())?;
            self.variables.set_by_name(EXECUTION_ERROR_HANDLING, Value::Number(value));
            return Ok(());
        }
        self.payload_operation(list, command)
    }

    pub(super) fn delete_object(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let names: Vec<String> = command.texts_from(0).map(str::to_string).collect();
        for name in names {
            match self.resolve_object(list, &name) {
                Some(qualified) => {
                    self.objects.remove(&qualified);
                    tracing::debug!(name = %qualified, "deleted object");
                }
                None => self.warn(format!("'{name}' is not a supported argument type for DeleteObject")),
            }
        }
        Ok(())
    }

    /// `Export(receptacle, object)`: the declaration text of a function or
    /// object.
    pub(super) fn export(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let (Some(receptacle), Some(object)) = (command.text(0), command.text(1)) else {
            return Ok(());
        };
        let exported = if let Some(entry) = self
            .registry
            .find(object, list.namespace())
            .and_then(|slot| self.registry.get(slot))
        {
            entry.export()
        } else if let Some(record) = self.resolve_object(list, object).and_then(|name| self.objects.get(&name)) {
            record.source.clone()
        } else {
            return Err(ExecError::message(format!(
                "'{object}' is not a function or object that can be exported"
            )));
        };
        self.variables.set_by_name(&list.qualify(receptacle), Value::from(exported));
        Ok(())
    }

    /// `GetString(receptacle, object, index)`.
    pub(super) fn get_string(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let (Some(receptacle), Some(object)) = (command.text(0), command.text(1)) else {
            return Ok(());
        };
        let index = match command.text(2) {
            Some(text) => self.number(text, list.namespace())?,
            None => 0.0,
        };
        let value = self.describe(list, object, index)?;
        self.variables.set_by_name(&list.qualify(receptacle), value);
        Ok(())
    }

    fn describe(&self, list: &InstructionList, object: &str, index: f64) -> Result<Value, ExecError> {
        match object {
            "HBL_VERSION" => {
                let text = if index > 1.5 {
                    format!("HBL version v{HBL_VERSION}")
                } else if index > 0.5 {
                    format!(
                        "HBL v{HBL_VERSION} ({} {})",
                        std::env::consts::OS,
                        std::env::consts::ARCH
                    )
                } else {
                    HBL_VERSION.to_string()
                };
                return Ok(Value::from(text));
            }
            "LIST_OF_LOADED_LIBRARIES" => {
                let libraries: Dict = self
                    .loaded_libraries
                    .iter()
                    .enumerate()
                    .map(|(i, path)| (i.to_string(), Value::from(path.to_string_lossy().into_owned())))
                    .collect();
                return Ok(Value::dict(libraries));
            }
            "UserFunction" => {
                let entry = as_index(index)
                    .and_then(|i| self.registry.entries().nth(i))
                    .map(|(_, entry)| entry)
                    .ok_or_else(|| {
                        ExecError::message(format!("There is no UserFunction object with index {index}"))
                    })?;
                let mut dict = Dict::new();
                dict.insert("ID".to_string(), Value::from(entry.name.as_str()));
                dict.insert("Arguments".to_string(), Value::dict(parameter_names(&entry.parameters)));
                return Ok(Value::dict(dict));
            }
            _ => {}
        }

        if let Some(kind) = ObjectKind::from_name(object) {
            let record = as_index(index)
                .and_then(|i| self.objects.nth_of_kind(kind, i))
                .ok_or_else(|| ExecError::message(format!("There is no {kind} object with index {index}")))?;
            return Ok(Value::from(record.name.as_str()));
        }

        if let Some(entry) = self
            .registry
            .find(object, list.namespace())
            .and_then(|slot| self.registry.get(slot))
        {
            let mut dict = Dict::new();
            dict.insert("ID".to_string(), Value::from(entry.name.as_str()));
            dict.insert("Arguments".to_string(), Value::dict(parameter_names(&entry.parameters)));
            dict.insert("Body".to_string(), Value::from(entry.body.source_text()));
            return Ok(Value::dict(dict));
        }

        if let Some(record) = self.resolve_object(list, object).and_then(|name| self.objects.get(&name)) {
            let arguments: Dict = record
                .arguments
                .iter()
                .enumerate()
                .map(|(i, value)| (i.to_string(), value.clone()))
                .collect();
            let mut dict = Dict::new();
            dict.insert("ID".to_string(), Value::from(record.name.as_str()));
            dict.insert("Type".to_string(), Value::from(record.kind.name()));
            dict.insert("Arguments".to_string(), Value::dict(arguments));
            return Ok(Value::dict(dict));
        }

        let variable = list.qualify(object);
        for name in [variable.as_str(), object] {
            if self.variables.is_defined(name) {
                return Ok(Value::from(self.variables.get_by_name(name).to_text()));
            }
        }
        Err(ExecError::message("No viable object to obtain information from"))
    }
}

/// A non-negative whole index.
fn as_index(index: f64) -> Option<usize> {
    (index >= 0.0 && index.is_finite()).then(|| index as usize)
}

/// Parameter names without their namespace, keyed by position.
fn parameter_names(parameters: &[String]) -> Dict {
    parameters
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let bare = p.rsplit('.').next().unwrap_or(p);
            (i.to_string(), Value::from(bare))
        })
        .collect()
}
