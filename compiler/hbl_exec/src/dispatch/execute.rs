//! `ExecuteCommands`, `ExecuteAFile` and `LoadFunctionLibrary`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hbl_formula::Value;
use hbl_ir::{Command, CommandData, InputQueue, InstructionList, Opcode};
use hbl_segment::scan;

use crate::{ExecError, Session};

impl Session {
    /// Build a piece of source at run time and execute it in place.
    ///
    /// The code runs in the namespace given by the fourth parameter (the
    /// current one otherwise) and reads `stdin` from the redirect dictionary
    /// when one is given.
    pub(super) fn execute_nested(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let argument = command.text(0).unwrap_or_default();
        let including = command.text(1).filter(|p| !p.is_empty()).map(PathBuf::from);
        let redirect = command.text(2).filter(|r| !r.is_empty());
        let target_namespace = command.text(3).filter(|n| !n.is_empty());
        let compiled = matches!(command.data(), CommandData::Execute { compiled: true });

        let (source, file) = if command.opcode() == Opcode::ExecuteCommands {
            (self.literal(argument, namespace)?, None)
        } else {
            let name = self.literal(argument, namespace)?;
            if name.is_empty() {
                return Err(invalid_argument(argument));
            }
            let base = list.source_file().map(Path::to_path_buf).or(including);
            let path = self.library_path(&name, base.as_deref());
            let is_library = command.opcode() == Opcode::LoadFunctionLibrary;
            if is_library && redirect.is_none() && target_namespace.is_none() && self.loaded_libraries.contains(&path)
            {
                self.warn(format!("Already loaded '{name}' from {}", path.display()));
                return Ok(());
            }
            let source = fs::read_to_string(&path).map_err(|_| {
                ExecError::message(format!(
                    "Could not read command file in ExecuteAFile.\nOriginal path: '{name}'.\nExpanded path: '{}'",
                    path.display()
                ))
            })?;
            if is_library {
                tracing::debug!(path = %path.display(), "loaded function library");
                self.loaded_libraries.push(path.clone());
            }
            (source, Some(path))
        };
        if source.is_empty() {
            return Err(invalid_argument(argument));
        }

        let input = match redirect {
            Some(redirect) => Some(self.input_redirect(redirect, namespace)?),
            None => list.input(),
        };
        let nested_namespace = match target_namespace {
            Some(text) => Some(self.namespace_argument(text, namespace)?),
            None => namespace.map(str::to_string),
        };

        let file = file.or_else(|| list.source_file().map(Path::to_path_buf));
        let nested = Rc::new(self.build_in(&source, nested_namespace.as_deref(), file)?);
        nested.set_error_mode(list.error_mode());
        nested.set_input(input);
        if compiled {
            self.try_fast_path(&nested);
        }

        let value = self.execute_list(&nested)?;
        if !value.is_undefined() {
            list.set_result(value);
        }
        Ok(())
    }

    /// `name` as given, then with the `.bf` extension when it has none.
    fn library_path(&self, name: &str, base: Option<&Path>) -> PathBuf {
        let plain = hbl_build::paths::resolve(name, base, &self.config.search_paths);
        if plain.exists() || Path::new(name).extension().is_some() {
            return plain;
        }
        let with_extension = hbl_build::paths::resolve(&format!("{name}.bf"), base, &self.config.search_paths);
        if with_extension.exists() {
            with_extension
        } else {
            plain
        }
    }

    /// The redirect dictionary's values, in key order, as `stdin` lines.
    fn input_redirect(&mut self, text: &str, namespace: Option<&str>) -> Result<InputQueue, ExecError> {
        let Value::Dict(dict) = self.evaluate_text(text, namespace)? else {
            return Err(ExecError::message(format!(
                "Not a valid input redirect dictionary in a call to ExecuteCommands/ExecuteAFile: {text}"
            )));
        };
        let lines: VecDeque<String> = dict.values().map(Value::to_text).collect();
        Ok(Rc::new(RefCell::new(lines)))
    }

    fn namespace_argument(&mut self, text: &str, namespace: Option<&str>) -> Result<String, ExecError> {
        let name = match self.evaluate_text(text, namespace) {
            Ok(Value::Str(name)) => name.to_string(),
            _ if scan::is_valid_identifier(text, true) => text.to_string(),
            _ => String::new(),
        };
        if !scan::is_valid_identifier(&name, true) {
            return Err(ExecError::message(format!(
                "Invalid namespace ID in call to ExecuteCommands/ExecuteAFile: {name}"
            )));
        }
        Ok(name)
    }
}

fn invalid_argument(argument: &str) -> ExecError {
    ExecError::message(format!(
        "Invalid string argument '{argument}' in call to ExecuteCommands/ExecuteAFile."
    ))
}
