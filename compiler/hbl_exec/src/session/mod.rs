//! The interpreter session.
//!
//! A [`Session`] is the process context of a batch program: variables,
//! user functions, named objects, open files and console state live here
//! and are threaded through every handler as `&mut self`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hbl_build::{BuildError, Builder};
use hbl_formula::{
    parse_expression, parse_statement, EvalError, Formula, FormulaError, FormulaHost, ParseContext,
    Statement, Value, VarId, VariableTable,
};
use hbl_ir::{Command, Compiled, FunctionRegistry, InstructionList};
use rustc_hash::FxHashMap;

use crate::{
    fast, ExecError, ObjectStore, Payload, RunError, SessionBuilder, SessionConfig,
    SharedPrintHandler, Transport,
};

mod call;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

pub struct Session {
    pub(crate) variables: VariableTable,
    pub(crate) registry: FunctionRegistry,
    pub(crate) objects: ObjectStore,
    pub(crate) payload: Box<dyn Payload>,
    pub(crate) transport: Option<Box<dyn Transport>>,
    pub(crate) config: SessionConfig,
    pub(crate) warnings: Vec<String>,
    /// Raised by a fatal error; every active list unwinds until the
    /// top-level boundary clears it.
    pub(crate) terminate: bool,
    /// Active user function calls.
    pub(crate) depth: usize,
    /// Lists currently executing, innermost last.
    pub(crate) call_stack: Vec<Rc<InstructionList>>,
    /// `fprintf` handles kept by `KEEP_OPEN`.
    pub(crate) open_files: FxHashMap<PathBuf, File>,
    /// Byte offsets reached by `fscanf`/`sscanf`, per source.
    pub(crate) scan_positions: FxHashMap<String, usize>,
    pub(crate) loaded_libraries: Vec<PathBuf>,
    pub(crate) dialog_prompt: String,
}

impl Session {
    /// A session with the default configuration.
    pub fn new() -> Self {
        SessionBuilder::new().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_parts(
        config: SessionConfig,
        payload: Box<dyn Payload>,
        transport: Option<Box<dyn Transport>>,
    ) -> Self {
        Session {
            variables: VariableTable::new(),
            registry: FunctionRegistry::new(),
            objects: ObjectStore::new(),
            payload,
            transport,
            config,
            warnings: Vec::new(),
            terminate: false,
            depth: 0,
            call_stack: Vec::new(),
            open_files: FxHashMap::default(),
            scan_positions: FxHashMap::default(),
            loaded_libraries: Vec::new(),
            dialog_prompt: String::new(),
        }
    }

    // ─── Top-level runs ───

    /// Build and run `source`; the value of its last `return`, if any.
    pub fn run_source(&mut self, source: &str) -> Result<Value, RunError> {
        self.run_built(source, None)
    }

    /// Run a batch file. Functions it declares are removed afterwards.
    pub fn run_file(&mut self, path: &Path) -> Result<Value, RunError> {
        let source = fs::read_to_string(path).map_err(|source| RunError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let first = self.registry.len();
        let outcome = self.run_built(&source, Some(path.to_path_buf()));
        self.registry.clear_from(first);
        outcome
    }

    fn run_built(&mut self, source: &str, file: Option<PathBuf>) -> Result<Value, RunError> {
        let list = Rc::new(self.build_in(source, None, file)?);
        list.set_error_mode(self.config.error_mode);
        if self.config.compile {
            self.try_fast_path(&list);
        }

        self.terminate = false;
        let outcome = self.execute(&list);
        self.terminate = false;
        tracing::debug!(ok = outcome.is_ok(), "top-level run finished");
        Ok(outcome?)
    }

    /// Build `source` against this session's function registry.
    pub fn build(&mut self, source: &str, namespace: Option<&str>) -> Result<InstructionList, BuildError> {
        self.build_in(source, namespace, None)
    }

    pub(crate) fn build_in(
        &mut self,
        source: &str,
        namespace: Option<&str>,
        file: Option<PathBuf>,
    ) -> Result<InstructionList, BuildError> {
        let mut builder = Builder::new(&mut self.registry)
            .with_search_paths(self.config.search_paths.clone())
            .with_source_file(file);
        let built = builder.build(source, namespace);
        let warnings = builder.take_warnings();
        self.warnings.extend(warnings);
        built
    }

    /// Run an already built list to completion.
    pub fn execute(&mut self, list: &Rc<InstructionList>) -> Result<Value, ExecError> {
        list.set_error_flag(false);
        self.execute_list(list)
    }

    /// Lower `list` onto the numeric fast path, or warn and leave it on
    /// normal dispatch.
    pub(crate) fn try_fast_path(&mut self, list: &InstructionList) {
        match fast::compile(self, list) {
            Ok(path) => {
                tracing::debug!(steps = path.steps.len(), slots = path.variables.len(), "compiled fast path");
                list.set_fast_path(Some(Rc::new(path)));
            }
            Err(offending) => {
                let command = list.command(offending).map(ToString::to_string).unwrap_or_default();
                self.warn(format!(
                    "Failed to compile an execution list: offending command was {command}"
                ));
            }
        }
    }

    // ─── Accessors ───

    /// Value of the variable `name` (fully qualified).
    pub fn variable(&self, name: &str) -> &Value {
        self.variables.get_by_name(name)
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.set_by_name(name, value);
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.config.print_handler
    }

    pub(crate) fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    // ─── Formulas ───

    pub(crate) fn parse_statement_in(
        &mut self,
        text: &str,
        namespace: Option<&str>,
    ) -> Result<Statement, FormulaError> {
        let mut cx = ParseContext {
            variables: &mut self.variables,
            functions: &self.registry,
            namespace,
        };
        parse_statement(text, &mut cx)
    }

    pub(crate) fn parse_expression_in(
        &mut self,
        text: &str,
        namespace: Option<&str>,
    ) -> Result<Formula, FormulaError> {
        let mut cx = ParseContext {
            variables: &mut self.variables,
            functions: &self.registry,
            namespace,
        };
        parse_expression(text, &mut cx)
    }

    /// The statement of a formula command, parsed once and memoized unless
    /// it is volatile.
    pub(crate) fn compiled_statement(
        &mut self,
        command: &Command,
        namespace: Option<&str>,
    ) -> Result<Rc<Statement>, ExecError> {
        if let Some(Compiled::Statement(statement)) = command.compiled() {
            return Ok(statement);
        }
        let statement = self.parse_statement_in(command.text(0).unwrap_or_default(), namespace)?;
        let volatile = match &statement {
            Statement::Expression(value) | Statement::Assign { value, .. } => value.is_volatile(),
            Statement::AssignIndexed { target, value } => target.is_volatile() || value.is_volatile(),
        };
        let statement = Rc::new(statement);
        if !volatile {
            command.set_compiled(Compiled::Statement(Rc::clone(&statement)));
        }
        Ok(statement)
    }

    /// A condition or return expression carried by `command`, memoized the
    /// same way.
    pub(crate) fn compiled_expression(
        &mut self,
        command: &Command,
        text: &str,
        namespace: Option<&str>,
    ) -> Result<Rc<Formula>, ExecError> {
        if let Some(Compiled::Expression(formula)) = command.compiled() {
            return Ok(formula);
        }
        let formula = Rc::new(self.parse_expression_in(text, namespace)?);
        if !formula.is_volatile() {
            command.set_compiled(Compiled::Expression(Rc::clone(&formula)));
        }
        Ok(formula)
    }

    /// Parse and evaluate an argument text.
    pub(crate) fn evaluate_text(&mut self, text: &str, namespace: Option<&str>) -> Result<Value, ExecError> {
        let formula = self.parse_expression_in(text, namespace)?;
        Ok(formula.evaluate(self)?)
    }

    /// An argument evaluated to its text form.
    pub(crate) fn literal(&mut self, text: &str, namespace: Option<&str>) -> Result<String, ExecError> {
        Ok(self.evaluate_text(text, namespace)?.to_text())
    }

    pub(crate) fn number(&mut self, text: &str, namespace: Option<&str>) -> Result<f64, ExecError> {
        self.evaluate_text(text, namespace)?
            .as_number()
            .ok_or_else(|| ExecError::message(format!("'{text}' does not evaluate to a number")))
    }

    /// Qualified name of the stored object `name` refers to from `list`.
    pub(crate) fn resolve_object(&self, list: &InstructionList, name: &str) -> Option<String> {
        let qualified = list.qualify(name);
        if self.objects.contains(&qualified) {
            return Some(qualified);
        }
        self.objects.contains(name).then(|| name.to_string())
    }

    /// A construct argument: a stored object's qualified name, the
    /// argument's value, or its raw text when it is not an expression.
    ///
    /// The raw-text fallback lets bare payload identifiers pass through
    /// unevaluated.
    pub(crate) fn argument_value(&mut self, list: &InstructionList, text: &str) -> Value {
        if let Some(name) = self.resolve_object(list, text) {
            return Value::from(name);
        }
        self.evaluate_text(text, list.namespace()).unwrap_or_else(|err| {
            tracing::trace!(argument = text, error = %err, "argument kept as raw text");
            Value::from(text)
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaHost for Session {
    fn variables(&self) -> &VariableTable {
        &self.variables
    }

    fn call_function(
        &mut self,
        slot: usize,
        args: Vec<Value>,
        refs: &[Option<VarId>],
    ) -> Result<Value, EvalError> {
        self.call(slot, args, refs).map_err(|err| match err {
            ExecError::Eval(err) => err,
            other => EvalError::Call(other.to_string()),
        })
    }
}
