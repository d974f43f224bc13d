//! Instruction lists.
//!
//! An [`InstructionList`] is built once, then shared behind an `Rc` by the
//! registry, nested `namespace` commands and the dispatcher. Everything that
//! changes while it runs (program counter, saved call points, result,
//! error state, profiling, input redirect, fast-path cache) sits in cells, so
//! a list can re-enter itself through recursive function calls.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hbl_formula::simple::SimpleProgram;
use hbl_formula::{Value, VarId};

use crate::{namespace, Command};

#[cfg(test)]
mod tests;

/// How execution errors raised by commands of this list are handled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// The run stops.
    #[default]
    Abort,
    /// The message is recorded and execution continues.
    Soft,
}

/// Queued lines served to `stdin` reads.
pub type InputQueue = Rc<RefCell<VecDeque<String>>>;

/// Per-command time and hit counts collected by `#profile`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileCounters {
    pub seconds: Vec<f64>,
    pub hits: Vec<u64>,
    pub active: bool,
}

impl ProfileCounters {
    pub fn new(len: usize) -> Self {
        ProfileCounters {
            seconds: vec![0.0; len],
            hits: vec![0; len],
            active: true,
        }
    }

    pub fn record(&mut self, index: usize, seconds: f64) {
        if let (Some(s), Some(h)) = (self.seconds.get_mut(index), self.hits.get_mut(index)) {
            *s += seconds;
            *h += 1;
        }
    }
}

/// One step of a list compiled for the numeric fast path.
#[derive(Clone, Debug, PartialEq)]
pub enum FastStep {
    /// Evaluate; store into `values[store]` when present.
    Compute {
        program: SimpleProgram,
        store: Option<usize>,
    },
    /// Evaluate value, row and column, then write the matrix cell.
    StoreCell { program: SimpleProgram, matrix: VarId },
    /// Jump; without a program the branch is unconditional.
    Branch {
        program: Option<SimpleProgram>,
        on_true: usize,
        on_false: usize,
    },
}

/// A whole list lowered onto a flat `f64` value array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FastPath {
    /// Real variable behind each array slot.
    pub variables: Vec<VarId>,
    /// Slots written by some step; only these are copied back.
    pub written: Vec<usize>,
    /// Parallel to the list's commands.
    pub steps: Vec<FastStep>,
    pub stack_depth: usize,
}

/// A compiled program, function body or namespace block.
#[derive(Debug, Default)]
pub struct InstructionList {
    commands: Vec<Command>,
    namespace: Option<String>,
    enclosing_namespace: Option<String>,
    source_text: String,
    source_file: Option<PathBuf>,

    pc: Cell<usize>,
    call_points: RefCell<Vec<usize>>,
    result: RefCell<Value>,
    error_mode: Cell<ErrorMode>,
    error_flag: Cell<bool>,
    profile: RefCell<Option<ProfileCounters>>,
    input: RefCell<Option<InputQueue>>,
    fast_path: RefCell<Option<Rc<FastPath>>>,
}

impl InstructionList {
    pub fn new(source_text: impl Into<String>, namespace: Option<String>) -> Self {
        InstructionList {
            source_text: source_text.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
            ..InstructionList::default()
        }
    }

    // ─── Construction ───

    /// Append a command, returning its index.
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub fn command_mut(&mut self, index: usize) -> Option<&mut Command> {
        self.commands.get_mut(index)
    }

    /// Drop every command from `len` on (undoing a failed construct).
    pub fn truncate(&mut self, len: usize) {
        self.commands.truncate(len);
    }

    pub fn set_enclosing_namespace(&mut self, namespace: Option<String>) {
        self.enclosing_namespace = namespace;
    }

    pub fn set_source_file(&mut self, path: Option<PathBuf>) {
        self.source_file = path;
    }

    // ─── Shape ───

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn enclosing_namespace(&self) -> Option<&str> {
        self.enclosing_namespace.as_deref()
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// `id` qualified by this list's namespace.
    pub fn qualify(&self, id: &str) -> String {
        namespace::qualify(id, self.namespace())
    }

    /// `id` qualified by this list's namespace extended with `extra`.
    pub fn qualify_with(&self, id: &str, extra: Option<&str>) -> String {
        namespace::qualify(id, namespace::nest(self.namespace(), extra).as_deref())
    }

    pub fn trim_namespace<'a>(&self, id: &'a str) -> &'a str {
        namespace::trim(id, self.namespace())
    }

    // ─── Program counter ───

    #[inline]
    pub fn pc(&self) -> usize {
        self.pc.get()
    }

    #[inline]
    pub fn set_pc(&self, pc: usize) {
        self.pc.set(pc.min(self.len()));
    }

    /// Step past the current command; handlers call this before their work
    /// so control-flow commands can override it afterwards.
    #[inline]
    pub fn advance(&self) {
        self.set_pc(self.pc.get() + 1);
    }

    /// Jump to the terminal state.
    pub fn finish(&self) {
        self.pc.set(self.len());
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.pc.get() >= self.len()
    }

    /// Start a (possibly re-entrant) run: save the counter and rewind.
    pub fn enter(&self) {
        self.call_points.borrow_mut().push(self.pc.get());
        self.pc.set(0);
        self.result.replace(Value::Undefined);
    }

    /// End a run started with [`enter`](Self::enter).
    pub fn leave(&self) {
        let saved = self.call_points.borrow_mut().pop().unwrap_or(0);
        self.pc.set(saved);
    }

    /// Nesting depth of active runs of this list.
    pub fn active_runs(&self) -> usize {
        self.call_points.borrow().len()
    }

    // ─── Result ───

    pub fn set_result(&self, value: Value) {
        self.result.replace(value);
    }

    pub fn result(&self) -> Value {
        self.result.borrow().clone()
    }

    pub fn take_result(&self) -> Value {
        self.result.take()
    }

    // ─── Errors ───

    #[inline]
    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode.get()
    }

    pub fn set_error_mode(&self, mode: ErrorMode) {
        self.error_mode.set(mode);
    }

    #[inline]
    pub fn error_flag(&self) -> bool {
        self.error_flag.get()
    }

    pub fn set_error_flag(&self, flag: bool) {
        self.error_flag.set(flag);
    }

    // ─── Profiling ───

    pub fn start_profile(&self) {
        self.profile.replace(Some(ProfileCounters::new(self.len())));
    }

    pub fn set_profile_active(&self, active: bool) {
        if let Some(p) = self.profile.borrow_mut().as_mut() {
            p.active = active;
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profile.borrow().as_ref().is_some_and(|p| p.active)
    }

    pub fn record_profile(&self, index: usize, seconds: f64) {
        if let Some(p) = self.profile.borrow_mut().as_mut() {
            p.record(index, seconds);
        }
    }

    pub fn profile(&self) -> Option<ProfileCounters> {
        self.profile.borrow().clone()
    }

    // ─── Input redirect ───

    pub fn input(&self) -> Option<InputQueue> {
        self.input.borrow().clone()
    }

    pub fn set_input(&self, queue: Option<InputQueue>) {
        self.input.replace(queue);
    }

    /// Pop the next redirected line; `None` when no redirect is active.
    /// An exhausted redirect yields `Some(None)`.
    pub fn next_input(&self) -> Option<Option<String>> {
        self.input
            .borrow()
            .as_ref()
            .map(|queue| queue.borrow_mut().pop_front())
    }

    // ─── Fast path ───

    pub fn fast_path(&self) -> Option<Rc<FastPath>> {
        self.fast_path.borrow().clone()
    }

    pub fn set_fast_path(&self, fast: Option<Rc<FastPath>>) {
        self.fast_path.replace(fast);
    }
}

impl fmt::Display for InstructionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "Step {i}. {command}")?;
        }
        Ok(())
    }
}
