//! Statement classification and list assembly.
//!
//! [`Builder::build_list`] pulls statements off a [`SourceCursor`] and
//! dispatches each on its keyword. The work is split by construct family:
//!
//! - `control`: `if`/`else`, `for`, `while`, `do`-`while`, `break`, `continue`
//! - `functions`: `function`/`ffunction`/`lfunction`, `namespace`, `return`
//! - `constructs`: typed declarations, call-style commands, `#include`,
//!   `#profile`

mod constructs;
mod control;
mod functions;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

use std::path::{Path, PathBuf};

use hbl_ir::{
    Command, CountMismatch, ExtractSpec, FunctionRegistry, InstructionList, Keyword, KeywordTrie,
    Opcode,
};
use hbl_segment::{extract_conditions, next_statement, scan, Conditions, SourceCursor};

use crate::BuildError;

/// A `break` or `continue` waiting for its loop's layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LoopExit {
    Break(usize),
    Continue(usize),
}

/// Build state of one instruction list.
struct Frame {
    list: InstructionList,
    /// Indices of `if` jumps an `else` may still latch on to.
    last_if: Vec<usize>,
    /// `return` commands to patch with the body's terminal index.
    returns: Vec<usize>,
}

impl Frame {
    fn new(source: &str, namespace: Option<String>) -> Self {
        Frame {
            list: InstructionList::new(source, namespace),
            last_if: Vec::new(),
            returns: Vec::new(),
        }
    }
}

/// Lowers batch source into instruction lists.
///
/// A builder borrows the session's function registry for the duration of a
/// build; it also tracks the stack of files being read so nested `#include`
/// paths resolve relative to the including file.
pub struct Builder<'r> {
    registry: &'r mut FunctionRegistry,
    search_paths: Vec<PathBuf>,
    file_stack: Vec<PathBuf>,
    warnings: Vec<String>,
    in_function: bool,
}

impl<'r> Builder<'r> {
    pub fn new(registry: &'r mut FunctionRegistry) -> Self {
        Builder {
            registry,
            search_paths: Vec::new(),
            file_stack: Vec::new(),
            warnings: Vec::new(),
            in_function: false,
        }
    }

    /// Directories consulted by `#include` after the including file's own.
    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// The file the source being built was read from.
    #[must_use]
    pub fn with_source_file(mut self, path: Option<PathBuf>) -> Self {
        self.file_stack.extend(path);
        self
    }

    /// Build `source` into a list tagged with `namespace`. Empty input
    /// yields an empty list.
    pub fn build(
        &mut self,
        source: &str,
        namespace: Option<&str>,
    ) -> Result<InstructionList, BuildError> {
        self.build_list(source, namespace, true)
    }

    /// Build `source`; with `allow_empty` unset, source that produces no
    /// command is an error.
    pub fn build_list(
        &mut self,
        source: &str,
        namespace: Option<&str>,
        allow_empty: bool,
    ) -> Result<InstructionList, BuildError> {
        let mut frame = self.build_frame(source, namespace.map(str::to_string))?;
        if !allow_empty && frame.list.is_empty() {
            return Err(BuildError::Empty(source.to_string()));
        }
        frame.list.set_source_file(self.current_file().map(Path::to_path_buf));
        tracing::debug!(
            commands = frame.list.len(),
            namespace = frame.list.namespace().unwrap_or_default(),
            "built instruction list"
        );
        Ok(frame.list)
    }

    /// Warnings raised since the last call, oldest first.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn current_file(&self) -> Option<&Path> {
        self.file_stack.last().map(PathBuf::as_path)
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Build a whole list, patching its `return` sites when it is a function
    /// body.
    fn build_frame(&mut self, source: &str, namespace: Option<String>) -> Result<Frame, BuildError> {
        let mut frame = Frame::new(source, namespace);
        self.build_into(&mut frame, source, None)?;
        let end = frame.list.len();
        for at in std::mem::take(&mut frame.returns) {
            if let Some(command) = frame.list.command_mut(at) {
                command.set_return_target(hbl_ir::ReturnTarget::Index(end));
            }
        }
        Ok(frame)
    }

    /// Append the commands of every statement in `source` to `frame`.
    fn build_into(
        &mut self,
        frame: &mut Frame,
        source: &str,
        mut exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let mut cursor = SourceCursor::new(source);
        while !cursor.is_empty() {
            let statement = next_statement(&mut cursor)?;
            let statement = statement.strip_prefix('}').unwrap_or(&statement);
            if statement.is_empty() {
                continue;
            }
            hbl_stack::ensure_sufficient_stack(|| {
                self.statement(frame, statement, exits.as_deref_mut())
            })?;
        }
        Ok(())
    }

    fn statement(
        &mut self,
        frame: &mut Frame,
        text: &str,
        exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let Some(matched) = KeywordTrie::standard().longest_prefix(text) else {
            return self.formula(frame, text, exits);
        };
        tracing::trace!(keyword = %matched.keyword, statement = text, "classified statement");

        let pieces = match matched.keyword.extract_spec() {
            Some(spec) => Some(extract_checked(text, matched.len, spec)?),
            None => None,
        };

        match (matched.keyword, pieces) {
            (Keyword::For, Some(header)) => self.build_for(frame, text, &header),
            (Keyword::While, Some(header)) => self.build_while(frame, text, &header),
            (Keyword::Break | Keyword::Continue, _) => {
                control::loop_exit(frame, text, matched.keyword, exits)
            }
            (Keyword::If, _) => self.build_if(frame, text, exits),
            (Keyword::Else, _) => self.build_else(frame, text, exits),
            (Keyword::Do, _) => self.build_do_while(frame, text),
            (Keyword::Return, _) => {
                self.build_return(frame, text);
                Ok(())
            }
            (Keyword::Function, _) => self.build_function(frame, text, hbl_ir::FunctionClass::Ordinary),
            (Keyword::FFunction, _) => {
                self.build_function(frame, text, hbl_ir::FunctionClass::SkipUpdate)
            }
            (Keyword::LFunction, _) => self.build_function(frame, text, hbl_ir::FunctionClass::Local),
            (Keyword::Namespace, _) => self.build_namespace(frame, text),
            (Keyword::Include, _) => self.build_include(frame, text, exits),
            (Keyword::Profile, _) => constructs::profile(frame, text),
            (Keyword::Command(opcode), Some(args)) => {
                frame
                    .list
                    .push(Command::new(opcode, text).with_texts(args.pieces));
                Ok(())
            }
            (keyword, _) => self.construct(frame, text, keyword),
        }
    }

    /// Anything without a keyword: an expression statement, or a compound
    /// line that is split and built piecewise.
    fn formula(
        &mut self,
        frame: &mut Frame,
        text: &str,
        exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let mut cursor = SourceCursor::new(text);
        next_statement(&mut cursor)?;
        if !cursor.remaining().trim().is_empty() {
            return self.build_into(frame, text, exits);
        }
        if text.len() <= 1 {
            return Ok(());
        }
        let formula = text.trim_end_matches(';');
        frame
            .list
            .push(Command::new(Opcode::Formula, formula).with_text(formula));
        Ok(())
    }
}

/// Split the argument list opening at `start` and validate its length.
fn extract_checked(text: &str, start: usize, spec: ExtractSpec) -> Result<Conditions, BuildError> {
    let conditions = extract_conditions(text, start, spec.delimiter, true);
    let statement = || text[..conditions.rest_offset(text)].to_string();
    match spec.check(conditions.len()) {
        Ok(()) => Ok(conditions),
        Err(CountMismatch::OneOf(expected)) => Err(BuildError::ArgumentCount {
            found: conditions.len(),
            expected,
            statement: statement(),
        }),
        Err(CountMismatch::AtLeast(minimum)) => Err(BuildError::ArgumentMinimum {
            found: conditions.len(),
            minimum,
            statement: statement(),
        }),
    }
}

/// The inside of a `{ ... }` block when the first brace closes at the very
/// end; otherwise `text` unchanged.
fn block_body(text: &str) -> &str {
    let mut body = text;
    while body.starts_with('{')
        && scan::find_terminator(body, 1, '}').is_some_and(|close| close + 1 == body.len())
    {
        body = &body[1..body.len() - 1];
    }
    body
}
