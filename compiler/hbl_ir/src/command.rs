//! Commands: one compiled operation each.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hbl_formula::{Formula, Statement};

use crate::{InstructionList, Opcode};

/// A positional command argument.
#[derive(Debug)]
pub enum Parameter {
    /// Unparsed argument text, interpreted by the handler.
    Text(String),
    /// A compiled block, as carried by a `namespace` command.
    List(Rc<InstructionList>),
}

/// Branch targets of a jump command.
///
/// An unconditional jump always goes to `on_true`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jump {
    pub condition: Option<String>,
    pub on_true: usize,
    pub on_false: usize,
}

impl Jump {
    pub fn to(target: usize) -> Self {
        Jump {
            condition: None,
            on_true: target,
            on_false: target,
        }
    }
}

/// Where control goes after a `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnTarget {
    /// Outside any function: leave the current list.
    Exit,
    /// Inside a function body: the body's terminal index.
    Index(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergeMode {
    Concatenate,
    Combine,
}

/// One `fscanf`/`sscanf` format descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanFormat {
    Number,
    Matrix,
    NumericMatrix,
    Tree,
    String,
    Raw,
    Lines,
}

impl ScanFormat {
    pub fn from_name(name: &str) -> Option<ScanFormat> {
        Some(match name {
            "Number" => ScanFormat::Number,
            "Matrix" => ScanFormat::Matrix,
            "NMatrix" => ScanFormat::NumericMatrix,
            "Tree" => ScanFormat::Tree,
            "String" => ScanFormat::String,
            "Raw" => ScanFormat::Raw,
            "Lines" => ScanFormat::Lines,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ScanFormat::Number => "Number",
            ScanFormat::Matrix => "Matrix",
            ScanFormat::NumericMatrix => "NMatrix",
            ScanFormat::Tree => "Tree",
            ScanFormat::String => "String",
            ScanFormat::Raw => "Raw",
            ScanFormat::Lines => "Lines",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProfileAction {
    Start,
    Pause,
    Resume,
    /// Store the collected statistics in the receptacle named by the first
    /// parameter.
    Collect,
}

/// Flags and targets fixed when the command is built.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CommandData {
    #[default]
    None,
    Jump(Jump),
    Return(ReturnTarget),
    Merge { mode: MergeMode, purge: bool },
    Scan { formats: Vec<ScanFormat>, rewind: bool },
    Execute { compiled: bool },
    DataSet { from_string: bool },
    Likelihood { explicit_frequencies: bool },
    Choice { inline: bool },
    Profile(ProfileAction),
}

/// Parsed form memoized on first execution.
#[derive(Clone, Debug)]
pub enum Compiled {
    Statement(Rc<Statement>),
    Expression(Rc<Formula>),
}

/// A single compiled operation.
#[derive(Debug)]
pub struct Command {
    opcode: Opcode,
    parameters: Vec<Parameter>,
    data: CommandData,
    /// Statement text the command was built from.
    source: String,
    cache: RefCell<Option<Compiled>>,
}

impl Command {
    pub fn new(opcode: Opcode, source: impl Into<String>) -> Self {
        Command {
            opcode,
            parameters: Vec::new(),
            data: CommandData::None,
            source: source.into(),
            cache: RefCell::new(None),
        }
    }

    /// An unresolved site, patched into a jump later.
    pub fn placeholder(source: impl Into<String>) -> Self {
        Command::new(Opcode::Nop, source)
    }

    pub fn jump(jump: Jump, source: impl Into<String>) -> Self {
        Command::new(Opcode::Jump, source).with_data(CommandData::Jump(jump))
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parameters.push(Parameter::Text(text.into()));
        self
    }

    #[must_use]
    pub fn with_texts<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters
            .extend(texts.into_iter().map(|t| Parameter::Text(t.into())));
        self
    }

    #[must_use]
    pub fn with_list(mut self, list: Rc<InstructionList>) -> Self {
        self.parameters.push(Parameter::List(list));
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: CommandData) -> Self {
        self.data = data;
        self
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[inline]
    pub fn data(&self) -> &CommandData {
        &self.data
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Text of parameter `i`; `None` when absent or a nested list.
    pub fn text(&self, i: usize) -> Option<&str> {
        match self.parameters.get(i) {
            Some(Parameter::Text(t)) => Some(t),
            _ => None,
        }
    }

    /// All textual parameters from `from` on.
    pub fn texts_from(&self, from: usize) -> impl Iterator<Item = &str> {
        self.parameters.iter().skip(from).filter_map(|p| match p {
            Parameter::Text(t) => Some(t.as_str()),
            Parameter::List(_) => None,
        })
    }

    pub fn nested_list(&self) -> Option<&Rc<InstructionList>> {
        self.parameters.iter().find_map(|p| match p {
            Parameter::List(list) => Some(list),
            Parameter::Text(_) => None,
        })
    }

    pub fn as_jump(&self) -> Option<&Jump> {
        match &self.data {
            CommandData::Jump(jump) => Some(jump),
            _ => None,
        }
    }

    /// Turn this command into a jump, keeping an existing condition when
    /// `condition` is `None` (the `else` latch re-targets an `if` this way).
    pub fn make_jump(&mut self, condition: Option<String>, on_true: usize, on_false: usize) {
        let condition = condition.or_else(|| match &self.data {
            CommandData::Jump(jump) => jump.condition.clone(),
            _ => None,
        });
        self.opcode = Opcode::Jump;
        self.data = CommandData::Jump(Jump {
            condition,
            on_true,
            on_false,
        });
        self.cache.replace(None);
    }

    pub fn jump_mut(&mut self) -> Option<&mut Jump> {
        match &mut self.data {
            CommandData::Jump(jump) => Some(jump),
            _ => None,
        }
    }

    pub fn set_return_target(&mut self, target: ReturnTarget) {
        if let CommandData::Return(t) = &mut self.data {
            *t = target;
        }
    }

    /// The memoized parse, if any. Cloned so no borrow outlives the call.
    pub fn compiled(&self) -> Option<Compiled> {
        self.cache.borrow().clone()
    }

    pub fn set_compiled(&self, compiled: Compiled) {
        self.cache.replace(Some(compiled));
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.opcode, &self.data) {
            (Opcode::Formula, _) => write!(f, "{}", self.text(0).unwrap_or_default()),
            (Opcode::Jump, CommandData::Jump(jump)) => match &jump.condition {
                Some(cond) => write!(
                    f,
                    "Branch under condition '{cond}' to step {}, else to step {}",
                    jump.on_true, jump.on_false
                ),
                None => write!(f, "Go to step {}", jump.on_true),
            },
            (Opcode::Return, _) => match self.text(0) {
                Some(expr) => write!(f, "Return '{expr}'"),
                None => f.write_str("Return"),
            },
            (Opcode::NestedList, _) => {
                let list = self.nested_list();
                write!(
                    f,
                    "namespace {} ({} commands)",
                    list.and_then(|l| l.namespace()).unwrap_or_default(),
                    list.map_or(0, |l| l.len())
                )
            }
            (Opcode::Nop, _) => write!(f, "Unresolved '{}'", self.source),
            (opcode, _) => {
                write!(f, "{opcode}(")?;
                for (i, text) in self.texts_from(0).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(text)?;
                }
                f.write_str(")")
            }
        }
    }
}
