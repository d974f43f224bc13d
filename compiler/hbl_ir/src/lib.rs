//! Intermediate representation for HBL programs.
//!
//! The builder lowers segmented statements into an [`InstructionList`]: a
//! flat vector of [`Command`]s whose control flow is expressed with jump
//! indices. This crate owns that representation and the tables around it.
//!
//! - [`Opcode`]: the closed set of command kinds.
//! - [`Command`]: opcode, positional parameters, build-time data and a
//!   memoized parse.
//! - [`InstructionList`]: commands plus the per-run state (program counter,
//!   saved call points, result, error mode, profiling, input redirect).
//! - [`KeywordTrie`]: longest-prefix classification of statements.
//! - [`FunctionRegistry`]: slot-stable user functions with namespace
//!   lookup.
//! - [`namespace`]: qualification helpers for dotted identifiers.

mod command;
mod keywords;
mod list;
pub mod namespace;
mod opcode;
mod registry;

pub use command::{
    Command, CommandData, Compiled, Jump, MergeMode, Parameter, ProfileAction, ReturnTarget,
    ScanFormat,
};
pub use keywords::{CountMismatch, ExtractSpec, Keyword, KeywordMatch, KeywordTrie, KEYWORDS};
pub use list::{ErrorMode, FastPath, FastStep, InputQueue, InstructionList, ProfileCounters};
pub use opcode::Opcode;
pub use registry::{Declared, FunctionClass, FunctionEntry, FunctionRegistry, ParameterKind};
