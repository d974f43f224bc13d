//! Execution errors.

use std::io;
use std::path::PathBuf;

use hbl_build::BuildError;
use hbl_formula::{EvalError, FormulaError};
use thiserror::Error;

use crate::{PayloadError, TransportError};

/// A command that failed while executing.
///
/// Handlers return these; the [`ErrorChannel`](crate::ErrorChannel)
/// decides whether the run stops or the message is recorded.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Source handed to `ExecuteCommands` and friends did not build.
    #[error("Encountered an error while parsing HBL: {0}")]
    NestedBuild(#[from] BuildError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{action} '{}' failed: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{name}' expects {expected} argument(s), {found} were supplied")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Maximum call depth of {0} exceeded")]
    CallDepth(usize),

    /// A descriptive failure raised by a command handler.
    #[error("{0}")]
    Message(String),
}

impl ExecError {
    pub(crate) fn message(message: impl Into<String>) -> Self {
        ExecError::Message(message.into())
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExecError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Outcome of running a whole program at a top-level boundary.
#[derive(Debug, Error)]
pub enum RunError {
    /// The source did not build; nothing ran.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A fatal execution error stopped the run.
    #[error(transparent)]
    Execution(#[from] ExecError),

    #[error("Could not read batch file '{}': {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
