//! Construction errors.

use std::io;
use std::path::PathBuf;

use hbl_segment::SegmentError;
use thiserror::Error;

/// A statement that could not be turned into commands.
///
/// Building stops at the first error; the partially built list is dropped.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(
        "Incorrect number of arguments ({found}) supplied: expected one of {expected}, while processing '{statement}'. "
    )]
    ArgumentCount {
        found: usize,
        expected: String,
        statement: String,
    },

    #[error(
        "Incorrect number of arguments ({found}) supplied: expected at least {minimum}, while processing '{statement}'. "
    )]
    ArgumentMinimum {
        found: usize,
        minimum: usize,
        statement: String,
    },

    /// `break` or `continue` outside any loop body.
    #[error("{0} only makes sense in the context of a loop.")]
    OutsideLoop(String),

    #[error("'else' w/o an if to latch on to...")]
    ElseWithoutIf,

    #[error("'if' header makes no sense")]
    IfHeader,

    #[error("An if-then-else scoping error. Check opening and closing brackets and double else's.")]
    IfScoping,

    #[error("Malformed while clause in a do-while loop")]
    MalformedDoWhile,

    #[error("Could not find a matching 'while' in the definition of a do-while loop")]
    MissingWhile,

    #[error("Nested function declarations are not allowed")]
    NestedFunction,

    #[error(
        "Function declaration missing a valid function identifier or parameter list.\n-----------\n{0}\n-----------\n"
    )]
    FunctionHeader(String),

    #[error("Not a valid function/namespace identifier '{0}'")]
    InvalidFunctionName(String),

    #[error("Function declaration is missing a valid function body.")]
    MissingFunctionBody,

    #[error("Namespace declaration is missing a body.")]
    MissingNamespaceBody,

    #[error(
        "#include missing a meaningful filename. Check that there is a ';' at the end of the statement. Had \"{0}\""
    )]
    IncludeFilename(String),

    #[error("Could not read batch file '{}'.", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A declaration or call whose shape does not fit its grammar.
    #[error("{0}")]
    Malformed(String),

    #[error("No commands could be built from '{0}'")]
    Empty(String),
}

impl BuildError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        BuildError::Malformed(message.into())
    }
}
