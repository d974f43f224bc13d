//! Segmentation errors.

use thiserror::Error;

/// A statement that cannot be cut out of the source.
///
/// Every variant leaves the cursor exhausted: segmentation does not try to
/// resynchronize after malformed input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// A `)` or `]` with no matching opener.
    #[error("Too many closing '{closer}' near '{near}'.")]
    TooManyClosing { closer: char, near: String },

    /// Input ended inside a literal, a block comment, or open grouping.
    #[error(
        "Expression appears to be incomplete/syntax error. {{}} scope: {scope}, () depth {parens}, matrix scope: {matrix}.{literal}{comment}\n{source_text}"
    )]
    Incomplete {
        scope: i32,
        parens: i32,
        matrix: i32,
        literal: &'static str,
        comment: &'static str,
        source_text: String,
    },

    /// Leading `{` run with no trailing `}` run at least as long.
    #[error("Expression appears to be incomplete/syntax error and will be ignored:{0}")]
    UnbalancedWrapper(String),
}
