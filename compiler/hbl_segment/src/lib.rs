//! Statement segmentation for HBL batch source.
//!
//! Batch source is a stream of `;`-terminated statements and `{}` blocks.
//! This crate cuts that stream into normalized statements and splits the
//! parenthesized argument lists that most commands carry. It knows nothing
//! about what a statement *means*; classification happens in `hbl_build`.
//!
//! # Architecture
//!
//! - [`SourceCursor`]: a borrowed view over the unread part of a source
//!   buffer. Builders pass sub-slices around instead of mutating one shared
//!   string in place.
//! - [`next_statement`]: pulls one balanced statement off a cursor, with
//!   comments removed and whitespace compressed.
//! - [`extract_conditions`]: splits `a, (b, c), d)` at top-level delimiters.
//! - [`scan`]: small helpers shared by the builders (terminator search,
//!   identifier validation, brace unwrapping).

mod cursor;
mod error;
mod extract;
pub mod scan;
mod segmenter;

pub use cursor::SourceCursor;
pub use error::SegmentError;
pub use extract::{extract_conditions, Conditions};
pub use segmenter::{next_statement, segment_all, PRESERVE_SPACE_KEYWORDS};
