//! Command Builder for HBL.
//!
//! Turns batch source into an [`hbl_ir::InstructionList`]. Statements come
//! off the segmenter one at a time and are classified by their keyword
//! prefix; structured constructs (`if`/`else`, loops, functions, namespace
//! blocks) recurse into the builder and are lowered to explicit jumps,
//! everything else becomes a single command.
//!
//! Function declarations are installed into the [`hbl_ir::FunctionRegistry`]
//! the builder borrows, so building has a side effect on the session even
//! when only part of the source is accepted.

mod builder;
mod error;
pub mod paths;

pub use builder::Builder;
pub use error::BuildError;
