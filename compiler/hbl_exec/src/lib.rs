//! Execution engine for HBL instruction lists.
//!
//! A [`Session`] owns everything a batch program touches while it runs: the
//! variable table, the function registry, the named objects held for the
//! payload, open `fprintf` files and `fscanf` read positions. Programs are
//! built by `hbl_build` and executed here one command at a time.
//!
//! # Architecture
//!
//! - `dispatch`: the step loop and one handler per command family. The
//!   loop advances the program counter before a handler runs, so
//!   control-flow commands override it afterwards.
//! - [`ErrorChannel`]: the single place where an execution error either
//!   stops the run or is recorded in `LAST_EXECUTION_ERROR`.
//! - `fast`: lowering of purely numeric lists onto a flat `f64` array.
//! - [`Payload`] and [`Transport`]: seams for the numerical collaborators
//!   and the message transport.

mod channel;
mod config;
mod dispatch;
mod error;
mod fast;
pub mod payload;
mod print_handler;
mod session;
pub mod transport;

pub use channel::ErrorChannel;
pub use config::{SessionBuilder, SessionConfig};
pub use error::{ExecError, RunError};
pub use payload::{ObjectKind, ObjectRecord, ObjectStore, Payload, PayloadError, RecordingPayload};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler, StdoutPrintHandler,
};
pub use session::Session;
pub use transport::{LoopbackTransport, Transport, TransportError};

/// Language version reported by `GetString(.., HBL_VERSION, ..)` and
/// checked by `RequireVersion`.
pub const HBL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interpreter-visible variables with a fixed meaning.
pub mod globals {
    /// Non-zero selects soft error handling for every list.
    pub const EXECUTION_ERROR_HANDLING: &str = "HBL_EXECUTION_ERROR_HANDLING";
    /// Messages of errors recorded in soft mode, newline separated.
    pub const LAST_EXECUTION_ERROR: &str = "LAST_EXECUTION_ERROR";
    /// Set by `fscanf`/`sscanf`: 1 once the source is exhausted.
    pub const END_OF_FILE: &str = "END_OF_FILE";
    /// The choice names picked by the last `ChoiceList`.
    pub const SELECTION_STRINGS: &str = "SELECTION_STRINGS";
}
