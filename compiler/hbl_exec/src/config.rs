//! Session configuration.

use std::path::PathBuf;

use hbl_ir::ErrorMode;

use crate::{stdout_handler, Payload, RecordingPayload, Session, SharedPrintHandler, Transport};

/// Default bound on nested user function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Settings a [`Session`] keeps for its whole life.
#[derive(Clone)]
pub struct SessionConfig {
    /// Error mode of top-level lists; nested lists inherit from the list
    /// that creates them.
    pub error_mode: ErrorMode,
    /// Directories consulted by `#include`, `ExecuteAFile` and
    /// `LoadFunctionLibrary` after the including file's own directory.
    pub search_paths: Vec<PathBuf>,
    /// A failed `assert` prints its message and ends the current list
    /// instead of reporting an error.
    pub soft_assertions: bool,
    /// Try the numeric fast path for top-level programs.
    pub compile: bool,
    pub print_handler: SharedPrintHandler,
    pub max_call_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            error_mode: ErrorMode::Abort,
            search_paths: Vec::new(),
            soft_assertions: false,
            compile: false,
            print_handler: stdout_handler(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Builder for [`Session`].
///
/// Starts from [`SessionConfig::default`] with a [`RecordingPayload`] and no
/// message transport.
pub struct SessionBuilder {
    config: SessionConfig,
    payload: Option<Box<dyn Payload>>,
    transport: Option<Box<dyn Transport>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        SessionBuilder {
            config: SessionConfig::default(),
            payload: None,
            transport: None,
        }
    }

    #[must_use]
    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.config.error_mode = mode;
        self
    }

    /// Append one library directory.
    #[must_use]
    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.search_paths.push(dir.into());
        self
    }

    #[must_use]
    pub fn search_paths(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.config.search_paths.extend(dirs);
        self
    }

    #[must_use]
    pub fn soft_assertions(mut self, soft: bool) -> Self {
        self.config.soft_assertions = soft;
        self
    }

    #[must_use]
    pub fn compile(mut self, compile: bool) -> Self {
        self.config.compile = compile;
        self
    }

    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.config.print_handler = handler;
        self
    }

    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    /// Replace the object layer collaborator.
    #[must_use]
    pub fn payload(mut self, payload: Box<dyn Payload>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Install a message transport for `MPISend`/`MPIReceive`.
    #[must_use]
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Session {
        let payload = self
            .payload
            .unwrap_or_else(|| Box::new(RecordingPayload::default()));
        Session::from_parts(self.config, payload, self.transport)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
