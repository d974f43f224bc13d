//! Stack growth guard for the batch-language engine.
//!
//! Statement building recurses once per nested block (`if` inside `for`
//! inside a function body), and execution recurses once per user function
//! call or `ExecuteCommands` invocation. Neither depth is bounded by the
//! language, so both paths run their recursive step through
//! [`ensure_sufficient_stack`].
//!
//! On native targets the guard is backed by `stacker`; on `wasm32` it is a
//! plain call.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// `wasm32` has no segmented stacks; call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
