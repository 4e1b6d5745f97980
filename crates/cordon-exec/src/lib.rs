//! Sandboxed process execution: driver composition, scrubbed environment,
//! bounded time, optional streaming, graceful-then-forceful termination.

pub mod executor;
pub mod wrapper;

pub use executor::{ExecEvent, ExecRequest, Executor};
pub use wrapper::{compose_driver, escape_single_quotes, needs_shell, SHELL_METACHARACTERS};
