//! Iteration pipeline core for driving an AI coding agent in a bounded loop.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (result normalization, the
//!   termination policy, event records). No I/O.
//! - **[`io`]**: Side-effecting operations (result/status files, the locked
//!   audit log, config). Provider execution sits behind a trait.
//!
//! [`looping`] composes them into a session driver; the `pipeline` binary
//! exposes the pieces to shell scripts.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{PipelineError, Result};
