//! Code execution capability
//!
//! The session never runs code itself. It hands the extracted body to an
//! [`Executor`], which returns whatever text the run produced. An executor
//! has no failure path: a crash, a missing interpreter or a non-zero exit is
//! reported as text inside the captured output.

pub mod process;

pub use process::ProcessExecutor;

use std::future::Future;

/// Runs a code fragment and captures its output
pub trait Executor {
    /// Execute `code` written in `language` and return the captured text
    ///
    /// Must not panic or return early on faults; diagnostics belong in the
    /// returned string.
    fn execute(&self, language: &str, code: &str) -> impl Future<Output = String>;
}

impl<E: Executor> Executor for &E {
    fn execute(&self, language: &str, code: &str) -> impl Future<Output = String> {
        (**self).execute(language, code)
    }
}
