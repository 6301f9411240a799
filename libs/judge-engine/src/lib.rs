//! Untrusted code execution: wrap a function body per language, run it in an
//! isolate against each test case, and grade the output.

pub mod binder;
pub mod config;
pub mod docker;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod isolate;
pub mod language;
pub mod runner;
pub mod workspace;
pub mod wrap;

#[cfg(test)]
mod testing;


pub use error::{BindError, ExecutionError, IsolateError, RunnerError};
pub use executor::Executor;
pub use isolate::Isolate;
