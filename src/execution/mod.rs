//! Command execution engine.
//!
//! This module provides:
//! - Shell-safe argument building
//! - Blocking execution with a wall-clock timeout
//! - Strict execution that fails on a non-zero exit code
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hiatus::execution::{run, Command};
//!
//! let result = run(&Command::new("grep").arg("needle").stdin("hay\nneedle\n")).unwrap();
//! assert_eq!(result.stdout_text(), "needle\n");
//!
//! let cmd = Command::new("make")
//!     .named("JOBS", "4")
//!     .timeout(Duration::from_secs(60));
//! ```

mod command;
mod pipe;
mod result;
mod runner;

pub use command::{build, quote, Argument, Arguments, Command};
pub use result::{ExecutionResult, StrictOutput};
pub use runner::{
    run, run_strict, run_with_timeout, ProcessRunner, RunnerConfig, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_SHELL, DEFAULT_SHELL_FLAG,
};
