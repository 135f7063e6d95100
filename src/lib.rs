//! # hiatus
//!
//! Run shell commands with captured output and a hard wall-clock timeout.
//!
//! A command is built from a trusted base string plus individually
//! escaped arguments, run through the shell with stdout and stderr piped
//! back, and killed if it outlives its timeout. The child is always
//! reaped before a call returns.
//!
//! ## Features
//!
//! - **Safe arguments**: every appended argument is shell-quoted
//! - **Timeouts**: a deadline-driven polling loop with forceful kill
//! - **Full capture**: stdout and stderr collected as raw bytes
//! - **Strict mode**: turn a non-zero exit into an error
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use hiatus::{Command, ProcessRunner};
//!
//! fn main() -> hiatus::Result<()> {
//!     hiatus::logging::try_init().ok();
//!
//!     let runner = ProcessRunner::default();
//!     let cmd = Command::new("echo")
//!         .arg("hello world")
//!         .named("name", "x y")
//!         .timeout(Duration::from_secs(5));
//!
//!     let result = runner.run(&cmd)?;
//!     println!("exit {:?}: {}", result.exit_code, result.stdout_text());
//!
//!     let output = runner.run_strict(&Command::new("uname -s"))?;
//!     println!("{}", output.stdout_text());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use error::{HiatusError, Result};
pub use execution::{
    build, run, run_strict, run_with_timeout, Argument, Arguments, Command, ExecutionResult,
    ProcessRunner, RunnerConfig, StrictOutput,
};
