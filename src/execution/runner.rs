//! Process runner.
//!
//! Spawns a shell command with piped output, drains both streams while
//! tracking a deadline, and always kills and reaps the child before
//! returning.

use std::io::{self, Write};
use std::process::{Child, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::command::Command;
use super::pipe::OutputPipes;
use super::result::{ExecutionResult, StrictOutput};
use crate::error::HiatusError;
use crate::Result;

/// Default shell used to interpret command lines.
#[cfg(unix)]
pub const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd.exe";

/// Flag telling [`DEFAULT_SHELL`] to run the next argument as a command.
#[cfg(unix)]
pub const DEFAULT_SHELL_FLAG: &str = "-c";
#[cfg(windows)]
pub const DEFAULT_SHELL_FLAG: &str = "/C";

/// Default buffer size for reading child output.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Settings shared by every run of a [`ProcessRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Shell program.
    pub shell: String,
    /// Flag passed before the command line.
    pub shell_flag: String,
    /// Size of each read from the output pipes.
    pub read_buffer_size: usize,
    /// Timeout applied when a [`Command`] has none.
    pub default_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            shell_flag: DEFAULT_SHELL_FLAG.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            default_timeout: None,
        }
    }
}

impl RunnerConfig {
    /// Use a different shell.
    pub fn with_shell(mut self, shell: impl Into<String>, flag: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.shell_flag = flag.into();
        self
    }

    /// Set the fallback timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set the read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

/// Runs commands through a shell with full output capture.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run a command until it exits or its timeout expires.
    ///
    /// Only a failure to create the child is an error. A timeout is
    /// reported through [`ExecutionResult::timed_out`].
    pub fn run(&self, command: &Command) -> Result<ExecutionResult> {
        self.execute(&command.command_line(), command)
    }

    /// Run a command and fail unless it exits with code 0.
    pub fn run_strict(&self, command: &Command) -> Result<StrictOutput> {
        let command_line = command.command_line();
        self.execute(&command_line, command)?
            .into_strict(command_line)
    }

    /// Run a command on the blocking thread pool.
    pub async fn run_async(&self, command: Command) -> Result<ExecutionResult> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run(&command))
            .await
            .map_err(|e| HiatusError::TaskJoin(e.to_string()))?
    }

    /// Async counterpart of [`ProcessRunner::run_strict`].
    pub async fn run_strict_async(&self, command: Command) -> Result<StrictOutput> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run_strict(&command))
            .await
            .map_err(|e| HiatusError::TaskJoin(e.to_string()))?
    }

    #[instrument(level = "debug", skip_all, fields(command = %command_line))]
    fn execute(&self, command_line: &str, command: &Command) -> Result<ExecutionResult> {
        let timeout = command.timeout.or(self.config.default_timeout);

        let mut process = std::process::Command::new(&self.config.shell);
        process
            .arg(&self.config.shell_flag)
            .arg(command_line)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&command.env);
        if let Some(ref dir) = command.working_dir {
            process.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = process.spawn().map_err(|source| HiatusError::Spawn {
            command: command_line.to_string(),
            source,
        })?;
        debug!(pid = child.id(), "spawned child");

        let mut pipes = match take_pipes(&mut child, self.config.read_buffer_size) {
            Ok(pipes) => pipes,
            Err(source) => {
                reap(&mut child);
                return Err(HiatusError::Spawn {
                    command: command_line.to_string(),
                    source,
                });
            }
        };

        if let Some(ref input) = command.stdin {
            feed_stdin(&mut child, input);
        }

        // The deadline starts after stdin has been written.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let outcome = supervise(&mut child, &mut pipes, deadline, &mut stdout, &mut stderr);

        let final_status = reap(&mut child);
        pipes.drain(&mut stdout, &mut stderr);
        let duration = start.elapsed();

        let (status, timed_out) = match outcome {
            Outcome::Exited(status) => (Some(status), false),
            Outcome::TimedOut => {
                warn!(?timeout, "command timed out and was killed");
                (final_status, true)
            }
            Outcome::Lost => (final_status, false),
        };

        let result = if timed_out {
            ExecutionResult::timeout(stdout, stderr, duration)
        } else {
            ExecutionResult::new(stdout, stderr, duration)
        };
        let result = apply_status(result, status);
        debug!(
            exit_code = ?result.exit_code,
            signal = ?result.signal,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            ?duration,
            streams_closed = pipes.is_closed(),
            "command finished"
        );
        Ok(result)
    }
}

/// How the polling loop ended.
enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    /// The child's status could not be queried.
    Lost,
}

fn take_pipes(child: &mut Child, buffer_size: usize) -> io::Result<OutputPipes> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    match (stdout, stderr) {
        (Some(stdout), Some(stderr)) => OutputPipes::new(stdout, stderr, buffer_size),
        _ => Err(io::Error::other("child output pipes were not captured")),
    }
}

/// Write all input, then close the pipe so the child sees EOF.
fn feed_stdin(child: &mut Child, input: &[u8]) {
    let Some(mut stdin) = child.stdin.take() else {
        return;
    };
    match stdin.write_all(input) {
        Ok(()) => debug!(bytes = input.len(), "wrote stdin"),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input");
        }
        Err(e) => warn!(error = %e, "failed to write stdin"),
    }
}

/// Drain output until the child exits or `deadline` passes.
///
/// Every iteration drains both pipes, including the one that observes
/// the exit, so output written just before exiting is kept.
fn supervise(
    child: &mut Child,
    pipes: &mut OutputPipes,
    deadline: Option<Instant>,
    stdout: &mut Vec<u8>,
    stderr: &mut Vec<u8>,
) -> Outcome {
    loop {
        pipes.wait_readable(deadline.map(|d| d.saturating_duration_since(Instant::now())));

        let status = match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "failed to query child status");
                pipes.drain(stdout, stderr);
                return Outcome::Lost;
            }
        };

        pipes.drain(stdout, stderr);

        if let Some(status) = status {
            return Outcome::Exited(status);
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Outcome::TimedOut;
        }
    }
}

/// Kill the child (ignoring "already exited") and wait for it.
fn reap(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill after exit ignored");
    }
    match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "failed to reap child");
            None
        }
    }
}

fn apply_status(mut result: ExecutionResult, status: Option<ExitStatus>) -> ExecutionResult {
    let Some(status) = status else {
        return result;
    };
    if let Some(code) = status.code() {
        result = result.with_exit_code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            result = result.with_signal(signal);
        }
    }
    result
}

/// Run a command with the default runner.
pub fn run(command: &Command) -> Result<ExecutionResult> {
    ProcessRunner::default().run(command)
}

/// Run a command with the default runner, failing on a non-zero exit.
pub fn run_strict(command: &Command) -> Result<StrictOutput> {
    ProcessRunner::default().run_strict(command)
}

/// Run a raw command line with a timeout.
pub fn run_with_timeout(command_line: &str, timeout: Duration) -> Result<ExecutionResult> {
    run(&Command::new(command_line).timeout(timeout))
}
