//! Execution result types.

use std::borrow::Cow;
use std::time::Duration;

use crate::error::HiatusError;
use crate::Result;

/// Result of running a command to completion or until it was killed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Terminating signal number (Unix only).
    pub signal: Option<i32>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Wall-clock time from spawn to reaping the child.
    pub duration: Duration,
    /// Whether the timeout expired before the child exited.
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Create a result for a child that exited on its own.
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            duration,
            ..Self::default()
        }
    }

    /// Create a result for a child killed after its timeout expired.
    pub fn timeout(stdout: Vec<u8>, stderr: Vec<u8>, duration: Duration) -> Self {
        Self {
            timed_out: true,
            ..Self::new(stdout, stderr, duration)
        }
    }

    /// Set the exit code.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Set the terminating signal.
    pub fn with_signal(mut self, signal: i32) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Check if command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Check if command failed (non-zero or missing exit code).
    pub fn failed(&self) -> bool {
        !self.success()
    }

    /// Stdout decoded as UTF-8, lossily.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Stderr decoded as UTF-8, lossily.
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Turn a non-zero exit into [`HiatusError::NonZeroExit`].
    ///
    /// `command` is only used for the error message.
    pub fn into_strict(self, command: impl Into<String>) -> Result<StrictOutput> {
        if self.success() {
            Ok(StrictOutput {
                stdout: self.stdout,
                stderr: self.stderr,
            })
        } else {
            Err(HiatusError::NonZeroExit {
                command: command.into(),
                code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Output of a command known to have exited with code 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrictOutput {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl StrictOutput {
    /// Stdout decoded as UTF-8, lossily.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Stderr decoded as UTF-8, lossily.
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_new() {
        let result = ExecutionResult::new(
            b"hello\n".to_vec(),
            b"warn\n".to_vec(),
            Duration::from_millis(100),
        );

        assert_eq!(result.stdout, b"hello\n");
        assert_eq!(result.stderr, b"warn\n");
        assert_eq!(result.duration, Duration::from_millis(100));
        assert!(!result.timed_out);
        assert!(result.exit_code.is_none());
        assert!(result.signal.is_none());
    }

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult::default().with_exit_code(0);
        assert!(result.success());
        assert!(!result.failed());
    }

    #[test]
    fn test_execution_result_failed() {
        let result = ExecutionResult::default().with_exit_code(1);
        assert!(!result.success());
        assert!(result.failed());

        let killed = ExecutionResult::default().with_signal(9);
        assert!(killed.failed());
    }

    #[test]
    fn test_execution_result_timeout() {
        let result = ExecutionResult::timeout(vec![], vec![], Duration::from_secs(30));
        assert!(result.timed_out);
        assert!(result.failed());
    }

    #[test]
    fn test_text_is_lossy() {
        let result = ExecutionResult::new(vec![b'o', b'k', 0xff], b"e".to_vec(), Duration::ZERO);
        assert_eq!(result.stdout_text(), "ok\u{fffd}");
        assert_eq!(result.stderr_text(), "e");
    }

    #[test]
    fn test_into_strict_success() {
        let output = ExecutionResult::new(b"out".to_vec(), b"err".to_vec(), Duration::ZERO)
            .with_exit_code(0)
            .into_strict("true")
            .unwrap();
        assert_eq!(output.stdout_text(), "out");
        assert_eq!(output.stderr_text(), "err");
    }

    #[test]
    fn test_into_strict_non_zero() {
        let err = ExecutionResult::new(b"out".to_vec(), b"boom".to_vec(), Duration::ZERO)
            .with_exit_code(2)
            .into_strict("exit 2")
            .unwrap_err();

        match err {
            HiatusError::NonZeroExit {
                command,
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(command, "exit 2");
                assert_eq!(code, Some(2));
                assert_eq!(stdout, b"out");
                assert_eq!(stderr, b"boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_into_strict_killed() {
        let err = ExecutionResult::timeout(vec![], vec![], Duration::from_secs(1))
            .with_signal(9)
            .into_strict("sleep 10")
            .unwrap_err();
        assert!(matches!(err, HiatusError::NonZeroExit { code: None, .. }));
    }
}
