//! Error types for hiatus.

use thiserror::Error;

/// Main error type for hiatus operations.
#[derive(Error, Debug)]
pub enum HiatusError {
    /// The child process could not be created.
    #[error("failed to spawn command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran (or was killed) and did not exit with code 0.
    #[error("command '{command}' failed: {}", describe_exit(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    /// Blocking execution task did not complete.
    #[error("execution task failed: {0}")]
    TaskJoin(String),
}

impl HiatusError {
    /// Exit code carried by a [`HiatusError::NonZeroExit`].
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "terminated without an exit code".to_string(),
    }
}

/// Convenience Result type for hiatus operations.
pub type Result<T> = std::result::Result<T, HiatusError>;
