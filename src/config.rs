//! Configuration management for hiatus.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file (JSON)
//! 3. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::{
    ProcessRunner, RunnerConfig, DEFAULT_READ_BUFFER_SIZE, DEFAULT_SHELL, DEFAULT_SHELL_FLAG,
};

/// Library configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell used to interpret command lines.
    pub shell: ShellSection,
    /// Execution settings.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Shell configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Shell program.
    pub program: String,
    /// Flag that makes the shell run its next argument.
    pub flag: String,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            program: DEFAULT_SHELL.to_string(),
            flag: DEFAULT_SHELL_FLAG.to_string(),
        }
    }
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Timeout in seconds for commands that do not set their own.
    pub timeout_secs: Option<f64>,
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup("HIATUS_SHELL") {
            if !shell.is_empty() {
                self.shell.program = shell;
            }
        }

        if let Some(timeout) = lookup("HIATUS_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.execution.timeout_secs = Some(timeout);
            }
        }

        if let Some(level) = lookup("HIATUS_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Convert to the settings used by [`ProcessRunner`].
    pub fn runner_config(&self) -> Result<RunnerConfig, ConfigError> {
        if self.execution.read_buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }

        let mut config = RunnerConfig::default()
            .with_shell(&self.shell.program, &self.shell.flag)
            .with_read_buffer_size(self.execution.read_buffer_size);

        if let Some(secs) = self.execution.timeout_secs {
            if secs.is_nan() || secs <= 0.0 {
                return Err(ConfigError::InvalidTimeout(secs));
            }
            let timeout =
                Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidTimeout(secs))?;
            config = config.with_default_timeout(timeout);
        }

        Ok(config)
    }

    /// Build a runner from this configuration.
    pub fn runner(&self) -> Result<ProcessRunner, ConfigError> {
        self.runner_config().map(ProcessRunner::new)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    /// Default timeout is not a positive, finite number of seconds.
    #[error("invalid timeout: {0} seconds")]
    InvalidTimeout(f64),
    /// Read buffer size is zero.
    #[error("read buffer size must be positive")]
    InvalidBufferSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.shell.program, DEFAULT_SHELL);
        assert_eq!(config.shell.flag, DEFAULT_SHELL_FLAG);
        assert!(config.execution.timeout_secs.is_none());
        assert_eq!(config.execution.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "shell": {
                "program": "/bin/bash",
                "flag": "-c"
            },
            "execution": {
                "timeout_secs": 2.5,
                "read_buffer_size": 1024
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.shell.program, "/bin/bash");
        assert_eq!(config.execution.timeout_secs, Some(2.5));
        assert_eq!(config.execution.read_buffer_size, 1024);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "execution": { "timeout_secs": 10 } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.shell.program, DEFAULT_SHELL); // Default
        assert_eq!(config.execution.timeout_secs, Some(10.0));
        assert_eq!(config.execution.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/hiatus.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("HIATUS_SHELL", "/bin/zsh"),
            ("HIATUS_TIMEOUT_SECS", "30"),
            ("HIATUS_LOG_LEVEL", "trace"),
            ("RUST_LOG", "warn"),
        ]));

        assert_eq!(config.shell.program, "/bin/zsh");
        assert_eq!(config.execution.timeout_secs, Some(30.0));
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn test_apply_env_ignores_invalid() {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("HIATUS_SHELL", ""),
            ("HIATUS_TIMEOUT_SECS", "soon"),
            ("RUST_LOG", "hiatus=debug"),
        ]));

        assert_eq!(config.shell.program, DEFAULT_SHELL);
        assert!(config.execution.timeout_secs.is_none());
        assert_eq!(config.log_filter(), "hiatus=debug");
    }

    #[test]
    fn test_runner_config() {
        let mut config = Config::default();
        config.execution.timeout_secs = Some(1.5);
        config.execution.read_buffer_size = 256;

        let runner = config.runner().unwrap();
        assert_eq!(
            runner.config().default_timeout,
            Some(Duration::from_millis(1500))
        );
        assert_eq!(runner.config().read_buffer_size, 256);
        assert_eq!(runner.config().shell, DEFAULT_SHELL);
    }

    #[test]
    fn test_runner_config_rejects_bad_values() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.execution.timeout_secs = Some(secs);
            assert!(matches!(
                config.runner_config(),
                Err(ConfigError::InvalidTimeout(_))
            ));
        }

        let mut config = Config::default();
        config.execution.read_buffer_size = 0;
        assert!(matches!(
            config.runner_config(),
            Err(ConfigError::InvalidBufferSize)
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"program\""));
        assert!(json.contains("\"timeout_secs\""));
    }
}
