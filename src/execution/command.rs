//! Command building and representation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// A single argument appended to a base command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Optional key, rendered as `KEY=VALUE`.
    pub key: Option<String>,
    /// Argument value.
    pub value: String,
}

impl Argument {
    /// Create a positional argument.
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }

    /// Create a keyed argument.
    pub fn named(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
        }
    }

    fn render_into(&self, out: &mut String) {
        out.push(' ');
        if let Some(ref key) = self.key {
            out.push_str(&quote(key));
            out.push('=');
        }
        out.push_str(&quote(&self.value));
    }
}

/// Ordered set of arguments, rendered in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    items: Vec<Argument>,
}

impl Arguments {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.items.push(Argument::positional(value));
        self
    }

    /// Append a `KEY=VALUE` argument.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push(Argument::named(key, value));
        self
    }

    /// Append an already constructed argument.
    pub fn push(&mut self, argument: Argument) {
        self.items.push(argument);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.items.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Arguments {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Argument::positional).collect(),
        }
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(items: Vec<Argument>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Argument;
    type IntoIter = std::slice::Iter<'a, Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Quote a single token so a POSIX shell reads it back as one word.
///
/// `shlex` rejects tokens containing NUL; those are wrapped in single
/// quotes directly.
pub fn quote(token: &str) -> Cow<'_, str> {
    shlex::try_quote(token)
        .unwrap_or_else(|_| Cow::Owned(format!("'{}'", token.replace('\'', "'\\''"))))
}

/// Append the escaped arguments to `command`.
///
/// The base command is used verbatim; any user-controlled part of it must
/// be quoted by the caller.
pub fn build(command: &str, arguments: &Arguments) -> String {
    let mut built = String::from(command);
    for argument in arguments {
        argument.render_into(&mut built);
    }
    built
}

/// A command to be executed through the shell.
#[derive(Debug, Clone)]
pub struct Command {
    /// Base command line, used verbatim.
    pub command: String,
    /// Arguments appended after escaping.
    pub arguments: Arguments,
    /// Maximum execution time.
    pub timeout: Option<Duration>,
    /// Bytes written to the child's stdin before output is collected.
    pub stdin: Option<Vec<u8>>,
    /// Working directory override (if any).
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set.
    pub env: HashMap<String, String>,
}

impl Command {
    /// Create a new command with the given base command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: Arguments::new(),
            timeout: None,
            stdin: None,
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.arguments.push(Argument::positional(value));
        self
    }

    /// Append a `KEY=VALUE` argument.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push(Argument::named(key, value));
        self
    }

    /// Replace the argument set.
    pub fn args(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The shell command line with escaped arguments appended.
    pub fn command_line(&self) -> String {
        build(&self.command, &self.arguments)
    }
}
