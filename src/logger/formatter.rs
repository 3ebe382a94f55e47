//! Secret-redacting LOG formatter

use crate::protocol::Message;
use crate::types::LogLevel;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Replacement for every secret occurrence
pub const MASK: &str = "****";

/// Replace every occurrence of each secret in `message` with [`MASK`].
///
/// Longer secrets are replaced first so that a secret containing another one
/// is never left partially visible. Empty strings are ignored.
pub fn redact(message: &str, secrets: &[String]) -> String {
    let mut ordered: Vec<&str> = secrets
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut rendered = message.to_string();
    for secret in ordered {
        if rendered.contains(secret) {
            rendered = rendered.replace(secret, MASK);
        }
    }
    rendered
}

/// Active secret values, shared by every formatter and writer cloned from it.
///
/// Secrets are read when a message is formatted, so values registered after a
/// formatter was built still apply to everything it formats afterwards.
#[derive(Clone, Default)]
pub struct Secrets {
    values: Arc<RwLock<Vec<String>>>,
}

impl Secrets {
    /// Create a context holding `values`
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let secrets = Self::default();
        secrets.update(values);
        secrets
    }

    /// Replace the active secrets
    pub fn update<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        *self.values.write().unwrap_or_else(PoisonError::into_inner) = values;
    }

    /// Copy of the active secrets
    pub fn snapshot(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of active secrets
    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no secret is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mask the active secrets in `message`
    pub fn redact(&self, message: &str) -> String {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        redact(message, &values)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("count", &self.len())
            .finish()
    }
}

/// Renders LOG messages with every active secret masked
#[derive(Debug, Clone, Default)]
pub struct RedactingFormatter {
    secrets: Secrets,
}

impl RedactingFormatter {
    /// Create a formatter over a redaction context
    pub fn new(secrets: Secrets) -> Self {
        Self { secrets }
    }

    /// The redaction context
    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// Replace the active secrets
    pub fn update_secrets<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets.update(values);
    }

    /// Render `message` at `level` as a LOG message
    pub fn format(&self, level: LogLevel, message: impl AsRef<str>) -> Message {
        Message::log(level, self.secrets.redact(message.as_ref()))
    }

    /// Render a line whose first word may name its own level.
    ///
    /// `"ERROR disk full"` becomes an ERROR message `"disk full"`. When the first
    /// word is not a level name the line is kept as is at `default_level`.
    pub fn log_by_prefix(&self, message: &str, default_level: LogLevel) -> Message {
        let mut words = message.split_whitespace();
        let prefixed = words
            .next()
            .and_then(|first| first.parse::<LogLevel>().ok());

        match prefixed {
            Some(level) => {
                let rest: Vec<&str> = words.collect();
                self.format(level, rest.join(" "))
            }
            None => self.format(default_level, message),
        }
    }

    /// Render `message` as a FATAL LOG message
    pub fn fatal(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Fatal, message)
    }

    /// Render `message` as a ERROR LOG message
    pub fn error(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Error, message)
    }

    /// Render `message` as a WARN LOG message
    pub fn warn(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Warn, message)
    }

    /// Render `message` as a INFO LOG message
    pub fn info(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Info, message)
    }

    /// Render `message` as a DEBUG LOG message
    pub fn debug(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Debug, message)
    }

    /// Render `message` as a TRACE LOG message
    pub fn trace(&self, message: impl AsRef<str>) -> Message {
        self.format(LogLevel::Trace, message)
    }
}
