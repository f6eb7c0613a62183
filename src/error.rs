use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the md-annotate library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid glob pattern.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// System time error.
    #[error("System time error: {message}")]
    SystemTime {
        /// Error message
        message: String,
    },

    /// A git history query failed or returned nothing.
    #[error("git history query for '{path}' failed: {message}")]
    Git {
        /// File the history was requested for
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A commit timestamp could not be parsed.
    #[error("Invalid commit timestamp '{value}': {message}")]
    Timestamp {
        /// Raw value returned by the history query
        value: String,
        /// Parser error message
        message: String,
    },

    /// Entity recognition or summarization failed.
    #[error("Language model error: {message}")]
    Nlp {
        /// Error message
        message: String,
    },

    /// Document lies outside the root directory.
    #[error("'{path}' is not inside root directory '{root}'")]
    OutsideRoot {
        /// Document path
        path: PathBuf,
        /// Root directory
        root: PathBuf,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates an IO error, mapping invalid data to [`Error::InvalidUtf8`].
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Self::invalid_utf8(path)
        } else {
            Self::io(path, source)
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // tera nests the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a git history error.
    #[must_use]
    pub fn git(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Git {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a timestamp parsing error.
    #[must_use]
    pub fn timestamp(value: impl Into<String>, message: impl ToString) -> Self {
        Self::Timestamp {
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Creates a language model error.
    #[must_use]
    pub fn nlp(message: impl Into<String>) -> Self {
        Self::Nlp {
            message: message.into(),
        }
    }

    /// Creates an outside-root error.
    #[must_use]
    pub fn outside_root(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::OutsideRoot {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidPattern { .. })
    }

    /// Returns true if this error came from the version history.
    #[must_use]
    pub const fn is_history(&self) -> bool {
        matches!(self, Self::Git { .. } | Self::Timestamp { .. })
    }

    /// Returns true if this error came from the language model.
    #[must_use]
    pub const fn is_nlp(&self) -> bool {
        matches!(self, Self::Nlp { .. })
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Self::SystemTime {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::nlp(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.md", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.md"));
    }

    #[test]
    fn test_read_maps_invalid_data() {
        let io_err = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8");
        let err = Error::read("notes/bad.md", io_err);
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_git_error_is_history() {
        let err = Error::git("notes/a.md", "exit status 128");
        assert!(err.is_history());
        assert!(!err.is_nlp());
        assert!(err.to_string().contains("notes/a.md"));
    }

    #[test]
    fn test_timestamp_error() {
        let err = Error::timestamp("yesterday", "input contains invalid characters");
        assert!(err.is_history());
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_outside_root() {
        let err = Error::outside_root("/elsewhere/a.md", "/notes");
        assert!(err.to_string().contains("/elsewhere/a.md"));
        assert!(err.to_string().contains("/notes"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::nlp("model unavailable");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
