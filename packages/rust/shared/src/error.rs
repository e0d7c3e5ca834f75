//! Error types for the almanac pipeline.
//!
//! Library crates use [`AlmanacError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum AlmanacError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during navigation.
    #[error("network error: {0}")]
    Network(String),

    /// The expected table never rendered (or never went stale) within the wait window.
    #[error("render timeout after {waited_ms}ms waiting on {url}")]
    RenderTimeout { url: String, waited_ms: u64 },

    /// HTML parsing or cell extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Malformed or unreadable CSV file.
    #[error("csv error in {path:?}: {message}")]
    Csv { path: PathBuf, message: String },

    /// Relational store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, slug collision, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A cleaned file does not carry the columns its table needs.
    #[error("schema mismatch in {file}: {message}")]
    SchemaMismatch { file: String, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AlmanacError>;

impl AlmanacError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `csv::Error` with the file it came from.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub fn schema_mismatch(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Whether this is a navigation wait that ran out of time.
    pub fn is_render_timeout(&self) -> bool {
        matches!(self, Self::RenderTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AlmanacError::config("layout is empty");
        assert_eq!(err.to_string(), "config error: layout is empty");

        let err = AlmanacError::RenderTimeout {
            url: "https://example.com/hr".into(),
            waited_ms: 250,
        };
        assert!(err.to_string().contains("250ms"));
        assert!(err.is_render_timeout());

        let err = AlmanacError::schema_mismatch("hits_cleaned.csv", "missing column Team");
        assert!(err.to_string().contains("hits_cleaned.csv"));
        assert!(!err.is_render_timeout());
    }
}
