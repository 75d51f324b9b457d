//! Error types for prodcat.
//!
//! Library crates use [`ProdcatError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all prodcat operations.
#[derive(Debug, thiserror::Error)]
pub enum ProdcatError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the catalog API.
    #[error("network error: {0}")]
    Network(String),

    /// Input parsing error (JSON payloads, rule tables).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad rule table, malformed identifier, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A product that had to exist for the operation was not found.
    #[error("product not found: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProdcatError>;

impl ProdcatError {
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

    /// Wrap any storage-layer error by its message.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProdcatError::config("DATABASE_URL is not set");
        assert_eq!(err.to_string(), "config error: DATABASE_URL is not set");

        let err = ProdcatError::NotFound("ZZZZZ".into());
        assert_eq!(err.to_string(), "product not found: ZZZZZ");

        let err = ProdcatError::storage("no such table: products");
        assert!(err.to_string().contains("no such table"));
    }
}
