//! Error types for jobscraper.
//!
//! Library crates use [`ScraperError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all jobscraper operations.
#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the rendering service.
    #[error("network error: {0}")]
    Network(String),

    /// A navigation did not settle before its deadline.
    #[error("navigation timeout after {timeout_ms}ms: {url}")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    /// A wait condition never became true on the rendered page.
    #[error("element not found on {url}: {condition}")]
    ElementNotFound { url: String, condition: String },

    /// The rendering service answered with a non-success status.
    #[error("render error (status {status}): {message}")]
    Render { status: u16, message: String },

    /// An operation was attempted on a rendering context after it was closed.
    #[error("rendering context already closed")]
    ContextClosed,

    /// HTML parsing or field extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty search term, malformed URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScraperError>;

impl ScraperError {
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

    /// Whether this error came from a deadline expiring rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout { .. } | Self::ElementNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ScraperError::config("missing endpoint");
        assert_eq!(err.to_string(), "config error: missing endpoint");

        let err = ScraperError::NavigationTimeout {
            url: "https://mx.computrabajo.com/trabajo-de-chef".into(),
            timeout_ms: 60_000,
        };
        assert_eq!(
            err.to_string(),
            "navigation timeout after 60000ms: https://mx.computrabajo.com/trabajo-de-chef"
        );
    }

    #[test]
    fn timeout_classification() {
        assert!(
            ScraperError::ElementNotFound {
                url: "u".into(),
                condition: "article[data-id]".into()
            }
            .is_timeout()
        );
        assert!(!ScraperError::ContextClosed.is_timeout());
        assert!(!ScraperError::Network("refused".into()).is_timeout());
    }
}
