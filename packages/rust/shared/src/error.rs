//! Error types for enrichkit.
//!
//! Library crates use [`EnrichKitError`] via `thiserror`.
//! The server binary maps it onto HTTP responses and wraps it with
//! `color-eyre` at the top level.

use std::path::PathBuf;

/// Top-level error type for all enrichkit operations.
#[derive(Debug, thiserror::Error)]
pub enum EnrichKitError {
    /// A required configuration value is absent or malformed.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed or incomplete request body.
    #[error("{message}")]
    Validation { message: String },

    /// The scraping proxy failed or returned a non-2xx response.
    #[error("fetch failed: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    /// The storage worker failed or returned a non-2xx response.
    #[error("forward failed: {message}")]
    Forward {
        status: Option<u16>,
        message: String,
    },

    /// The primary audit record could not be written.
    #[error("audit write failed: {0}")]
    AuditWrite(String),

    /// The secondary completion marker could not be written.
    #[error("completion write failed: {0}")]
    CompletionWrite(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error outside of the per-item upstream calls.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EnrichKitError>;

impl EnrichKitError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an upstream fetch error.
    pub fn fetch(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            message: msg.into(),
        }
    }

    /// Create an upstream forward error.
    pub fn forward(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Forward {
            status,
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

    /// Upstream HTTP status carried by fetch/forward errors, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } | Self::Forward { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether this error is scoped to a single batch item.
    pub fn is_item_scoped(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Forward { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EnrichKitError::config("missing SCRAPINGBEE_API_KEY");
        assert_eq!(err.to_string(), "config error: missing SCRAPINGBEE_API_KEY");

        let err = EnrichKitError::validation("companies array is required");
        assert_eq!(err.to_string(), "companies array is required");

        let err = EnrichKitError::fetch(Some(500), "proxy returned HTTP 500");
        assert_eq!(err.to_string(), "fetch failed: proxy returned HTTP 500");
    }

    #[test]
    fn upstream_status_only_on_item_errors() {
        assert_eq!(
            EnrichKitError::forward(Some(502), "bad gateway").upstream_status(),
            Some(502)
        );
        assert_eq!(EnrichKitError::AuditWrite("x".into()).upstream_status(), None);
        assert!(EnrichKitError::fetch(None, "timeout").is_item_scoped());
        assert!(!EnrichKitError::config("x").is_item_scoped());
    }
}
