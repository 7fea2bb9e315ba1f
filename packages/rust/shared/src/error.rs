//! Error types for the token list pipeline.
//!
//! Library crates use [`TokenListError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all token list operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenListError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// JSON-RPC error returned by the node (reverts included).
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// ABI, hex, or payload decoding error.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Database or cache layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad token field, malformed list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The assembled list violates the list schema. Carries every violation.
    #[error("schema validation failed with {} error(s): {}", errors.len(), errors.join("; "))]
    Schema { errors: Vec<String> },

    /// Upload, pinning, or pointer update failed.
    #[error("publish error: {0}")]
    Publish(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TokenListError>;

impl TokenListError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
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

    /// Whether retrying the failed call could succeed.
    ///
    /// Node-side errors (`Rpc`) are deterministic reverts or bad requests and
    /// are not retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Publish(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TokenListError::config("missing provider_url");
        assert_eq!(err.to_string(), "config error: missing provider_url");

        let err = TokenListError::Rpc {
            code: 3,
            message: "execution reverted".into(),
        };
        assert_eq!(err.to_string(), "rpc error 3: execution reverted");
    }

    #[test]
    fn schema_error_lists_every_violation() {
        let err = TokenListError::Schema {
            errors: vec!["tokens[0].name too long".into(), "name is empty".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 error(s)"));
        assert!(msg.contains("tokens[0].name too long"));
        assert!(msg.contains("name is empty"));
    }

    #[test]
    fn transient_classification() {
        assert!(TokenListError::Network("timeout".into()).is_transient());
        assert!(TokenListError::Publish("502".into()).is_transient());
        assert!(!TokenListError::validation("bad").is_transient());
        assert!(
            !TokenListError::Rpc {
                code: 3,
                message: "revert".into()
            }
            .is_transient()
        );
    }
}
