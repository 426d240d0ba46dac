//! Error taxonomy for the relay.
//!
//! # Design Decisions
//! - Filter errors carry a boxed source plus a human-readable description
//! - Transport errors are classified so error handlers can pick a status
//! - Relay (body copy) errors never leave the forwarder; they are logged only

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used at trait seams (filters, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single outbound round trip.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a connection to the upstream.
    #[error("connect to {url} failed: {source}")]
    Connect { url: String, source: BoxError },

    /// The upstream did not produce response headers in time.
    #[error("round trip to {url} timed out after {elapsed_ms}ms")]
    Timeout { url: String, elapsed_ms: u64 },

    /// Any other failure surfaced by the transport (protocol violation, reset, ...).
    #[error("upstream {url} failed: {source}")]
    Upstream { url: String, source: BoxError },

    /// The outbound request could not be built.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),

    /// The transport itself could not be constructed.
    #[error("transport setup failed: {0}")]
    Setup(BoxError),
}

impl TransportError {
    /// Returns `true` for timeouts surfaced by the transport.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Returns `true` when no connection could be made.
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect { .. })
    }
}

/// Error signalled by a filter during chain execution.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FilterError(pub BoxError);

impl FilterError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self(err.into())
    }
}

/// Semantic validation failure for a single config field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_classification() {
        let timeout = TransportError::Timeout {
            url: "http://a/".into(),
            elapsed_ms: 10,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_connect());

        let connect = TransportError::Connect {
            url: "http://a/".into(),
            source: "refused".into(),
        };
        assert!(connect.is_connect());
        assert_eq!(connect.to_string(), "connect to http://a/ failed: refused");
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = ConfigError::Validation(vec![
            ValidationError {
                field: "listener.bind_address",
                message: "not a socket address".into(),
            },
            ValidationError {
                field: "observability.log_level",
                message: "unknown level".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: listener.bind_address: not a socket address, observability.log_level: unknown level"
        );
    }
}
