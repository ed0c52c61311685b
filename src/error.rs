//! Error types for the FDS client
//!
//! Every failure surfaced to a caller is an [`FdsError`]. Retry loops use
//! [`FdsError::is_retryable`] to decide whether another attempt can help.

use reqwest::StatusCode;
use thiserror::Error;

/// Primary error type for all FDS client operations
#[derive(Debug, Error)]
pub enum FdsError {
    // ========== Validation Errors ==========
    /// A caller supplied argument was rejected before any network call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Metadata key is neither predefined nor carries the user prefix
    #[error("Invalid metadata: {key}")]
    InvalidMetadata { key: String },

    /// URI could not be parsed into bucket and object name
    #[error("Invalid URI, can't parse bucket name and object name from it: {uri}")]
    InvalidUri { uri: String },

    // ========== Protocol Errors ==========
    /// The store answered 200 but the body was missing required fields
    #[error("Malformed response to {operation} for [{bucket}/{object}]: {reason}")]
    Protocol {
        operation: &'static str,
        bucket: String,
        object: String,
        reason: String,
    },

    // ========== Transport Errors ==========
    /// The HTTP client could not be built from the configuration
    #[error("Failed to create HTTP client")]
    HttpClient(#[source] reqwest::Error),

    /// Network failure while sending a request or reading its body
    #[error("Request to {uri} failed")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a status the call does not accept
    #[error("Unable to {operation} [{bucket}/{object}] at {uri}: HTTP {status}")]
    UnexpectedStatus {
        operation: &'static str,
        bucket: String,
        object: String,
        uri: String,
        status: StatusCode,
    },

    // ========== Credential Errors ==========
    /// Request signature could not be computed
    #[error("Fail to get signature for request: {0}")]
    Signing(String),

    /// OAuth token exchange did not yield a storage access token
    #[error("Failed to get the storage access token from {uri}: {reason}")]
    CredentialExchange { uri: String, reason: String },

    // ========== Resource Errors ==========
    /// Local I/O failure (source stream, destination file)
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding of an outgoing payload failed
    #[error("Failed to encode {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A part upload task ended without producing a result
    #[error("Part {part_number} upload task failed: {reason}")]
    TaskFailed { part_number: u32, reason: String },
}

impl FdsError {
    /// Returns true if another attempt of the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FdsError::Transport { .. }
                | FdsError::UnexpectedStatus { .. }
                | FdsError::Protocol { .. }
        )
    }

    /// Returns true for failures caused by the configured credential
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            FdsError::Signing(_) | FdsError::CredentialExchange { .. }
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FdsError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn transport(uri: impl Into<String>, source: reqwest::Error) -> Self {
        FdsError::Transport {
            uri: uri.into(),
            source,
        }
    }
}

/// Result type alias for FDS client operations
pub type FdsResult<T> = std::result::Result<T, FdsError>;
