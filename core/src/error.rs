//! Error types for the API client.
//!
//! # Design
//! Transport failures and HTTP-level failures are kept apart: a `Transport`
//! error means no response was received, while `Request` carries the status,
//! the safe statuses that were considered, and whatever structured detail the
//! server put in the body. Callers branch on `status()` rather than on message
//! text.

use std::fmt;
use std::path::PathBuf;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by the envelope, session and endpoint layers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The transport could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a status outside the safe set.
    #[error(transparent)]
    Request(#[from] RequestFailure),

    /// The authentication endpoint did not yield a usable token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A document path could not be resolved for the requested mutation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A downloaded file does not match the digest the server announced.
    #[error("digest mismatch for {}: expected {expected}, got {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status of a request failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request(failure) => Some(failure.status),
            _ => None,
        }
    }

    /// Structured server detail attached to a request failure.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            ApiError::Request(failure) => failure.detail.as_ref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// A response whose status is neither below 400 nor in the caller's safe set.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    pub status: u16,
    pub reason: Option<String>,
    pub url: String,
    /// Safe statuses that were supplied for the call, ascending.
    pub safe_statuses: Vec<u16>,
    pub detail: Option<ErrorDetail>,
}

impl RequestFailure {
    fn kind(&self) -> &'static str {
        match self.status {
            400..=499 => "Client Error",
            500..=599 => "Server Error",
            _ => "Unexpected Status",
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} for url: {}",
            self.status,
            self.kind(),
            self.reason.as_deref().unwrap_or(""),
            self.url
        )?;
        if !self.safe_statuses.is_empty() {
            write!(f, " (safe statuses: {:?})", self.safe_statuses)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nAPI error data:\n{detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestFailure {}

/// Error fields the API places in failing response bodies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetail {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub errors: Option<serde_json::Value>,
    pub message: Option<String>,
}

impl ErrorDetail {
    /// Extracts the known error fields from a JSON body.
    ///
    /// Returns `None` unless the body is a JSON object carrying at least one of
    /// them.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let object = value.as_object()?;
        let text = |key: &str| match object.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        let detail = ErrorDetail {
            title: text("title"),
            detail: text("detail"),
            errors: object.get("errors").filter(|v| !v.is_null()).cloned(),
            message: text("message"),
        };
        (detail != ErrorDetail::default()).then_some(detail)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors.as_ref().map(|e| e.to_string());
        write!(
            f,
            "{} {}\n{}\n{}",
            self.title.as_deref().unwrap_or(""),
            self.detail.as_deref().unwrap_or(""),
            errors.as_deref().unwrap_or(""),
            self.message.as_deref().unwrap_or("")
        )
    }
}
