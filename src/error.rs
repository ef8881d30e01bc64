//! Error types for autodse
//!
//! One crate-level enum; every fallible path returns [`Result`].
//! Sweep failures are fatal by design: nothing is retried, and a failed
//! unit aborts the whole run before any sink write happens.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// autodse error types
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter was declared with no candidate values.
    ///
    /// Empty candidate sequences are rejected at construction time rather
    /// than silently dropping the parameter or collapsing the product to
    /// zero combinations.
    #[error("parameter '{0}' has no candidate values")]
    EmptyValueSet(String),

    /// Sequences inside one zip group have different lengths.
    #[error("zip group length mismatch for parameter '{param}': expected {expected} values, got {actual}")]
    MismatchedZipLength {
        /// Parameter whose value sequence broke the group length
        param: String,
        /// Length established by the first parameter in the group
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// The user function returned an error or panicked inside a worker.
    ///
    /// Fatal to the entire sweep; the formatted trace is preserved for
    /// the failure report.
    #[error("sweep unit failed:\n{trace}")]
    UserFn {
        /// Formatted error chain or panic message from the worker
        trace: String,
    },

    /// A server-supplied exploration description failed validation.
    #[error("invalid exploration for parameter '{param}': {reason}")]
    InvalidExploration {
        /// Parameter the description was attached to
        param: String,
        /// What the validator rejected
        reason: String,
    },

    /// Malformed or unexpected response from the tracking service.
    #[error("tracking service error: {0}")]
    Remote(String),

    /// HTTP transport failure talking to the tracking service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                Self::Http(format!("status {code}: {body}"))
            }
            ureq::Error::Transport(t) => Self::Http(t.to_string()),
        }
    }
}
