use thiserror::Error;
/// Common result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type that unifies HTTP, serialization, store and wizard errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors produced by reqwest HTTP client.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The karma service answered with a non-success status.
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key-value store error: {0}")]
    Store(String),

    /// A raw form value that does not name one of the fixed options.
    #[error("`{value}` is not a valid {kind}")]
    UnknownOption { kind: &'static str, value: String },

    #[error("registration can only be submitted from the verification step")]
    NotAtFinalStep,

    #[error("a registration submission is already in flight")]
    SubmissionInProgress,

    #[error("registration was already submitted")]
    AlreadySubmitted,

    /// Fallback catch-all with a human readable message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}
