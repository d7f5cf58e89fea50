use http::StatusCode;
use thiserror::Error;

/// Enumerates the failure modes of a vendor API call.
///
/// A semantic "not found" is never an error; lookup operations report it as
/// `Ok(None)` so callers cannot confuse a missing entity with a failed call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection, DNS resolution or timeout failure.
    #[error("transport error: `{0}`")]
    Transport(String),

    /// Non-2xx response whose body carried a vendor error payload.
    #[error("vendor api error (status {status}): {}", messages.join(", "))]
    Api {
        status: StatusCode,
        messages: Vec<String>,
    },

    /// Non-2xx response whose body could not be parsed as JSON.
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),

    /// 2xx response whose body did not match the expected envelope.
    #[error("unable to deserialize response body: `{0}`")]
    InvalidResponse(String),

    /// A request payload could not be serialized.
    #[error("could not serialize request payload: `{0}`")]
    Serialization(String),

    /// The endpoint URL could not be built from the configured base.
    #[error("invalid endpoint url: `{0}`")]
    InvalidUrl(String),
}

impl ApiError {
    /// Transport failures are the only errors worth retrying: creates are
    /// not idempotent and a decoded vendor error will not go away on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}
