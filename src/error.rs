//! Error taxonomy for the session client.

use serde_json::Value;
use thiserror::Error;

/// Failure reported by a [`Transport`](crate::http::Transport) when no
/// response was received at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport's own deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established (DNS, refused, unreachable).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Errors surfaced to callers of the pipeline and the session coordinator.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The host is tearing down; the request was never sent.
    #[error("request aborted: client is unloading")]
    Aborted,

    /// No response was received.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// Ordinary non-2xx response.
    #[error("API error {status}: {payload}")]
    Api { status: u16, payload: Value },

    /// Every credential is exhausted; only a fresh login helps.
    #[error("re-authentication required ({status}): {payload}")]
    ReauthRequired { status: u16, payload: Value },

    /// Expired credential that could not be healed by a refresh.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// The refresh call itself failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// A successful response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request body could not be serialized; nothing was sent.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// The request was dropped inside the client before it settled
    /// (a refresh or replay task was cancelled or panicked).
    #[error("request interrupted: {0}")]
    Interrupted(String),

    /// Bad client configuration (e.g. an unusable base URL).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the UI should drop local identity and prompt for login.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::AuthExpired(_) | ClientError::ReauthRequired { .. })
    }

    /// HTTP status attached to the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::ReauthRequired { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type ClientResult<T> = Result<T, ClientError>;
