//! Session error types.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport-level failure reaching an endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The refresh attempt failed or was never possible. Terminal for the
    /// current session: the token store has been cleared.
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// A request was rejected again after being replayed with a freshly
    /// refreshed token.
    #[error("Unauthorized: {path} was rejected after a token refresh")]
    Unauthorized { path: String },

    /// The session is valid but the user's role is not allowed.
    #[error("Access denied for role '{role}'")]
    AccessDenied { role: String },

    /// Server returned a non-success response to a typed call.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Server returned a success status with an unusable body.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Check if this error means the user has to sign in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SessionError::AuthExpired(_)
                | SessionError::Unauthorized { .. }
                | SessionError::Api { status: 401, .. }
        )
    }

    /// Check if this is a transport failure.
    pub fn is_network(&self) -> bool {
        matches!(self, SessionError::Network(_))
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        SessionError::Network(e.to_string())
    }
}

/// Reasons a bearer token could not be decoded.
///
/// Never crosses the codec boundary: callers see "no claims" instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("claims segment is not valid base64: {0}")]
    Base64(String),

    #[error("claims segment is not valid JSON: {0}")]
    Json(String),

    #[error("claims segment is not a JSON object")]
    NotAnObject,
}

/// Error response body from the server.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}
