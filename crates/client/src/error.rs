//! Transport error taxonomy.

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

pub const NETWORK_MESSAGE: &str = "Network error, please check your connection";
pub const SESSION_EXPIRED_MESSAGE: &str = "Login expired, please login again";

/// Every way a request can end other than success.
///
/// Only the 401 → refresh → replay cascade is recovered inside the client;
/// each of these reaches the caller untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response was received (connect failure, reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success HTTP status.
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },

    /// A 2xx envelope whose business status marks failure.
    #[error("business error ({code}): {message}")]
    Business { code: i64, message: String },

    /// The session could not be renewed; the caller must log in again.
    #[error("session expired: {0}")]
    AuthExpired(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The payload did not match the expected type.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn auth_expired(reason: impl Into<String>) -> Self {
        Self::AuthExpired(reason.into())
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// The message to show the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => NETWORK_MESSAGE.to_string(),
            Self::Http { status, message } => match status {
                403 => "Access denied, insufficient permissions".to_string(),
                404 => "Resource not found".to_string(),
                500 => "Server error, please try again later".to_string(),
                _ if message.is_empty() => "Request failed".to_string(),
                _ => message.clone(),
            },
            Self::Business { message, .. } if message.is_empty() => "Request failed".to_string(),
            Self::Business { message, .. } => message.clone(),
            Self::AuthExpired(_) => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Cancelled => "Request cancelled".to_string(),
            Self::Encode(_) | Self::Decode(_) => "Request failed".to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Builder errors (bad header name/value, bad URL) happen before anything
        // is sent.
        if err.is_builder() {
            Self::Encode(err.to_string())
        } else if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages() {
        assert_eq!(
            TransportError::Network("reset".into()).user_message(),
            NETWORK_MESSAGE
        );
        assert_eq!(
            TransportError::Http { status: 403, message: "nope".into() }.user_message(),
            "Access denied, insufficient permissions"
        );
        assert_eq!(
            TransportError::Http { status: 404, message: String::new() }.user_message(),
            "Resource not found"
        );
        assert_eq!(
            TransportError::Http { status: 409, message: "version conflict".into() }.user_message(),
            "version conflict"
        );
        assert_eq!(
            TransportError::Business { code: 400, message: "name taken".into() }.user_message(),
            "name taken"
        );
        assert_eq!(
            TransportError::auth_expired("refresh rejected").user_message(),
            SESSION_EXPIRED_MESSAGE
        );
    }
}
