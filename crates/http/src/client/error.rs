//! Client error types

use serde_json::Value;
use skillverse_core::Retryable;
use thiserror::Error;

pub const MSG_PERMISSION_DENIED: &str = "You do not have permission to perform this action";
pub const MSG_NOT_FOUND: &str = "The requested resource was not found";
pub const MSG_RATE_LIMITED: &str = "Too many requests. Please try again later";
pub const MSG_SERVER_ERROR: &str = "Server error. Please try again later";
pub const MSG_GENERIC: &str = "An error occurred while processing your request";
pub const MSG_NETWORK: &str =
    "Network error. Please check your internet connection and try again.";
pub const MSG_SESSION_EXPIRED: &str = "Your session has expired. Please log in again";

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable credential and recovery is not possible
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The refresh endpoint rejected the refresh token
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Server returned a 5xx status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// No response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Any other rejected request, or input refused before sending
    #[error("Validation error: {message}")]
    Validation { status: Option<u16>, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from an HTTP status and the raw response body
    ///
    /// A `message` or `detail` string in a JSON body takes precedence over the
    /// fixed message for the status.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let server_message = server_message(body);
        let message = |fallback: &str| server_message.clone().unwrap_or_else(|| fallback.into());

        match status {
            401 => Self::Unauthenticated(message(MSG_SESSION_EXPIRED)),
            403 => Self::PermissionDenied(message(MSG_PERMISSION_DENIED)),
            404 => Self::NotFound(message(MSG_NOT_FOUND)),
            429 => Self::RateLimited(message(MSG_RATE_LIMITED)),
            500.. => Self::ServerError {
                status,
                message: message(MSG_SERVER_ERROR),
            },
            _ => Self::Validation {
                status: Some(status),
                message: message(MSG_GENERIC),
            },
        }
    }

    /// Local input validation failure; nothing was sent
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Validation {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status associated with this error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::ServerError { status, .. } => Some(*status),
            Self::Validation { status, .. } => *status,
            Self::RefreshFailed(_)
            | Self::Network(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => None,
        }
    }

    /// Human-readable text suitable for a dismissible message
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated(message)
            | Self::RefreshFailed(message)
            | Self::PermissionDenied(message)
            | Self::NotFound(message)
            | Self::RateLimited(message)
            | Self::ServerError { message, .. }
            | Self::Validation { message, .. }
            | Self::Configuration(message) => message.clone(),
            Self::Network(_) => MSG_NETWORK.to_string(),
            Self::Serialization(_) => MSG_GENERIC.to_string(),
        }
    }

    /// Short heading for the message
    pub fn title(&self) -> String {
        if self.is_auth_failure() {
            return "Authentication Required".to_string();
        }
        match (self, self.status()) {
            (Self::Network(_), _) => "Connection Error".to_string(),
            (_, Some(status)) => format!("Error {status}"),
            (_, None) => "Error".to_string(),
        }
    }

    /// Whether the session is gone and the user must log in again
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated(_) | Self::RefreshFailed(_))
    }
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ServerError { .. })
    }
}

fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

/// Failure below the HTTP status level
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => Self::Network(message),
            TransportError::InvalidRequest(message) => Self::Configuration(message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_messages_per_status() {
        assert_eq!(
            ClientError::from_status(403, b"").user_message(),
            MSG_PERMISSION_DENIED
        );
        assert_eq!(ClientError::from_status(404, b"").user_message(), MSG_NOT_FOUND);
        assert_eq!(
            ClientError::from_status(429, b"").user_message(),
            MSG_RATE_LIMITED
        );
        assert_eq!(
            ClientError::from_status(503, b"oops").user_message(),
            MSG_SERVER_ERROR
        );
        assert_eq!(ClientError::from_status(418, b"").user_message(), MSG_GENERIC);
    }

    #[test]
    fn server_message_takes_precedence() {
        let err = ClientError::from_status(422, br#"{"message":"Email already taken"}"#);
        assert!(matches!(err, ClientError::Validation { status: Some(422), .. }));
        assert_eq!(err.user_message(), "Email already taken");

        let err = ClientError::from_status(404, br#"{"detail":"No such quiz"}"#);
        assert!(matches!(err, ClientError::NotFound(_)));
        assert_eq!(err.user_message(), "No such quiz");
    }

    #[test]
    fn titles() {
        assert_eq!(ClientError::from_status(500, b"").title(), "Error 500");
        assert_eq!(ClientError::Network("reset".into()).title(), "Connection Error");
        assert_eq!(
            ClientError::RefreshFailed("nope".into()).title(),
            "Authentication Required"
        );
        assert_eq!(ClientError::Configuration("x".into()).title(), "Error");
    }

    #[test]
    fn network_message_is_fixed() {
        let err: ClientError = TransportError::Network("connection refused".into()).into();
        assert_eq!(err.user_message(), MSG_NETWORK);
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!ClientError::from_status(400, b"").is_retryable());
        assert!(!ClientError::from_status(404, b"").is_retryable());
        assert!(ClientError::from_status(502, b"").is_retryable());
    }
}
