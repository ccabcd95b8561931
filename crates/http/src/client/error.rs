//! Client error types

use bidtun_core::CoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Token refresh failed; the session has been cleared
    #[error("Session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Credential store rejected an update
    #[error("Session store error: {0}")]
    Store(#[from] CoreError),

    /// A process-wide gateway is already installed
    #[error("Gateway already initialized")]
    AlreadyInitialized,
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status of the failed response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the caller's credentials (HTTP 401)
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

/// Why a token refresh failed.
///
/// Cloneable so one failed refresh can be reported to every request that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token in the session
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refresh call never got a response (connection, timeout)
    #[error("refresh request failed: {0}")]
    Network(String),

    /// The backend refused the refresh token
    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered 2xx with an unusable body
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        let err = ClientError::from_status(StatusCode::UNAUTHORIZED, "expired".into());
        assert!(err.is_auth_expired());
        assert_eq!(err.status(), Some(401));

        let err = ClientError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(!err.is_auth_expired());
        assert!(matches!(err, ClientError::ServerError { status: 500, .. }));
    }

    #[test]
    fn test_refresh_rejection_keeps_status() {
        let err = ClientError::from(RefreshError::Rejected {
            status: 400,
            message: "token_not_valid".into(),
        });
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_auth_expired());
    }
}
