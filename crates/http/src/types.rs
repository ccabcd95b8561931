//! Wire types of the BidTun REST API consumed by the client

use bidtun_core::TokenPair;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Standard response envelope: `{ "data": ..., "message": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Refresh request sent with the body transport
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response payload (inside the envelope)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Profile of the signed-in user, passed through as returned by the backend
    #[serde(default)]
    pub user: JsonValue,
    pub tokens: TokenPair,
}

/// Logout request; carries the refresh token so the backend can revoke it
#[derive(Debug, Serialize)]
pub struct LogoutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_refresh_envelope_without_rotation() {
        let envelope: ApiEnvelope<TokenPair> =
            serde_json::from_value(json!({ "data": { "access": "new" } })).unwrap();
        assert_eq!(envelope.data.access, "new");
        assert_eq!(envelope.data.refresh, None);
        assert_eq!(envelope.message, None);
    }

    #[test]
    fn test_login_envelope() {
        let envelope: ApiEnvelope<LoginResponse> = serde_json::from_value(json!({
            "message": "Logged in",
            "data": {
                "user": { "email": "a@bidtun.com" },
                "tokens": { "access": "a1", "refresh": "r1" }
            }
        }))
        .unwrap();
        assert_eq!(envelope.data.tokens.refresh.as_deref(), Some("r1"));
        assert_eq!(envelope.data.user["email"], "a@bidtun.com");
        assert_eq!(envelope.message.as_deref(), Some("Logged in"));
    }
}
