//! Session credential model
//!
//! A [`SessionCredential`] is the caller's whole authentication state: the
//! signed-in user's token pair (with the subject decoded from the access
//! token) and an optional guest identity used before login.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Access and refresh token pair returned by login and refresh
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl TokenPair {
    /// Create a token pair
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signed-in user state
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Subject (`sub` claim) of the access token
    #[serde(default)]
    pub id: Option<String>,
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl AuthenticatedUser {
    /// Build user state from a fresh token pair, decoding the subject
    pub fn from_tokens(tokens: TokenPair) -> Self {
        let id = decode_subject(&tokens.access);
        Self {
            id,
            access: tokens.access,
            refresh: tokens.refresh,
        }
    }

    /// Replacement state after a refresh. The previous refresh token is kept
    /// when the backend does not rotate it.
    #[must_use]
    pub fn refreshed(&self, tokens: TokenPair) -> Self {
        let refresh = tokens.refresh.or_else(|| self.refresh.clone());
        Self::from_tokens(TokenPair::new(tokens.access, refresh))
    }

    /// Expiry of the access token, if it carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        decode_expiry(&self.access)
    }
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("id", &self.id)
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Guest identity assigned before login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUser {
    pub id: String,
}

/// The caller's current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    #[serde(default)]
    pub user: Option<AuthenticatedUser>,
    #[serde(default, rename = "guestUser")]
    pub guest: Option<GuestUser>,
}

impl SessionCredential {
    /// Current access token; empty tokens count as absent
    pub fn access_token(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.access.as_str())
            .filter(|token| !token.is_empty())
    }

    /// Current refresh token; empty tokens count as absent
    pub fn refresh_token(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|user| user.refresh.as_deref())
            .filter(|token| !token.is_empty())
    }

    /// Subject id decoded from the access token
    pub fn subject_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|user| user.id.as_deref())
    }

    /// Guest identifier; empty ids count as absent
    pub fn guest_id(&self) -> Option<&str> {
        self.guest
            .as_ref()
            .map(|guest| guest.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Whether the access token is known to have expired at `now`.
    /// Tokens without a readable `exp` claim are not reported as expired.
    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        self.user
            .as_ref()
            .and_then(AuthenticatedUser::expires_at)
            .is_some_and(|expires_at| expires_at <= now)
    }
}

/// Claims the client reads from an access token
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<serde_json::Value>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl AccessClaims {
    /// Subject as a string; numeric subjects are rendered in decimal
    pub fn subject(&self) -> Option<String> {
        match self.sub.as_ref()? {
            serde_json::Value::String(sub) => Some(sub.clone()),
            serde_json::Value::Number(sub) => Some(sub.to_string()),
            _ => None,
        }
    }
}

/// Decode the claims of a JWT without verifying its signature.
///
/// The client never holds the signing key; the backend remains the only
/// party that validates tokens.
///
/// # Errors
///
/// Returns [`CoreError::InvalidToken`] if the token is not a well-formed JWT.
pub fn decode_claims(token: &str) -> CoreResult<AccessClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| CoreError::invalid_token(e.to_string()))
}

/// Subject of an access token, or `None` if it cannot be decoded
pub fn decode_subject(token: &str) -> Option<String> {
    match decode_claims(token) {
        Ok(claims) => claims.subject(),
        Err(e) => {
            warn!("Could not decode access token subject: {e}");
            None
        }
    }
}

/// Expiry (`exp` claim) of an access token, or `None` if absent or undecodable
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    match decode_claims(token) {
        Ok(claims) => claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        Err(e) => {
            warn!("Could not decode access token expiry: {e}");
            None
        }
    }
}
