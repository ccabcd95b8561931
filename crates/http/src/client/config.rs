//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for [`GatewayClient`](super::GatewayClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend API root, e.g. `https://api.bidtun.com`
    pub base_url: String,

    /// Request timeout in seconds, applied to normal calls, refreshes and
    /// replays alike (0 disables the timeout)
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Route handed to the redirect callback when the session cannot be recovered
    pub login_path: String,

    /// Token refresh endpoint settings
    pub refresh: RefreshConfig,
}

/// Token refresh endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Path of the refresh endpoint relative to `base_url`
    pub path: String,

    /// How the refresh token is presented to the endpoint
    pub transport: RefreshTransport,
}

/// How the refresh token travels to the refresh endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTransport {
    /// JSON body `{"refresh": "<token>"}`
    #[default]
    Body,
    /// `Authorization: Bearer <token>` header
    Header,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: "bidtun-client/0.1.0".to_string(),
            login_path: "/login".to_string(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            path: "/auth/refresh/".to_string(),
            transport: RefreshTransport::Body,
        }
    }
}

impl GatewayConfig {
    /// Request timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
