//! Process-wide gateway instance
//!
//! Applications that want a single shared gateway install it once at start-up.
//! A second install is refused, so the hooks can never be registered twice.

use super::{ClientError, GatewayClient};
use once_cell::sync::OnceCell;

static GATEWAY: OnceCell<GatewayClient> = OnceCell::new();

/// Install the process-wide gateway
///
/// # Errors
///
/// Returns [`ClientError::AlreadyInitialized`] if a gateway is already installed.
pub fn install(client: GatewayClient) -> Result<&'static GatewayClient, ClientError> {
    GATEWAY
        .try_insert(client)
        .map_err(|_| ClientError::AlreadyInitialized)
}

/// The installed gateway, if any
pub fn gateway() -> Option<&'static GatewayClient> {
    GATEWAY.get()
}
