//! BidTun HTTP client
//!
//! Every call to the marketplace API goes through [`GatewayClient`], which
//! attaches the caller's credentials and transparently recovers from an
//! expired access token.

pub mod client;
pub mod types;

pub use client::{ClientError, GatewayClient, GatewayConfig, PendingRequest, RefreshTransport};
pub use reqwest::Method;
