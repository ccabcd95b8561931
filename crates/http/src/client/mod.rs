//! Authenticated request gateway
//!
//! [`GatewayClient`] wraps every outbound call to the BidTun API. Before a
//! request is sent it attaches the caller's identity from the live session
//! (bearer token, else guest id). When the backend answers 401 it refreshes
//! the access token once, coalesced across concurrent failures, and replays
//! the original request a single time. When the refresh itself fails the
//! session is cleared and the redirect callback is sent to the login route.

pub mod auth;
pub mod config;
pub mod error;
pub mod global;
mod refresh;
pub mod request;

use bidtun_core::{CredentialStore, SessionCredential};
pub use config::{GatewayConfig, RefreshConfig, RefreshTransport};
pub use error::{ClientError, RefreshError};
use refresh::{RefreshClient, RefreshCoordinator};
pub use request::{GUEST_USER_ID, PendingRequest};
use reqwest::{Client, ClientBuilder, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Navigation callback invoked with the login route on unrecoverable auth failure
pub type Redirect = Arc<dyn Fn(&str) + Send + Sync>;

/// BidTun API client with credential decoration and 401 recovery
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    session: watch::Receiver<SessionCredential>,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl GatewayClient {
    /// Create a new client builder
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session as currently observed by the gateway
    pub fn session(&self) -> SessionCredential {
        self.session.borrow().clone()
    }

    /// Start a request to `path` under the base URL
    pub fn request(&self, method: Method, path: &str) -> PendingRequest {
        PendingRequest::new(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request through the gateway.
    ///
    /// Non-2xx responses become errors. A first 401 triggers one token
    /// refresh and one replay; anything else is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of the original call, of the replay, or
    /// [`ClientError::Refresh`] when the session could not be renewed.
    pub async fn send(&self, mut request: PendingRequest) -> Result<reqwest::Response, ClientError> {
        self.decorate(&mut request)?;
        let outcome = self.dispatch(&request).await;
        match outcome {
            Err(error) if error.is_auth_expired() && !request.is_retried() => {
                debug!(method = %request.method(), url = request.url(), "Request rejected with 401");
                self.recover(request).await
            }
            outcome => outcome,
        }
    }

    /// Send a request and decode the JSON response
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus decoding failures.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// `GET` a JSON resource
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// `POST` a JSON body and decode the JSON response
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.request(Method::POST, path).json(body)?;
        self.execute(request).await
    }

    /// Pre-send hook: identity from the latest session value
    fn decorate(&self, request: &mut PendingRequest) -> Result<(), ClientError> {
        let session = self.session.borrow().clone();
        request.decorate(&session)
    }

    /// Send once, mapping error statuses the same way for every call
    async fn dispatch(&self, request: &PendingRequest) -> Result<reqwest::Response, ClientError> {
        let response = request.to_reqwest(&self.client).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// 401 path: mark, obtain a token, replay once
    async fn recover(&self, mut request: PendingRequest) -> Result<reqwest::Response, ClientError> {
        request.mark_retried();

        let current = self.session.borrow().access_token().map(str::to_owned);
        let token = match current {
            Some(token) if request.sent_with() != Some(token.as_str()) => {
                debug!(
                    method = %request.method(),
                    url = request.url(),
                    "Session renewed since request was sent, replaying"
                );
                token
            }
            None if request.sent_with().is_some() => {
                // A failed refresh already cleared the session and redirected
                debug!(
                    method = %request.method(),
                    url = request.url(),
                    "Session cleared since request was sent, not refreshing again"
                );
                let error = self
                    .refresh
                    .last_failure()
                    .unwrap_or(RefreshError::MissingRefreshToken);
                return Err(error.into());
            }
            _ => self.refresh.refresh().await?,
        };

        request.set_bearer(&token)?;
        debug!(method = %request.method(), url = request.url(), "Replaying request");
        self.dispatch(&request).await
    }

    /// Force a token refresh, joining one already in flight
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Refresh`] if the refresh fails; the session is
    /// then cleared and the redirect has fired.
    pub async fn refresh_now(&self) -> Result<(), ClientError> {
        self.refresh.refresh().await?;
        Ok(())
    }
}

/// Builder for [`GatewayClient`]
pub struct GatewayClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    redirect: Option<Redirect>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    login_path: String,
    refresh: RefreshConfig,
}

impl Default for GatewayClientBuilder {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            base_url: None,
            store: None,
            redirect: None,
            timeout: None,
            user_agent: None,
            login_path: defaults.login_path,
            refresh: defaults.refresh,
        }
    }
}

impl GatewayClientBuilder {
    /// Start from a loaded configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            timeout: config.timeout(),
            user_agent: Some(config.user_agent.clone()),
            login_path: config.login_path.clone(),
            refresh: config.refresh.clone(),
            ..Self::default()
        }
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential store the gateway reads and updates
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the callback invoked with the login route when the session is lost
    pub fn on_redirect(mut self, redirect: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.redirect = Some(Arc::new(redirect));
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the login route passed to the redirect callback
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Set the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh.path = path.into();
        self
    }

    /// Set how the refresh token is sent
    pub fn refresh_transport(mut self, transport: RefreshTransport) -> Self {
        self.refresh.transport = transport;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the base URL or store is
    /// missing, or the HTTP client cannot be created.
    pub fn build(self) -> Result<GatewayClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ClientError::Configuration("credential store is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder = client_builder.user_agent("bidtun-client/0.1.0");
        }

        let client = client_builder.build()?;

        let redirect = self.redirect.unwrap_or_else(|| {
            Arc::new(|path: &str| warn!("Session lost; login required at {path}"))
        });

        let refresh = RefreshCoordinator::new(RefreshClient {
            http: client.clone(),
            url: format!("{}{}", base_url, self.refresh.path),
            transport: self.refresh.transport,
            store: store.clone(),
            redirect,
            login_path: self.login_path,
        });

        Ok(GatewayClient {
            client,
            base_url,
            session: store.subscribe(),
            store,
            refresh: Arc::new(refresh),
        })
    }
}
