//! Coalesced access-token refresh
//!
//! At most one refresh call is in flight per gateway. Every 401 that arrives
//! while it is outstanding awaits the same shared future, so a refresh token
//! is spent once no matter how many requests failed with it.

use super::Redirect;
use super::config::RefreshTransport;
use super::error::RefreshError;
use crate::types::{ApiEnvelope, RefreshRequest};
use bidtun_core::{CredentialStore, TokenPair};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Everything one refresh attempt needs, detached from the gateway so the
/// shared future can be `'static`
#[derive(Clone)]
pub(crate) struct RefreshClient {
    pub(crate) http: reqwest::Client,
    pub(crate) url: String,
    pub(crate) transport: RefreshTransport,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) redirect: Redirect,
    pub(crate) login_path: String,
}

impl RefreshClient {
    /// Run one refresh and apply its outcome to the session.
    ///
    /// On success the store receives the new token pair and the new access
    /// token is returned. On any failure the user is reset and the redirect
    /// fires; both happen here, once, rather than in every waiting request.
    async fn run(self) -> Result<String, RefreshError> {
        let outcome = self.exchange().await;

        match &outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(e) => {
                warn!("Token refresh failed, clearing session: {e}");
                self.store.reset_user();
                (self.redirect)(&self.login_path);
            }
        }

        outcome
    }

    async fn exchange(&self) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .current()
            .refresh_token()
            .map(str::to_owned)
            .ok_or(RefreshError::MissingRefreshToken)?;

        let tokens = self.call(&refresh_token).await?;
        let access = tokens.access.clone();
        self.store
            .refresh_tokens(tokens)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        Ok(access)
    }

    /// POST to the refresh endpoint with the raw HTTP client. Decoration and
    /// 401 recovery do not apply to this call.
    async fn call(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let request = self.http.post(&self.url);
        let request = match self.transport {
            RefreshTransport::Body => request.json(&RefreshRequest {
                refresh: refresh_token,
            }),
            RefreshTransport::Header => request.bearer_auth(refresh_token),
        };

        let response = request
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<TokenPair> = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        Ok(envelope.data)
    }
}

/// Owner of the single in-flight refresh
pub(crate) struct RefreshCoordinator {
    client: RefreshClient,
    in_flight: Mutex<Option<RefreshFuture>>,
    last_failure: Mutex<Option<RefreshError>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(client: RefreshClient) -> Self {
        Self {
            client,
            in_flight: Mutex::new(None),
            last_failure: Mutex::new(None),
        }
    }

    /// Obtain a fresh access token, joining a refresh that is already running
    pub(crate) async fn refresh(&self) -> Result<String, RefreshError> {
        let future = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(running) = slot.as_ref() {
                debug!("Joining in-flight token refresh");
                running.clone()
            } else {
                debug!("Starting token refresh");
                let started = self.client.clone().run().boxed().shared();
                *slot = Some(started.clone());
                started
            }
        };

        let result = future.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|running| running.ptr_eq(&future)) {
            *slot = None;
        }
        drop(slot);

        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = result.as_ref().err().cloned();

        result
    }

    /// Error of the most recent refresh, if it failed
    pub(crate) fn last_failure(&self) -> Option<RefreshError> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
