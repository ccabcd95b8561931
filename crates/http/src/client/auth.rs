//! Authentication API client methods

use super::{ClientError, GatewayClient};
use crate::types::{ApiEnvelope, LoginRequest, LoginResponse, LogoutRequest};
use reqwest::Method;
use tracing::{info, warn};

impl GatewayClient {
    /// Sign in with email and password and store the returned tokens.
    ///
    /// Login is a public endpoint: the call carries no identity header and a
    /// 401 here is a wrong password, not an expired session, so it is never
    /// refreshed or replayed.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error if the backend refuses the credentials,
    /// or [`ClientError::Store`] if the returned access token is unusable.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let response = self
            .client
            .request(Method::POST, format!("{}/auth/login/", self.base_url))
            .json(request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let envelope: ApiEnvelope<LoginResponse> = response.json().await?;
        self.store.login(envelope.data.tokens.clone())?;
        info!("Signed in");
        Ok(envelope.data)
    }

    /// Sign out. The local session is cleared whatever the backend answers.
    ///
    /// # Errors
    ///
    /// Returns the backend error, after the session has been cleared.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let session = self.session();
        let request = self
            .request(Method::POST, "/auth/logout/")
            .json(&LogoutRequest {
                refresh: session.refresh_token(),
            })?;

        let outcome = self.send(request).await;
        self.store.reset_user();

        match outcome {
            Ok(_) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!("Logout call failed, local session cleared anyway: {e}");
                Err(e)
            }
        }
    }
}
