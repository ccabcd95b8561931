//! Pending request descriptor

use super::ClientError;
use bidtun_core::SessionCredential;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::fmt;

/// Header carrying the guest identity when no access token is available
pub const GUEST_USER_ID: HeaderName = HeaderName::from_static("guestuserid");

/// An outbound call owned by the gateway until it completes.
///
/// The body is buffered so the request can be replayed after a token
/// refresh. `retried` is set at most once and never cleared.
pub struct PendingRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
    sent_with: Option<String>,
}

impl PendingRequest {
    /// Create a request for an absolute URL
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            sent_with: None,
        }
    }

    /// Add a header. Identity headers (`Authorization`, `guestUserId`) are
    /// owned by the gateway and replaced when the request is sent.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a raw body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON payload
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(body)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether a refresh-and-replay has already been attempted
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Access token the request was last sent with
    pub(crate) fn sent_with(&self) -> Option<&str> {
        self.sent_with.as_deref()
    }

    /// Attach the identity of `session`: bearer token first, guest id
    /// second, nothing otherwise.
    pub(crate) fn decorate(&mut self, session: &SessionCredential) -> Result<(), ClientError> {
        self.headers.remove(AUTHORIZATION);
        self.headers.remove(&GUEST_USER_ID);
        self.sent_with = None;

        if let Some(token) = session.access_token() {
            self.set_bearer(token)?;
        } else if let Some(guest_id) = session.guest_id() {
            let value = HeaderValue::from_str(guest_id).map_err(|_| {
                ClientError::Configuration("guest id is not a valid header value".into())
            })?;
            self.headers.insert(GUEST_USER_ID, value);
        }
        Ok(())
    }

    pub(crate) fn set_bearer(&mut self, token: &str) -> Result<(), ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ClientError::Configuration("access token is not a valid header value".into())
        })?;
        value.set_sensitive(true);
        self.headers.remove(&GUEST_USER_ID);
        self.headers.insert(AUTHORIZATION, value);
        self.sent_with = Some(token.to_owned());
        Ok(())
    }

    pub(crate) fn to_reqwest(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("retried", &self.retried)
            .finish_non_exhaustive()
    }
}
