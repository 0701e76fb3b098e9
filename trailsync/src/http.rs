//! HTTP location sink.
//!
//! Posts each [`LocationUpdate`] as JSON to the backend's location endpoint,
//! injecting the session bearer token, and maps responses onto
//! [`DeliveryError`] so the manager can tell permanent from transient
//! failures.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use thiserror::Error;

use crate::location::{DeliveryError, LocationSink, LocationUpdate};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors building the HTTP sink.
#[derive(Debug, Error)]
pub enum HttpSinkError {
    /// The endpoint URL is empty or malformed.
    #[error("Invalid sink endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The underlying HTTP client could not be created.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Configuration for [`HttpLocationSink`].
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Full URL of the location endpoint.
    pub endpoint: String,
    /// Bearer token sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpSinkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Location sink backed by a reusable `reqwest::Client`.
pub struct HttpLocationSink {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    token: Option<String>,
}

impl std::fmt::Debug for HttpLocationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLocationSink")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpLocationSink {
    /// Create a sink from configuration.
    pub fn new(config: HttpSinkConfig) -> Result<Self, HttpSinkError> {
        let endpoint = reqwest::Url::parse(&config.endpoint)
            .map_err(|_| HttpSinkError::InvalidEndpoint(config.endpoint.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HttpSinkError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            token: config.token.filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn post(&self, update: &LocationUpdate) -> Result<(), DeliveryError> {
        let mut request = self.http.post(self.endpoint.clone()).json(update);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::trace!(status = status.as_u16(), "Location endpoint responded");
        classify_status(status)
    }
}

impl LocationSink for HttpLocationSink {
    fn send_location_update<'a>(
        &'a self,
        update: &'a LocationUpdate,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        self.post(update).boxed()
    }
}

/// Map a response status onto the delivery outcome.
pub fn classify_status(status: StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Status {
            code: status.as_u16(),
        })
    }
}
