//! Delegated token checks against the authentication service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use thiserror::Error;

/// A delegation call that produced no verdict.
#[derive(Debug, Error)]
pub enum DelegationError {
    /// The auth service could not be reached or did not answer in time.
    #[error("Auth service unreachable: {0}")]
    Unreachable(String),

    /// The auth service answered with an unexpected status.
    #[error("Auth service returned {0}")]
    UnexpectedStatus(u16),
}

/// Something that can tell whether a raw `Authorization` header value is
/// acceptable.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// `Ok(true)` to accept, `Ok(false)` to refuse, `Err` when no verdict
    /// could be obtained.
    async fn validate(&self, authorization: &str) -> Result<bool, DelegationError>;
}

/// Calls `GET {auth_url}/validate`, forwarding the header value unchanged.
#[derive(Debug, Clone)]
pub struct HttpTokenValidator {
    client: reqwest::Client,
    validate_url: String,
}

impl HttpTokenValidator {
    /// Create a validator for the auth service at `auth_url`, with a request
    /// timeout covering connect and response.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(auth_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            validate_url: format!("{}/validate", auth_url.trim_end_matches('/')),
        })
    }

    /// The full validation endpoint URL.
    #[must_use]
    pub fn validate_url(&self) -> &str {
        &self.validate_url
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, authorization: &str) -> Result<bool, DelegationError> {
        let response = self
            .client
            .get(&self.validate_url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| DelegationError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => Err(DelegationError::UnexpectedStatus(status.as_u16())),
        }
    }
}
