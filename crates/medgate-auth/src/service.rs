//! Credential checks and token issuance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medgate_core::normalize_identifier;
use secrecy::{ExposeSecret, SecretString};

use super::jwt::{IssuedToken, TokenCodec, ValidationOutcome};
use super::password;
use super::users::CredentialStore;
use super::AuthError;

/// The authentication service.
///
/// Owns the credential store handle and the token codec. Both are injected
/// once at construction.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl AuthService {
    /// Create a service over a store and codec.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// The token codec.
    #[must_use]
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// The credential store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    /// Check a login and issue a token valid from now.
    ///
    /// # Errors
    ///
    /// See [`AuthService::authenticate_at`].
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: SecretString,
    ) -> Result<IssuedToken, AuthError> {
        self.authenticate_at(identifier, secret, Utc::now()).await
    }

    /// Check a login and issue a token valid from `now`.
    ///
    /// Unknown identifiers, identifiers that can never be stored, empty
    /// secrets and wrong secrets all yield `AuthError::InvalidCredentials`,
    /// after the same amount of hashing work.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the login does not match a stored record
    /// - `StoreUnavailable` if the credential store fails
    pub async fn authenticate_at(
        &self,
        identifier: &str,
        secret: SecretString,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let identifier = normalize_identifier(identifier)
            .ok()
            .filter(|_| !secret.expose_secret().is_empty());

        let record = match &identifier {
            Some(identifier) => self
                .store
                .find_by_identifier(identifier)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Credential lookup failed"))?,
            None => None,
        };

        let stored_hash = record.as_ref().map(|r| r.secret_hash.clone());
        let matched = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => password::verify(secret.expose_secret(), &hash),
            None => {
                let _ = password::verify_against_dummy(secret.expose_secret());
                false
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))?;

        let Some(record) = record.filter(|_| matched) else {
            tracing::info!(identifier = identifier.as_deref().unwrap_or("-"), "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        let issued = self.codec.issue(&record.identifier, record.role, now)?;
        tracing::info!(
            identifier = %record.identifier,
            role = %record.role,
            expires_at = %issued.expires_at,
            "Login succeeded"
        );

        Ok(issued)
    }

    /// Whether a token is currently valid. Every failure collapses to `false`.
    #[must_use]
    pub fn check_token(&self, token: &str) -> bool {
        self.check_token_at(token, Utc::now())
    }

    /// Whether a token is valid at instant `now`.
    #[must_use]
    pub fn check_token_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.verify_token_at(token, now).is_valid()
    }

    /// Verify a token at instant `now`, keeping the failure reason.
    #[must_use]
    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> ValidationOutcome {
        let outcome = self.codec.verify(token, now);
        if let Some(reason) = outcome.reason() {
            tracing::debug!(reason = %reason, "Token rejected");
        }
        outcome
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
