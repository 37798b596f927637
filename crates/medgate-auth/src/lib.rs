//! # medgate Auth
//!
//! The authentication service: the only process that holds the signing key.
//!
//! This crate provides:
//! - Credential records and stores (in-memory and sled)
//! - Argon2id secret hashing and verification
//! - JWT issuance and verification with tagged outcomes
//! - The login / validate HTTP surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod jwt;
/// Secret hashing and verification.
pub mod password;
mod server;
mod service;
/// Seeding credential records at startup.
pub mod setup;
mod users;

pub use jwt::{Claims, InvalidReason, IssuedToken, TokenCodec, ValidationOutcome};
pub use server::{AuthServer, LoginRequest, LoginResponse, router};
pub use service::AuthService;
pub use users::{
    CredentialRecord, CredentialStore, MemoryCredentialStore, Role, SledCredentialStore,
    StoreError,
};

use thiserror::Error;

/// Start the authentication service with the given configuration.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the server fails.
pub async fn start(config: medgate_core::AuthServiceConfig) -> Result<(), AuthError> {
    let server = AuthServer::from_config(&config).await?;
    server.run().await
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier or wrong secret. The two are never distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login input failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The credential store could not be reached. Retryable.
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// A record with this identifier already exists.
    #[error("Record already exists: {0}")]
    RecordExists(String),

    /// Token encoding failed.
    #[error("Token error: {0}")]
    TokenError(String),

    /// Secret hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Exists(id) => Self::RecordExists(id),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<medgate_core::ConfigError> for AuthError {
    fn from(err: medgate_core::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
