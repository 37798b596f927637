//! Signing key material.
//!
//! - `SigningSecret`: HMAC key bytes that never show up in logs
//! - `SigningSecret::generate_base64`: fresh random key for provisioning

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use thiserror::Error;
use zeroize::Zeroize;

/// Minimum key length accepted for HS256 (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// Errors from decoding a signing secret.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The configured value is not valid base64.
    #[error("Secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decoded key is shorter than `MIN_SECRET_LEN`.
    #[error("Secret too short ({actual} bytes, need at least {MIN_SECRET_LEN})")]
    TooShort {
        /// Decoded length.
        actual: usize,
    },
}

/// Symmetric signing key.
///
/// The bytes live in a `secrecy::SecretBox` and are zeroized on drop. Load it
/// once at startup and share it behind an `Arc`; it is never rotated while
/// the process runs.
pub struct SigningSecret(SecretBox<[u8]>);

impl SigningSecret {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::TooShort` if fewer than `MIN_SECRET_LEN` bytes
    /// are supplied.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SecretError> {
        if bytes.len() < MIN_SECRET_LEN {
            let actual = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(SecretError::TooShort { actual });
        }
        Ok(Self(SecretBox::new(bytes.into_boxed_slice())))
    }

    /// Decode a base64 (standard alphabet) key.
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the key is too short.
    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(bytes)
    }

    /// Generate a random 256-bit key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(SecretBox::new(bytes.into_boxed_slice()))
    }

    /// Generate a random key and return its base64 encoding.
    #[must_use]
    pub fn generate_base64() -> String {
        let secret = Self::generate();
        STANDARD.encode(secret.expose())
    }

    /// Expose the key bytes. Only the token codec should need this.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}
