//! Argon2id hashing for login secrets.
//!
//! Stored hashes are PHC strings, so parameters and salt travel with the hash.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::AuthError;

/// Hash verified when no record exists for an identifier, so that unknown
/// identifiers cost the same as wrong secrets.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$+qQPkJmQ6/jwb7M6LvSKNQ$1rqJRAvHYXzESzvxIxLBPxYJCvkGgifq0HoBBwoDZxY";

/// Hash a plaintext secret with a fresh random salt.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if hashing fails.
pub fn hash(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(format!("Password hashing failed: {e}")))
}

/// Check a plaintext secret against a stored hash.
///
/// A stored hash that cannot be parsed never matches.
#[must_use]
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("Stored credential hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Burn one verification against a fixed hash. Always returns `false` for
/// any secret a caller could plausibly submit.
#[must_use]
pub fn verify_against_dummy(plaintext: &str) -> bool {
    verify(plaintext, DUMMY_HASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash("pw123").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify("pw123", &stored));
        assert!(!verify("pw124", &stored));
        assert!(!verify("", &stored));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash("pw123").unwrap();
        let b = hash("pw123").unwrap();
        assert_ne!(a, b);
        assert!(verify("pw123", &a));
        assert!(verify("pw123", &b));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify("pw123", "not-a-hash"));
        assert!(!verify("pw123", ""));
    }

    #[test]
    fn test_dummy_hash_parses() {
        assert!(PasswordHash::new(DUMMY_HASH).is_ok());
        assert!(!verify_against_dummy("pw123"));
    }
}
