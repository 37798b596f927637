//! Input validation and normalization.
//!
//! Login identifiers are email addresses. They are normalized before lookup
//! so that visually identical inputs map to the same credential record.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Maximum identifier length (RFC 5321 path limit).
pub const MAX_IDENTIFIER_LENGTH: usize = 254;

/// Validation error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Input exceeds maximum allowed length.
    #[error("Input exceeds maximum length ({max} bytes, got {actual})")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Identifier is empty after trimming.
    #[error("Identifier is empty")]
    Empty,

    /// Identifier is not an email address.
    #[error("Identifier is not a valid email address")]
    NotAnEmail,
}

/// Normalize and validate a login identifier.
///
/// Performs:
/// 1. Whitespace trim
/// 2. Length check
/// 3. Unicode normalization (NFKC) and ASCII lowercasing
/// 4. Email syntax check
///
/// # Errors
///
/// Returns a `ValidationError` describing why the identifier was refused.
pub fn normalize_identifier(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            max: MAX_IDENTIFIER_LENGTH,
            actual: trimmed.len(),
        });
    }

    let normalized: String = trimmed.nfkc().collect::<String>().to_ascii_lowercase();

    if !normalized.validate_email() {
        return Err(ValidationError::NotAnEmail);
    }

    Ok(normalized)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme must be exactly `Bearer `. Returns `None` for any other scheme,
/// including other casings, or an empty token.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
