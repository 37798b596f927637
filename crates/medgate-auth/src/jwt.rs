//! JWT token management.
//!
//! Tokens are HS256 compact JWTs. Verification never throws: every failure
//! comes back as a `ValidationOutcome::Invalid` carrying the first check that
//! failed, in this order: empty input, structure, algorithm, signature,
//! claim shape, expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use medgate_core::SigningSecret;
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::users::Role;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (login identifier).
    pub sub: String,
    /// Role of the credential record at issuance.
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiration (Unix seconds). Valid while `now < exp`.
    pub exp: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact `header.payload.signature` string.
    pub token: String,
    /// Instant the token stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Signature does not match the signing key.
    BadSignature,
    /// `now >= exp`.
    Expired,
    /// Not a well-formed token, or claims are missing/ill-typed.
    Malformed,
    /// Header names an algorithm other than HS256.
    UnsupportedAlgorithm,
    /// Empty token string.
    Empty,
}

impl InvalidReason {
    /// Short machine-readable code, for logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::Malformed => "malformed",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<&ErrorKind> for InvalidReason {
    fn from(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::UnsupportedAlgorithm,
            _ => Self::Malformed,
        }
    }
}

/// Result of verifying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// All checks passed.
    Valid(Claims),
    /// A check failed.
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    /// Whether the token passed every check.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Decoded claims, if valid.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Valid(claims) => Some(claims),
            Self::Invalid(_) => None,
        }
    }

    /// Failure reason, if invalid.
    #[must_use]
    pub const fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }
}

/// Issues and verifies tokens with a single symmetric key.
///
/// The key is handed in at construction and kept for the codec's lifetime.
/// Tokens signed under any other key decode as `BadSignature`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from a signing secret and token lifetime.
    #[must_use]
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.expose()),
            decoding_key: DecodingKey::from_secret(secret.expose()),
            validation,
            ttl,
        }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` with `role`, valid from `now` for one TTL.
    ///
    /// Timestamps are truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns error if the TTL is out of range or encoding fails.
    pub fn issue(
        &self,
        subject: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::TokenError("TTL out of range".to_string()))?;
        let iat = now.timestamp();
        let exp = iat
            .checked_add(ttl)
            .ok_or_else(|| AuthError::TokenError("Expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenError(format!("Encoding failed: {e}")))?;

        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::TokenError("Expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token at instant `now`.
    #[must_use]
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> ValidationOutcome {
        if token.trim().is_empty() {
            return ValidationOutcome::Invalid(InvalidReason::Empty);
        }

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) if now.timestamp() < data.claims.exp => ValidationOutcome::Valid(data.claims),
            Ok(_) => ValidationOutcome::Invalid(InvalidReason::Expired),
            Err(e) => ValidationOutcome::Invalid(InvalidReason::from(e.kind())),
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const TEN_HOURS: Duration = Duration::from_secs(10 * 3600);

    fn create_codec() -> TokenCodec {
        TokenCodec::new(&SigningSecret::generate(), TEN_HOURS)
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn split(token: &str) -> (String, String, String) {
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        (
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
        )
    }

    #[test]
    fn test_issue_sets_claims() {
        let codec = create_codec();
        let issued = codec.issue("u@test.com", Role::User, t0()).unwrap();

        assert!(!issued.token.is_empty());
        assert_eq!(issued.token.matches('.').count(), 2);
        assert_eq!(issued.expires_at, t0() + chrono::Duration::hours(10));

        let outcome = codec.verify(&issued.token, t0());
        let claims = outcome.claims().unwrap();
        assert_eq!(claims.sub, "u@test.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, t0().timestamp() + 36_000);
    }

    #[test]
    fn test_issue_is_deterministic() {
        let codec = create_codec();
        let a = codec.issue("u@test.com", Role::Admin, t0()).unwrap();
        let b = codec.issue("u@test.com", Role::Admin, t0()).unwrap();
        assert_eq!(a, b);

        let later = codec
            .issue("u@test.com", Role::Admin, t0() + chrono::Duration::seconds(1))
            .unwrap();
        assert_ne!(a.token, later.token);
    }

    #[test]
    fn test_valid_until_ttl_boundary() {
        let codec = create_codec();
        let issued = codec.issue("u@test.com", Role::User, t0()).unwrap();

        for offset in [0, 1, 3600, 35_999] {
            let now = t0() + chrono::Duration::seconds(offset);
            assert!(codec.verify(&issued.token, now).is_valid(), "offset {offset}");
        }

        for offset in [36_000, 36_001, 86_400] {
            let now = t0() + chrono::Duration::seconds(offset);
            assert_eq!(
                codec.verify(&issued.token, now),
                ValidationOutcome::Invalid(InvalidReason::Expired),
                "offset {offset}"
            );
        }
    }

    #[test]
    fn test_verify_is_idempotent() {
        let codec = create_codec();
        let issued = codec.issue("u@test.com", Role::User, t0()).unwrap();
        let now = t0() + chrono::Duration::minutes(5);

        let first = codec.verify(&issued.token, now);
        for _ in 0..5 {
            assert_eq!(codec.verify(&issued.token, now), first);
        }
        assert!(first.is_valid());
    }

    #[test]
    fn test_signature_bit_flips_detected() {
        let codec = create_codec();
        let issued = codec.issue("u@test.com", Role::User, t0()).unwrap();
        let (header, payload, signature) = split(&issued.token);
        let sig_bytes = URL_SAFE_NO_PAD.decode(&signature).unwrap();

        for byte in 0..sig_bytes.len() {
            for bit in 0..8 {
                let mut tampered = sig_bytes.clone();
                tampered[byte] ^= 1 << bit;
                let token = format!("{header}.{payload}.{}", URL_SAFE_NO_PAD.encode(&tampered));
                assert_eq!(
                    codec.verify(&token, t0()),
                    ValidationOutcome::Invalid(InvalidReason::BadSignature)
                );
            }
        }
    }

    #[test]
    fn test_payload_tampering_detected() {
        let codec = create_codec();
        let issued = codec.issue("u@test.com", Role::User, t0()).unwrap();
        let (header, _, signature) = split(&issued.token);

        let forged = Claims {
            sub: "u@test.com".to_string(),
            role: Role::Admin,
            iat: t0().timestamp(),
            exp: t0().timestamp() + 36_000,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let token = format!("{header}.{forged_payload}.{signature}");

        assert_eq!(
            codec.verify(&token, t0()),
            ValidationOutcome::Invalid(InvalidReason::BadSignature)
        );
    }

    #[test]
    fn test_other_key_rejected() {
        let issuer = create_codec();
        let verifier = create_codec();
        let issued = issuer.issue("u@test.com", Role::User, t0()).unwrap();

        assert_eq!(
            verifier.verify(&issued.token, t0()),
            ValidationOutcome::Invalid(InvalidReason::BadSignature)
        );
    }

    #[test]
    fn test_empty_token() {
        let codec = create_codec();
        assert_eq!(
            codec.verify("", t0()),
            ValidationOutcome::Invalid(InvalidReason::Empty)
        );
        assert_eq!(
            codec.verify("   ", t0()),
            ValidationOutcome::Invalid(InvalidReason::Empty)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = create_codec();
        for token in ["invalid.token.here", "not-a-jwt", "a.b", "a.b.c.d"] {
            assert_eq!(
                codec.verify(token, t0()),
                ValidationOutcome::Invalid(InvalidReason::Malformed),
                "{token}"
            );
        }
    }

    #[test]
    fn test_unsupported_algorithm() {
        let secret = SigningSecret::generate();
        let codec = TokenCodec::new(&secret, TEN_HOURS);

        let claims = Claims {
            sub: "u@test.com".to_string(),
            role: Role::User,
            iat: t0().timestamp(),
            exp: t0().timestamp() + 36_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.expose()),
        )
        .unwrap();

        assert_eq!(
            codec.verify(&token, t0()),
            ValidationOutcome::Invalid(InvalidReason::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_missing_claims_are_malformed() {
        #[derive(Serialize)]
        struct Partial {
            sub: String,
            exp: i64,
        }

        let secret = SigningSecret::generate();
        let codec = TokenCodec::new(&secret, TEN_HOURS);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Partial {
                sub: "u@test.com".to_string(),
                exp: t0().timestamp() + 60,
            },
            &EncodingKey::from_secret(secret.expose()),
        )
        .unwrap();

        assert_eq!(
            codec.verify(&token, t0()),
            ValidationOutcome::Invalid(InvalidReason::Malformed)
        );
    }

    #[test]
    fn test_reason_from_error_kind() {
        assert_eq!(
            InvalidReason::from(&ErrorKind::ExpiredSignature),
            InvalidReason::Expired
        );
        assert_eq!(
            InvalidReason::from(&ErrorKind::InvalidToken),
            InvalidReason::Malformed
        );
        assert_eq!(InvalidReason::BadSignature.to_string(), "bad_signature");
    }
}
