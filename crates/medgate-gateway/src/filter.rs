//! Bearer enforcement in front of protected routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use medgate_core::bearer_token;

use crate::server::GatewayState;
use crate::validator::TokenValidator;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `Authorization` header, or not `Bearer <token>`.
    MissingOrMalformedAuthHeader,
    /// The auth service refused the token.
    TokenRejected,
    /// The auth service could not be asked.
    UpstreamUnavailable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOrMalformedAuthHeader => write!(f, "missing_or_malformed_auth_header"),
            Self::TokenRejected => write!(f, "token_rejected"),
            Self::UpstreamUnavailable => write!(f, "upstream_unavailable"),
        }
    }
}

/// Outcome of the filter for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the request on unchanged.
    Forward,
    /// Answer 401 and stop.
    Reject(RejectReason),
}

/// Checks the `Authorization` header of each request.
///
/// Headers that are absent or not Bearer are refused without any network
/// call. Everything else is delegated, and anything short of an explicit
/// acceptance is a rejection.
#[derive(Clone)]
pub struct EnforcementFilter {
    validator: Arc<dyn TokenValidator>,
}

impl EnforcementFilter {
    /// Create a filter that delegates to `validator`.
    #[must_use]
    pub fn new(validator: Arc<dyn TokenValidator>) -> Self {
        Self { validator }
    }

    /// Decide on a request from its headers.
    pub async fn check(&self, headers: &HeaderMap) -> Decision {
        let raw = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        self.check_header(raw).await
    }

    /// Decide on a raw `Authorization` header value.
    pub async fn check_header(&self, authorization: Option<&str>) -> Decision {
        let Some(raw) = authorization.filter(|h| bearer_token(h).is_some()) else {
            return Decision::Reject(RejectReason::MissingOrMalformedAuthHeader);
        };

        match self.validator.validate(raw).await {
            Ok(true) => Decision::Forward,
            Ok(false) => Decision::Reject(RejectReason::TokenRejected),
            Err(e) => {
                tracing::warn!(error = %e, "Token delegation failed, rejecting");
                Decision::Reject(RejectReason::UpstreamUnavailable)
            }
        }
    }
}

impl std::fmt::Debug for EnforcementFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforcementFilter").finish_non_exhaustive()
    }
}

/// Middleware: run the filter for routes that require a token.
pub(crate) async fn enforce(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let Some(route) = state.routes.match_path(path) else {
        return next.run(request).await;
    };
    if !route.jwt_validation {
        return next.run(request).await;
    }

    match state.filter.check(request.headers()).await {
        Decision::Forward => next.run(request).await,
        Decision::Reject(reason) => {
            tracing::info!(
                route = %route.id,
                path = %path,
                reason = %reason,
                "Request rejected"
            );
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use super::*;
    use crate::validator::DelegationError;

    /// Accepts one fixed header value and counts calls.
    struct CountingValidator {
        accept: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenValidator for CountingValidator {
        async fn validate(&self, authorization: &str) -> Result<bool, DelegationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(authorization == self.accept)
        }
    }

    struct DownValidator;

    #[async_trait]
    impl TokenValidator for DownValidator {
        async fn validate(&self, _authorization: &str) -> Result<bool, DelegationError> {
            Err(DelegationError::Unreachable("connection refused".to_string()))
        }
    }

    fn counting() -> Arc<CountingValidator> {
        Arc::new(CountingValidator {
            accept: "Bearer good",
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_missing_header_no_delegation() {
        let validator = counting();
        let filter = EnforcementFilter::new(validator.clone());

        assert_eq!(
            filter.check(&HeaderMap::new()).await,
            Decision::Reject(RejectReason::MissingOrMalformedAuthHeader)
        );
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_bearer_no_delegation() {
        let validator = counting();
        let filter = EnforcementFilter::new(validator.clone());

        for value in ["Basic xyz", "Bearer ", "good", "Token good"] {
            assert_eq!(
                filter.check_header(Some(value)).await,
                Decision::Reject(RejectReason::MissingOrMalformedAuthHeader),
                "{value}"
            );
        }
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delegates_raw_header() {
        let validator = counting();
        let filter = EnforcementFilter::new(validator.clone());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer good"));
        assert_eq!(filter.check(&headers).await, Decision::Forward);

        assert_eq!(
            filter.check_header(Some("Bearer bad")).await,
            Decision::Reject(RejectReason::TokenRejected)
        );
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delegation_failure_fails_closed() {
        let filter = EnforcementFilter::new(Arc::new(DownValidator));
        assert_eq!(
            filter.check_header(Some("Bearer good")).await,
            Decision::Reject(RejectReason::UpstreamUnavailable)
        );
    }
}
