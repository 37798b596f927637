//! # medgate Gateway
//!
//! The single entry point in front of the backend services.
//!
//! Every request is matched against the route table. Routes that require a
//! token pass through the enforcement filter, which rejects missing or
//! non-Bearer headers locally and delegates everything else to the
//! authentication service's `/validate` endpoint. Only accepted requests are
//! proxied upstream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filter;
mod proxy;
mod routes;
mod server;
mod validator;

pub use filter::{Decision, EnforcementFilter, RejectReason};
pub use proxy::Proxy;
pub use routes::{RouteTable, strip_segments};
pub use server::{Gateway, GatewayState};
pub use validator::{DelegationError, HttpTokenValidator, TokenValidator};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Start the gateway with the given configuration.
///
/// # Errors
///
/// Returns error if the gateway cannot be built or the server fails.
pub async fn start(config: medgate_core::GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The upstream service could not be reached.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// The request could not be read.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No route matches the request path.
    #[error("No route for {0}")]
    NoRoute(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Upstream(_) => {
                tracing::warn!(error = %self, "Proxy failed");
                StatusCode::BAD_GATEWAY
            }
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoRoute(_) => StatusCode::NOT_FOUND,
            Self::Server(_) | Self::Config(_) | Self::Io(_) => {
                tracing::error!(error = %self, "Gateway request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        status.into_response()
    }
}

impl From<medgate_core::ConfigError> for GatewayError {
    fn from(err: medgate_core::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
