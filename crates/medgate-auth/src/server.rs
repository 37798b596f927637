//! HTTP surface of the authentication service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use medgate_core::{AuthServiceConfig, bearer_token};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use super::AuthError;
use super::jwt::TokenCodec;
use super::service::AuthService;
use super::setup;
use super::users::SledCredentialStore;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    /// Login identifier (email).
    #[serde(alias = "identifier")]
    pub email: String,
    /// Plaintext secret. Never logged.
    #[serde(alias = "secret")]
    pub password: SecretString,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Login response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Issued bearer token.
    pub token: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RecordExists(_) => StatusCode::CONFLICT,
            Self::TokenError(_)
            | Self::Hashing(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_) => {
                tracing::error!(error = %self, "Auth request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        status.into_response()
    }
}

/// Build the auth service router: `POST /login`, `GET /validate`, `GET /health`.
pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/validate", get(validate_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn login_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(request) = payload.map_err(|e| AuthError::InvalidRequest(e.body_text()))?;
    let issued = service.authenticate(&request.email, request.password).await?;

    Ok(Json(LoginResponse {
        token: issued.token,
    }))
}

async fn validate_handler(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> StatusCode {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    match token {
        Some(token) if service.check_token(token) => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

/// The authentication service process.
pub struct AuthServer {
    config: AuthServiceConfig,
    service: Arc<AuthService>,
}

impl AuthServer {
    /// Create a server around an already-built service.
    #[must_use]
    pub const fn new(config: AuthServiceConfig, service: Arc<AuthService>) -> Self {
        Self { config, service }
    }

    /// Build the service from configuration: decode the signing key, open the
    /// sled credential store and seed it from the environment if empty.
    ///
    /// # Errors
    ///
    /// Returns error if the key is missing or invalid, or the store cannot be
    /// opened.
    pub async fn from_config(config: &AuthServiceConfig) -> Result<Self, AuthError> {
        let secret = config.signing_secret()?;
        let codec = TokenCodec::new(&secret, config.token_ttl());

        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let store = Arc::new(SledCredentialStore::open(&data_dir)?);
        tracing::info!(path = %data_dir.display(), records = store.count(), "Credential store opened");

        setup::seed_from_env(&*store).await?;

        let service = Arc::new(AuthService::new(store, codec));
        Ok(Self::new(config.clone(), service))
    }

    /// The shared service.
    #[must_use]
    pub fn service(&self) -> Arc<AuthService> {
        Arc::clone(&self.service)
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), AuthError> {
        let addr: SocketAddr = format!("{}:{}", self.config.mode.address(), self.config.port)
            .parse()
            .map_err(|e| AuthError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Auth service listening on http://{}", addr);

        axum::serve(listener, router(self.service()))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Auth service stopped");
        Ok(())
    }
}

impl std::fmt::Debug for AuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServer")
            .field("port", &self.config.port)
            .finish_non_exhaustive()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
