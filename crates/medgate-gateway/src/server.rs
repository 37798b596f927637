//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware;
use axum::response::Response;
use medgate_core::GatewayConfig;
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::filter::{EnforcementFilter, enforce};
use crate::proxy::Proxy;
use crate::routes::RouteTable;
use crate::validator::{HttpTokenValidator, TokenValidator};

/// Gateway state shared across requests. Immutable after startup.
#[derive(Debug)]
pub struct GatewayState {
    /// Route table.
    pub routes: RouteTable,
    /// Bearer enforcement for protected routes.
    pub filter: EnforcementFilter,
    /// Upstream forwarding.
    pub proxy: Proxy,
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway that delegates token checks over HTTP to
    /// `config.auth_service_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP clients cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let validator =
            HttpTokenValidator::new(&config.auth_service_url, config.validate_timeout())
                .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))?;
        Self::with_validator(config, Arc::new(validator))
    }

    /// Create a gateway with a custom token validator.
    ///
    /// # Errors
    ///
    /// Returns error if the proxy client cannot be built.
    pub fn with_validator(
        config: GatewayConfig,
        validator: Arc<dyn TokenValidator>,
    ) -> Result<Self, GatewayError> {
        let state = GatewayState {
            routes: RouteTable::new(config.routes.clone()),
            filter: EnforcementFilter::new(validator),
            proxy: Proxy::new()?,
        };

        Ok(Self {
            config,
            state: Arc::new(state),
        })
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> Arc<GatewayState> {
        Arc::clone(&self.state)
    }

    /// Build the router. Every path goes through enforcement, then the proxy.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = self.state();
        Router::new()
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(Arc::clone(&state), enforce))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.mode.address(), self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        for route in self.state.routes.routes() {
            tracing::info!(
                id = %route.id,
                prefix = %route.path_prefix,
                upstream = %route.upstream,
                jwt = route.jwt_validation,
                "Route registered"
            );
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            auth_service = %self.config.auth_service_url,
            "Gateway listening on http://{}",
            addr
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn proxy_handler(
    State(state): State<Arc<GatewayState>>,
    request: Request,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_string();
    let route = state
        .routes
        .match_path(&path)
        .ok_or(GatewayError::NoRoute(path))?;

    state.proxy.forward(route, request).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use medgate_core::RouteConfig;
    use tower::ServiceExt;

    use super::*;
    use crate::validator::DelegationError;

    struct AcceptAll;

    #[async_trait]
    impl TokenValidator for AcceptAll {
        async fn validate(&self, _authorization: &str) -> Result<bool, DelegationError> {
            Ok(true)
        }
    }

    fn gateway(routes: Vec<RouteConfig>) -> Gateway {
        let config = GatewayConfig {
            routes,
            ..GatewayConfig::default()
        };
        Gateway::with_validator(config, Arc::new(AcceptAll)).unwrap()
    }

    #[tokio::test]
    async fn test_no_route_is_404() {
        let app = gateway(Vec::new()).router();
        let response = app
            .oneshot(HttpRequest::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_401() {
        let app = gateway(GatewayConfig::default().routes).router();
        let response = app
            .oneshot(HttpRequest::get("/api/patients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let app = gateway(vec![RouteConfig {
            id: "dead".to_string(),
            path_prefix: "/dead".to_string(),
            upstream: format!("http://127.0.0.1:{port}"),
            strip_prefix: 1,
            jwt_validation: false,
        }])
        .router();

        let response = app
            .oneshot(HttpRequest::get("/dead/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
