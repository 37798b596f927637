//! Forwarding accepted requests to upstream services.

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::Response;
use medgate_core::RouteConfig;

use crate::GatewayError;
use crate::routes::upstream_url;

/// Largest request body the gateway will buffer.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Headers that describe a single connection and are not forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// HTTP reverse proxy.
///
/// Method, headers (minus hop-by-hop), query and body are passed through.
/// Redirects are returned to the client, not followed.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    body_limit: usize,
}

impl Proxy {
    /// Create a proxy with the default body limit.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_body_limit(DEFAULT_BODY_LIMIT)
    }

    /// Create a proxy that buffers at most `body_limit` request bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn with_body_limit(body_limit: usize) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, body_limit })
    }

    /// Forward `request` to the upstream of `route` and stream the answer back.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` if the body cannot be read, and
    /// `GatewayError::Upstream` if the upstream cannot be reached.
    pub async fn forward(
        &self,
        route: &RouteConfig,
        request: Request,
    ) -> Result<Response, GatewayError> {
        let (parts, body) = request.into_parts();
        let url = upstream_url(route, parts.uri.path(), parts.uri.query());

        let body = to_bytes(body, self.body_limit)
            .await
            .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read body: {e}")))?;

        tracing::debug!(route = %route.id, method = %parts.method, url = %url, "Forwarding request");

        let mut upstream = self
            .client
            .request(parts.method, &url)
            .headers(forwarded_headers(&parts.headers));
        if !body.is_empty() {
            upstream = upstream.body(body);
        }

        let upstream = upstream
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("{}: {e}", route.id)))?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if !is_hop_by_hop(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| GatewayError::Server(format!("Failed to build response: {e}")))
    }
}

/// Copy request headers for the upstream call. `Host` and `Content-Length`
/// are recomputed by the client.
fn forwarded_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if is_hop_by_hop(name) || *name == header::HOST || *name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_forwarded_headers_filtered() {
        let mut incoming = HeaderMap::new();
        incoming.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        incoming.insert(header::HOST, HeaderValue::from_static("gateway:4004"));
        incoming.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        incoming.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        incoming.insert("x-request-id", HeaderValue::from_static("abc"));

        let headers = forwarded_headers(&incoming);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
        assert_eq!(headers["x-request-id"], "abc");
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING));
        assert!(is_hop_by_hop(&HeaderName::from_static("keep-alive")));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
    }
}
