//! Upstream forwarding
//!
//! Replays accepted requests against the configured upstream service and
//! relays its response.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use std::time::Duration;
use thiserror::Error;

/// Largest request body buffered for forwarding (16 MiB)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Headers scoped to a single connection, never forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
];

/// Upstream forwarding error
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request body could not be read
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// Upstream did not answer
    #[error("Upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Relayed response could not be assembled
    #[error("Invalid upstream response: {0}")]
    Response(#[from] axum::http::Error),
}

/// HTTP client bound to one upstream base URL
#[derive(Debug, Clone)]
pub struct Upstream {
    base_url: String,
    client: reqwest::Client,
}

impl Upstream {
    /// Create a forwarder for `base_url` (e.g., "http://app:3000")
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Target URL for an inbound path and query
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// Forward `req` and relay the upstream response
    pub async fn forward(&self, req: Request) -> Result<Response, UpstreamError> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(UpstreamError::Request)?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);
        response_headers.remove(header::CONTENT_LENGTH);

        let bytes = upstream.bytes().await.map_err(UpstreamError::Request)?;

        let mut response = Response::builder().status(status).body(Body::from(bytes))?;
        response.headers_mut().extend(response_headers);
        Ok(response)
    }
}

/// Remove connection-scoped headers, including any named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
