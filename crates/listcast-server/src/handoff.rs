//! Handing unproxied subscription requests to the fan-out proxy.
//!
//! The proxy answers the client itself and calls back into `/stream/sse`
//! with a `Grip-Sig` header, which the gateway then holds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;
use tracing::debug;

#[async_trait]
pub trait FanoutHandoff: Send + Sync + 'static {
    /// Transfer `request` to the proxy and return what the client should see.
    async fn handoff(&self, request: Request) -> Result<Response>;
}

/// Forwards the raw request to a GRIP proxy and streams its answer back.
#[derive(Debug, Clone)]
pub struct ProxyHandoff {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyHandoff {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // No timeout: the proxied response is a long-lived stream.
        let client = reqwest::Client::builder()
            .build()
            .context("building handoff client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn target(&self, request: &Request) -> String {
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.base_url, path)
    }
}

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Drop headers that only make sense on a single connection.
pub(crate) fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded.remove("keep-alive");
    forwarded.remove(header::CONTENT_LENGTH);
    forwarded
}

#[async_trait]
impl FanoutHandoff for ProxyHandoff {
    async fn handoff(&self, request: Request) -> Result<Response> {
        let url = self.target(&request);
        debug!(url = %url, "handing subscription to fan-out proxy");

        let upstream = self
            .client
            .request(request.method().clone(), &url)
            .headers(end_to_end(request.headers()))
            .send()
            .await
            .with_context(|| format!("reaching fan-out proxy at {url}"))?;

        let status = upstream.status();
        let headers = end_to_end(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
