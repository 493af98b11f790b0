//! GRIP publish client.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use listcast_core::Publisher;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;

/// Posts formatted stream events to a GRIP publish endpoint
/// (Fastly Fanout or Pushpin).
#[derive(Debug, Clone)]
pub struct GripPublisher {
    client: reqwest::Client,
    endpoint: String,
    token: Option<(HeaderName, HeaderValue)>,
}

impl GripPublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: None,
        })
    }

    /// Send `token` in `header` with every publish.
    pub fn with_token(mut self, header: &str, token: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(header.as_bytes())
            .with_context(|| format!("invalid publish token header `{header}`"))?;
        let mut value = HeaderValue::from_str(token).context("publish token is not a valid header value")?;
        value.set_sensitive(true);
        self.token = Some((name, value));
        Ok(self)
    }
}

// ============================================================================
// Publish body: {"items":[{"channel":..,"formats":{"http-stream":{"content":..}}}]}
// ============================================================================

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    items: [PublishItem<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PublishItem<'a> {
    channel: &'a str,
    formats: Formats<'a>,
}

#[derive(Debug, Serialize)]
struct Formats<'a> {
    #[serde(rename = "http-stream")]
    http_stream: HttpStream<'a>,
}

#[derive(Debug, Serialize)]
struct HttpStream<'a> {
    content: &'a str,
}

#[async_trait]
impl Publisher for GripPublisher {
    async fn publish(&self, channel: &str, content: &str) -> Result<()> {
        let body = PublishRequest {
            items: [PublishItem {
                channel,
                formats: Formats {
                    http_stream: HttpStream { content },
                },
            }],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some((name, value)) = &self.token {
            request = request.header(name.clone(), value.clone());
        }

        let response = request.send().await.context("sending publish request")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("publish endpoint answered {}: {}", status, body);
        }
        Ok(())
    }
}
