use super::error::TransportError;
use crate::config::Config;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// HTTP seam between request building and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    async fn get(&self, path: &str) -> Result<Value, TransportError>;
}

/// reqwest-backed transport for the inference proxy.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(&config.base_url, config.api_key.clone(), config.timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => {
                tracing::debug!(key_prefix = %key_prefix(key), "adding API key to request");
                request.bearer_auth(key)
            }
            None => {
                tracing::warn!("no API key configured, sending unauthenticated request");
                request
            }
        }
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, TransportError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), "response received");

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "API error");
            return Err(TransportError::Server {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::Other(format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        self.execute(self.client.post(url).json(body)).await
    }

    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        self.execute(self.client.get(url)).await
    }
}

fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}...")
}
