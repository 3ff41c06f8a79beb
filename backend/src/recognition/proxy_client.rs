use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;
use url::Url;

use super::models::{ProxyRequest, ProxyResponse};
use crate::config::AppConfig;

pub const SECRET_HEADER: &str = "X-Proxy-Secret";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Proxy responded with status {0}")]
    Status(u16),
    #[error("{}", transport_cause(.0))]
    Transport(#[from] reqwest::Error),
    #[error("Malformed proxy response: {0}")]
    Malformed(String),
}

/// Describes a transport failure by its kind and source chain. The
/// top-level reqwest message only repeats the request URL.
pub fn transport_cause(error: &reqwest::Error) -> String {
    let label = if error.is_timeout() {
        "timed out waiting for the proxy"
    } else if error.is_connect() {
        "cannot connect to the proxy"
    } else if error.is_body() || error.is_decode() {
        "cannot read the proxy response"
    } else if error.is_builder() {
        "cannot build the proxy request"
    } else {
        "proxy request failed"
    };

    let mut parts = vec![label.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

/// Sends one recognition request per call to the model proxy. No retries.
#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    proxy_url: Url,
    proxy_secret: String,
    gemini_key: String,
    model: String,
}

impl ProxyClient {
    pub fn new(
        proxy_url: Url,
        proxy_secret: String,
        gemini_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            proxy_url,
            proxy_secret,
            gemini_key,
            model,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProxyError> {
        Self::new(
            config.proxy_url.clone(),
            config.proxy_secret.clone(),
            config.gemini_key.clone(),
            config.model.clone(),
            config.request_timeout,
        )
    }

    pub async fn recognize(&self, data_uri: String) -> Result<String, ProxyError> {
        let payload = ProxyRequest::for_image(&self.gemini_key, &self.model, data_uri);

        let response = self
            .http
            .post(self.proxy_url.clone())
            .header(SECRET_HEADER, &self.proxy_secret)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Proxy {} returned status {}", self.proxy_url, status);
            return Err(ProxyError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: ProxyResponse =
            serde_json::from_slice(&body).map_err(|e| ProxyError::Malformed(e.to_string()))?;
        parsed
            .into_text()
            .ok_or_else(|| ProxyError::Malformed("response has no choices".to_string()))
    }
}
