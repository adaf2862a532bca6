//! Dummy traffic that masks the timing of real requests

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Marks a request as padding so the server can discard it
pub const PADDING_HEADER: &str = "X-Fake-Request";

#[async_trait]
pub trait PaddingRequest: Send + Sync {
    /// Send one padding request, returning the HTTP status
    async fn send(&self) -> Result<u16, String>;
}

/// Padding request sent as an HTTP POST with a random-length body
pub struct HttpPaddingRequest {
    http: reqwest::Client,
    url: Url,
}

impl HttpPaddingRequest {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid padding URL: {}", url))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build padding HTTP client")?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PaddingRequest for HttpPaddingRequest {
    async fn send(&self) -> Result<u16, String> {
        let body = padding_body();
        let response = self
            .http
            .post(self.url.clone())
            .header(PADDING_HEADER, "1")
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        debug!(status, "Padding request answered");
        Ok(status)
    }
}

/// Body of 32 to 287 bytes
fn padding_body() -> Vec<u8> {
    let len = rand::thread_rng().gen_range(32..288);
    vec![b'0'; len]
}
