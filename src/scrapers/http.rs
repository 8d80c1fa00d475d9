use crate::error::RenderError;
use crate::scrapers::traits::{PageRequest, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Plain HTTP renderer for pages that need no script execution
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, request: &PageRequest) -> Result<String, RenderError> {
        debug!("Fetching URL: {}", request.url);

        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                RenderError::Transport {
                    url: request.url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status: {}", request.url, status);
            return Err(RenderError::HttpStatus {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let html = response.text().await.map_err(|e| RenderError::Transport {
            url: request.url.clone(),
            message: format!("failed to read response body: {}", e),
        })?;

        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
