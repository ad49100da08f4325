//! HTTP page fetcher
//!
//! This module handles article downloads for the fetch stage, including:
//! - Building HTTP clients with a browser-like user agent
//! - GET requests returning the page body
//! - Error classification (status codes, timeouts, network errors)

use crate::config::FetchConfig;
use crate::pipeline::PageFetcher;
use crate::{RelayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch stage configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches article pages over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Maps a transport error to the crate error, keeping timeouts distinct
fn classify_error(url: &str, error: reqwest::Error) -> RelayError {
    if error.is_timeout() {
        RelayError::Timeout {
            url: url.to_string(),
        }
    } else {
        RelayError::Reqwest(error)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, e))?;
        debug!(url, status = status.as_u16(), content_type = %content_type, bytes = body.len(), "Fetched page");

        Ok(body)
    }
}
