//! Reddit integration
//!
//! This module handles all traffic with the Reddit API, including:
//! - OAuth password-grant authentication with token caching
//! - Polling subreddits for new link submissions (`SubredditSource`)
//! - Posting, chaining and pinning comments (`RedditPublisher`)

mod publisher;
mod source;
mod types;

pub use publisher::RedditPublisher;
pub use source::{SeenSet, SubredditSource};
pub use types::{ApiData, ApiResponse, Listing, Submission};

use crate::config::RedditConfig;
use crate::{RelayError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use types::TokenResponse;

/// Tokens are renewed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Authenticated Reddit API client
pub struct RedditClient {
    http: Client,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    api_base: String,
    auth_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: Client, config: &RedditConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_base: config.auth_base.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, requesting a new one when needed
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/api/v1/access_token", self.auth_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(&url, response)?;

        let body: TokenResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(RelayError::Reddit(format!("authentication failed: {}", error)));
        }
        let value = body
            .access_token
            .ok_or_else(|| RelayError::Reddit("token response without access_token".into()))?;
        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        info!(user = %self.username, lifetime_secs = lifetime.as_secs(), "Obtained Reddit access token");
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    /// GETs an API path (relative to the API base) and decodes the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        debug!(url = %url, "Reddit GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        Ok(check_status(&url, response)?.json().await?)
    }

    /// POSTs a form to an `api_type=json` endpoint
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        debug!(url = %url, "Reddit POST");

        let mut fields = form.to_vec();
        fields.push(("api_type", "json"));
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .form(&fields)
            .send()
            .await?;
        Ok(check_status(&url, response)?.json().await?)
    }
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RelayError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
