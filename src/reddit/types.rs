//! Reddit API payloads

use crate::pipeline::Candidate;
use crate::{RelayError, Result};
use chrono::{TimeZone, Utc};
use serde::Deserialize;

/// Response of the OAuth token endpoint
///
/// Reddit answers bad credentials with HTTP 200 and an `error` field.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    pub children: Vec<Thing<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

/// A link submission as returned by `/r/{sub}/new`
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: String,
    /// Fullname (`t3_` + id)
    pub name: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_self: bool,
    pub created_utc: f64,
}

impl Submission {
    /// Link posts become candidates; self posts and posts without a URL do not
    pub fn into_candidate(self) -> Option<Candidate> {
        if self.is_self {
            return None;
        }
        let url = self.url.filter(|u| u.starts_with("http"))?;
        let created_at = Utc.timestamp_opt(self.created_utc as i64, 0).single()?;

        Some(Candidate {
            external_id: self.name,
            origin: self.subreddit,
            url,
            created_at,
        })
    }
}

/// Envelope of `api_type=json` write endpoints
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub json: ApiBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiBody {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    #[serde(default)]
    pub data: Option<ApiData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiData {
    #[serde(default)]
    pub things: Vec<Thing<CreatedThing>>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedThing {
    pub name: String,
}

impl ApiResponse {
    /// Turns reported API errors into `RelayError::Reddit`
    pub fn into_result(self) -> Result<ApiData> {
        if !self.json.errors.is_empty() {
            let message = self
                .json
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RelayError::Reddit(message));
        }
        Ok(self.json.data.unwrap_or_default())
    }
}
