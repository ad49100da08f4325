//! Comment publishing through the Reddit API

use crate::pipeline::{Publisher, ReplyHandle};
use crate::reddit::RedditClient;
use crate::{RelayError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Posts replies as comments and pins them via `distinguish`
pub struct RedditPublisher {
    client: Arc<RedditClient>,
}

impl RedditPublisher {
    pub fn new(client: Arc<RedditClient>) -> Self {
        Self { client }
    }

    async fn comment(&self, parent: &str, text: &str) -> Result<ReplyHandle> {
        let data = self
            .client
            .post_form("api/comment", &[("thing_id", parent), ("text", text)])
            .await?
            .into_result()?;

        data.things
            .into_iter()
            .next()
            .map(|thing| ReplyHandle(thing.data.name))
            .ok_or_else(|| RelayError::Reddit(format!("no comment returned for {}", parent)))
    }
}

/// Accepts bare submission ids as well as fullnames
fn submission_fullname(destination: &str) -> String {
    if destination.starts_with("t3_") {
        destination.to_string()
    } else {
        format!("t3_{}", destination)
    }
}

#[async_trait]
impl Publisher for RedditPublisher {
    async fn post_reply(&self, destination: &str, text: &str) -> Result<ReplyHandle> {
        self.comment(&submission_fullname(destination), text).await
    }

    async fn reply_to_reply(&self, parent: &ReplyHandle, text: &str) -> Result<ReplyHandle> {
        self.comment(&parent.0, text).await
    }

    async fn highlight(&self, reply: &ReplyHandle) -> Result<()> {
        self.client
            .post_form(
                "api/distinguish",
                &[("id", reply.0.as_str()), ("how", "yes"), ("sticky", "true")],
            )
            .await?
            .into_result()?;
        Ok(())
    }
}
