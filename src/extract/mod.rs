//! Article extraction for the process stage
//!
//! Raw HTML goes in; a block-quoted Markdown rendering of the article with
//! the configured signature comes out. Pages without usable text yield
//! `None`, which the process stage treats as grounds for eviction.

mod html;
mod links;
mod render;

pub use html::{parse_article, ArticleParts, Block};
pub use links::{images_as_links, replace_blocked_links, unlink_topics, REPLACEMENT_URL};
pub use render::{obfuscate_emails, render_article, RULE, SPECIAL_HEADER};

use crate::pipeline::Extractor;
use tracing::debug;

/// Extracts article text from HTML pages using `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for HtmlExtractor {
    fn extract(
        &self,
        raw_payload: &str,
        signature: &str,
        source_url: Option<&str>,
    ) -> Option<String> {
        let parts = parse_article(raw_payload, source_url);
        let rendered = render_article(&parts, signature);
        if rendered.is_none() {
            debug!(url = source_url.unwrap_or(""), "No article text found");
        }
        rendered
    }
}
