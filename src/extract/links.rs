//! Markdown link rewrites applied to rendered articles

use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

/// Stand-in target for links to blocked top-level domains
pub const REPLACEMENT_URL: &str = "https://example.com";

/// Top-level domains whose links are never published
const BLOCKED_TLDS: [&str; 1] = ["ru"];

static ABSOLUTE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)]+)\)").unwrap());

/// `[text](/tema/...)`, optionally absolute and optionally with a title
static TOPIC_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]+)\]\((?:https?://[^/\s)]+)?/tema/[^)\s]*(?:\s+"[^"]*")?\)"#).unwrap()
});

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]+)\]\(([^)]+)\)").unwrap());

fn has_blocked_tld(target: &str) -> bool {
    let Ok(url) = Url::parse(target.split_whitespace().next().unwrap_or("")) else {
        return false;
    };
    url.host_str()
        .map(|host| host.trim_end_matches('.').to_ascii_lowercase())
        .and_then(|host| host.rsplit('.').next().map(str::to_string))
        .is_some_and(|tld| BLOCKED_TLDS.contains(&tld.as_str()))
}

/// Points links to blocked top-level domains at `REPLACEMENT_URL`
pub fn replace_blocked_links(text: &str) -> String {
    ABSOLUTE_LINK
        .replace_all(text, |caps: &Captures| {
            if has_blocked_tld(&caps[2]) {
                format!("[{}]({})", &caps[1], REPLACEMENT_URL)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Topic-index links become their plain label
pub fn unlink_topics(line: &str) -> String {
    TOPIC_LINK.replace_all(line, "$1").into_owned()
}

/// `![alt](src)` becomes `[alt](src)`; inline images do not render in replies
pub fn images_as_links(line: &str) -> String {
    IMAGE.replace_all(line, "[$1]($2)").into_owned()
}
