//! HTML parsing for article extraction
//!
//! Picks the main content container and collects its text blocks with
//! inline links rendered as Markdown.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Containers tried in order; the first match holds the article
const CONTAINER_SELECTORS: [&str; 4] = ["article", "main", "[role=main]", "body"];

/// Elements rendered as their own block
const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, blockquote, pre, hr";

/// Block elements whose descendants are rendered inline by the block itself
const BLOCK_TAGS: [&str; 5] = ["p", "li", "blockquote", "pre", "figcaption"];

/// Subtrees that never contain article text
const SKIP_TAGS: [&str; 9] = [
    "script", "style", "nav", "footer", "aside", "header", "form", "noscript", "button",
];

/// One block of article content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem(String),
    Quote(String),
    Preformatted(String),
    Rule,
}

/// The pieces of a page needed to render an article
#[derive(Debug, Clone, Default)]
pub struct ArticleParts {
    pub title: Option<String>,
    pub image: Option<String>,
    pub blocks: Vec<Block>,
}

/// Parses a page into article parts
///
/// `source_url` resolves relative links and image URLs; links that cannot
/// be resolved are rendered as plain text.
pub fn parse_article(html: &str, source_url: Option<&str>) -> ArticleParts {
    let document = Html::parse_document(html);
    let base = source_url.and_then(|u| Url::parse(u).ok());

    let title = meta_content(&document, "og:title")
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| first_text(&document, "title"));
    let image = meta_content(&document, "og:image").and_then(|src| resolve(&src, base.as_ref()));

    let blocks = match find_container(&document) {
        Some(container) => collect_blocks(container, base.as_ref(), title.as_deref()),
        None => Vec::new(),
    };

    ArticleParts {
        title,
        image,
        blocks,
    }
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[property='{}']", property)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn first_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    CONTAINER_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .find(|el| !el.text().all(|t| t.trim().is_empty()))
    })
}

fn collect_blocks(container: ElementRef<'_>, base: Option<&Url>, title: Option<&str>) -> Vec<Block> {
    let selector = match Selector::parse(BLOCK_SELECTOR) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut blocks = Vec::new();
    for element in container.select(&selector) {
        if is_nested_or_hidden(element) {
            continue;
        }

        let name = element.value().name();
        if name == "hr" {
            blocks.push(Block::Rule);
            continue;
        }

        let text = if name == "pre" {
            element.text().collect::<String>().trim_end().to_string()
        } else {
            let mut out = String::new();
            render_inline(element, base, &mut out);
            collapse_lines(&out)
        };
        if text.is_empty() {
            continue;
        }

        let block = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                // The title is rendered separately
                if name == "h1" && title.is_some_and(|t| t == text) {
                    continue;
                }
                let level = name[1..].parse().unwrap_or(2);
                Block::Heading { level, text }
            }
            "li" => Block::ListItem(text),
            "blockquote" => Block::Quote(text),
            "pre" => Block::Preformatted(text),
            _ => Block::Paragraph(text),
        };
        blocks.push(block);
    }

    blocks
}

fn is_nested_or_hidden(element: ElementRef<'_>) -> bool {
    element.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
        let name = ancestor.value().name();
        SKIP_TAGS.contains(&name) || BLOCK_TAGS.contains(&name)
    }) || SKIP_TAGS.contains(&element.value().name())
}

/// Renders the children of `element` as inline Markdown
fn render_inline(element: ElementRef<'_>, base: Option<&Url>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_text(out, text);
            continue;
        }

        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIP_TAGS.contains(&name) {
            continue;
        }

        match name {
            "br" => out.push('\n'),
            "a" => {
                let mut label = String::new();
                render_inline(child, base, &mut label);
                let label = collapse_whitespace(&label);
                let href = child.value().attr("href").and_then(|h| resolve(h, base));
                match (label.is_empty(), href) {
                    (true, _) => {}
                    (false, Some(href)) => out.push_str(&format!("[{}]({})", label, href)),
                    (false, None) => out.push_str(&label),
                }
            }
            "strong" | "b" => wrap_inline(child, base, out, "**"),
            "em" | "i" => wrap_inline(child, base, out, "*"),
            "img" => {
                let alt = collapse_whitespace(child.value().attr("alt").unwrap_or(""));
                let src = child.value().attr("src").and_then(|s| resolve(s, base));
                if let (false, Some(src)) = (alt.is_empty(), src) {
                    out.push_str(&format!("![{}]({})", alt, src));
                }
            }
            _ => render_inline(child, base, out),
        }
    }
}

fn wrap_inline(element: ElementRef<'_>, base: Option<&Url>, out: &mut String, marker: &str) {
    let mut inner = String::new();
    render_inline(element, base, &mut inner);
    let inner = collapse_whitespace(&inner);
    if inner.is_empty() {
        return;
    }
    if out.ends_with(|c: char| !c.is_whitespace()) {
        out.push(' ');
    }
    out.push_str(marker);
    out.push_str(&inner);
    out.push_str(marker);
    out.push(' ');
}

fn push_text(out: &mut String, text: &str) {
    let mut last_space = out.ends_with(char::is_whitespace);
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c);
            last_space = false;
        }
    }
}

/// Resolves a link against the page URL, keeping only http(s) targets
fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace within each line, dropping blank lines
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
