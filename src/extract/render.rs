//! Markdown rendering of extracted articles
//!
//! The rendered text is a block quote of the article, headed by the title
//! and closed with a rule, followed by the signature outside the quote.

use crate::extract::html::{ArticleParts, Block};
use crate::extract::links::{images_as_links, replace_blocked_links, unlink_topics};

/// Empty headings that push the quote below the reply's header area
pub const SPECIAL_HEADER: &str = "#####&#009;\n\n######&#009;\n\n####&#009;\n\n";

/// Horizontal rule that survives inside a block quote
pub const RULE: &str = "- - - - - -";

const QUOTED_BLANK: &str = ">   ";

/// Renders article parts, or `None` when there is no body text
pub fn render_article(parts: &ArticleParts, signature: &str) -> Option<String> {
    let body = render_body(&parts.blocks);
    if body.is_empty() {
        return None;
    }

    let mut lines: Vec<String> = Vec::new();
    if let Some(title) = parts.title.as_deref() {
        let title = obfuscate_emails(title);
        lines.push(match parts.image.as_deref() {
            Some(image) => format!("> # [{}]({})", title, image),
            None => format!("> # {}", title),
        });
        lines.extend(std::iter::repeat(QUOTED_BLANK.to_string()).take(3));
    }

    let body = replace_blocked_links(&body);
    for line in body.lines() {
        if line.trim().is_empty() {
            lines.push(QUOTED_BLANK.to_string());
        } else {
            let line = images_as_links(&unlink_topics(line));
            lines.push(format!("> {}", line.replace("---", RULE)));
        }
    }

    while lines
        .last()
        .is_some_and(|l| matches!(l.trim(), ">" | "> - - - - - -") || l == QUOTED_BLANK)
    {
        lines.pop();
    }
    lines.push(format!("> {}", RULE));

    Some(format!(
        "{}{}\n\n\n{}\n\n{}",
        SPECIAL_HEADER,
        lines.join("\n"),
        RULE,
        clean_signature(signature)
    ))
}

/// Renders blocks as Markdown separated by blank lines
fn render_body(blocks: &[Block]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut previous_was_item = false;

    for block in blocks {
        let is_item = matches!(block, Block::ListItem(_));
        let rendered = match block {
            Block::Heading { level, text } => {
                format!("{} {}", "#".repeat(usize::from(*level).clamp(1, 6)), text)
            }
            Block::Paragraph(text) => text.clone(),
            Block::ListItem(text) => format!("* {}", text.replace('\n', "\n  ")),
            Block::Quote(text) => text
                .lines()
                .map(|l| format!("> {}", l))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Preformatted(text) => text
                .lines()
                .map(|l| format!("    {}", l))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Rule => RULE.to_string(),
        };

        // Consecutive list items stay together
        if !(is_item && previous_was_item) && !out.is_empty() {
            out.push(String::new());
        }
        out.push(obfuscate_emails(&rendered));
        previous_was_item = is_item;
    }

    out.join("\n").trim().to_string()
}

/// Drops a leading rule from the signature; the rendering adds its own
fn clean_signature(signature: &str) -> String {
    let signature = signature.trim();
    let signature = match signature.split_once('\n') {
        Some((first, rest)) if first.trim() == "---" => rest.trim_start(),
        _ if signature == "---" => "",
        _ => signature,
    };
    replace_blocked_links(signature)
}

/// Rewrites e-mail addresses as `name at domain.tld`
pub fn obfuscate_emails(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (at, _) in text.match_indices('@') {
        let local = bytes[..at]
            .iter()
            .rev()
            .take_while(|&&b| is_local_byte(b))
            .count();
        if local > 0 && is_email_domain(&text[at + 1..]) {
            out.push_str(&text[last..at]);
            out.push_str(" at ");
            last = at + 1;
        }
    }

    out.push_str(&text[last..]);
    out
}

fn is_local_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-')
}

/// True if `rest` starts with `label(.label)*.tld` where the tld has 2+ letters
fn is_email_domain(rest: &str) -> bool {
    let domain: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect();
    let domain = domain.trim_end_matches('.');

    match domain.rsplit_once('.') {
        Some((name, tld)) => {
            !name.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}
