//! Admission filter for discovered candidates
//!
//! The filter decides whether a candidate URL may enter the pipeline at all.
//! Patterns come in two syntaxes:
//!
//! - `example.com` bans that exact host (case-insensitive)
//! - `*.example` bans every strict subdomain of `example` AND every path
//!   ending in `.example`; the same text is used for both rules
//!
//! Patterns are compiled once at startup into three independent lookups.
//! Domain patterns are stored in punycode so they compare equal to the
//! hosts `Url` reports.

mod domain;
mod matcher;

pub use domain::{ascii_host, split_url, UrlParts};
pub use matcher::{has_extension, is_strict_subdomain};

use std::collections::HashSet;

/// Precompiled admission filter
#[derive(Debug, Clone, Default)]
pub struct AdmissionFilter {
    exact_domains: HashSet<String>,
    wildcard_bases: Vec<String>,
    banned_extensions: Vec<String>,
}

impl AdmissionFilter {
    /// Compiles a raw pattern list
    ///
    /// # Examples
    ///
    /// ```
    /// use article_relay::filter::AdmissionFilter;
    ///
    /// let filter = AdmissionFilter::compile(["*.blocked.com", "blocked2.com", "*.jpg"]);
    /// assert!(filter.is_banned("https://sub.blocked.com/x"));
    /// assert!(!filter.is_banned("https://blocked.com/x"));
    /// assert!(filter.is_banned("https://site.com/img.JPG"));
    /// ```
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim().to_lowercase();
            if pattern.is_empty() {
                continue;
            }

            if let Some(base) = pattern.strip_prefix("*.") {
                filter.banned_extensions.push(base.to_string());
                filter.wildcard_bases.push(ascii_host(base));
            } else {
                filter.exact_domains.insert(ascii_host(&pattern));
            }
        }

        filter
    }

    /// Returns true if the URL must not enter the pipeline
    ///
    /// Any single positive check bans. URLs that cannot be parsed are never
    /// banned, so malformed input cannot block ingestion.
    pub fn is_banned(&self, url: &str) -> bool {
        let parts = match split_url(url) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(url, error = %e, "Unparseable URL passes the admission filter");
                return false;
            }
        };

        self.is_host_banned(&parts.host) || self.is_path_banned(&parts.path)
    }

    fn is_host_banned(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }

        self.exact_domains.contains(host)
            || self
                .wildcard_bases
                .iter()
                .any(|base| is_strict_subdomain(host, base))
    }

    fn is_path_banned(&self, path: &str) -> bool {
        self.banned_extensions
            .iter()
            .any(|ext| has_extension(path, ext))
    }

    /// Number of compiled rules (exact + wildcard + extension)
    pub fn rule_count(&self) -> usize {
        self.exact_domains.len() + self.wildcard_bases.len() + self.banned_extensions.len()
    }
}
