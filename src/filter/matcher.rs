/// Checks if a host is a strict subdomain of a wildcard base
///
/// Equivalent to the anchored pattern `^([^.]+\.)+<base>$`: at least one
/// non-empty label must precede the base. The bare base itself does not
/// match. Both arguments are expected to be lowercase.
///
/// # Examples
///
/// ```
/// use article_relay::filter::is_strict_subdomain;
///
/// assert!(is_strict_subdomain("blog.example.com", "example.com"));
/// assert!(is_strict_subdomain("api.v2.example.com", "example.com"));
/// assert!(!is_strict_subdomain("example.com", "example.com"));
/// assert!(!is_strict_subdomain("myexample.com", "example.com"));
/// ```
pub fn is_strict_subdomain(host: &str, base: &str) -> bool {
    if base.is_empty() || host.len() <= base.len() + 1 {
        return false;
    }

    let Some(prefix) = host.strip_suffix(base) else {
        return false;
    };
    let Some(labels) = prefix.strip_suffix('.') else {
        return false;
    };

    !labels.is_empty() && labels.split('.').all(|label| !label.is_empty())
}

/// Checks if a path ends with `.<extension>`
///
/// Both arguments are expected to be lowercase, with trailing slashes
/// already removed from the path.
pub fn has_extension(path: &str, extension: &str) -> bool {
    path.strip_suffix(extension)
        .map(|rest| rest.ends_with('.'))
        .unwrap_or(false)
}
