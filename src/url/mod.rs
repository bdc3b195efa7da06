//! Source URL helpers
//!
//! Host extraction and trusted-domain matching used by the fetcher to decide
//! whether a document's final download attempt may skip certificate checks.

use url::Url;

/// Returns the lowercase host of a URL string, if it parses and has one
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_lowercase()))
}

/// Checks if a host matches a domain pattern
///
/// `"example.com"` matches only that host; `"*.example.com"` matches the bare
/// domain and any subdomain of it.
///
/// ```
/// use pdf_harvester::url::matches_domain;
///
/// assert!(matches_domain("*.nic.in", "ijtr.nic.in"));
/// assert!(matches_domain("*.nic.in", "nic.in"));
/// assert!(!matches_domain("*.nic.in", "panic.in"));
/// ```
pub fn matches_domain(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// Returns true if the URL's host matches any of the trusted domain patterns
pub fn is_trusted(url: &str, trusted_domains: &[String]) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };

    trusted_domains
        .iter()
        .any(|pattern| matches_domain(&pattern.to_lowercase(), &host))
}
