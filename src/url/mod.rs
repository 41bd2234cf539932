//! Minimal URL helpers shared across the crawl stages.
//!
//! The spec's pipeline only ever needs the base URL (`scheme://netloc`) of a
//! page, not the full normalization/classification machinery (tracking-param
//! stripping, domain blacklists) a general-purpose crawler would carry.

use crate::UrlError;
use url::Url;

/// Returns `scheme://netloc` for a URL string, e.g.
/// `https://example.com/page?x=1` -> `https://example.com`.
pub fn base_url(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    Ok(match url.port() {
        Some(port) if !is_default_port(url.scheme(), port) => {
            format!("{}://{}:{}", url.scheme(), host, port)
        }
        _ => format!("{}://{}", url.scheme(), host),
    })
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

/// Returns the last two dot-separated labels of a hostname, e.g.
/// `www.example.co.uk` -> `co.uk`. Used by the backlink analyzer's ad-hoc
/// same-registered-domain filter (no Public Suffix List, per design).
pub fn last_two_labels(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        host.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Extracts the lowercased host from a URL string, if any.
pub fn host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_path_and_query() {
        assert_eq!(
            base_url("https://example.com/page?x=1#y").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn base_url_keeps_non_default_port() {
        assert_eq!(
            base_url("http://example.com:8080/page").unwrap(),
            "http://example.com:8080"
        );
    }

    #[test]
    fn base_url_drops_default_port() {
        assert_eq!(
            base_url("https://example.com:443/page").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn last_two_labels_multi_label_suffix() {
        assert_eq!(last_two_labels("www.example.co.uk"), "co.uk");
        assert_eq!(last_two_labels("a.example.com"), "example.com");
        assert_eq!(last_two_labels("example.com"), "example.com");
    }

    #[test]
    fn missing_host_is_error() {
        assert!(base_url("not a url").is_err());
    }
}
