//! HTTP fetch and response normalization.
//!
//! Every downstream component (validator, extractor) consumes a
//! [`UniformResponse`] rather than a `reqwest::Response` directly, so stages
//! never depend on the HTTP client crate's types.

mod fetch;

pub use fetch::{build_http_client, fetch, FetchOutcome};

use reqwest::header::HeaderMap;

/// Normalized HTTP response shape consumed by the validator and extractor.
#[derive(Debug, Clone)]
pub struct UniformResponse {
    /// Final URL after following redirects.
    pub url: String,
    pub status_code: u16,
    pub headers: HeaderMap,
    /// Body decoded as text: UTF-8 if valid, else ISO-8859-9, else lossy UTF-8.
    pub body: String,
    pub content_bytes: Vec<u8>,
}

impl UniformResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
