//! Single-attempt GET fetch with UTF-8 / ISO-8859-9 text decoding fallback.
//!
//! Unlike this lineage's earlier HEAD-then-GET fetcher with manual redirect
//! tracking, the crawl-and-rank pipeline only ever needs one GET per task and
//! tolerates `reqwest`'s own bounded redirect policy, so redirect-loop
//! bookkeeping is not reproduced here.

use super::UniformResponse;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Outcome of a fetch attempt. Transient failures are data, not errors that
/// unwind past the calling stage (see the crate's error-handling design).
#[derive(Debug)]
pub enum FetchOutcome {
    Success(UniformResponse),
    NetworkError(String),
}

/// Builds the shared HTTP client for a crawl stage.
pub fn build_http_client(user_agent: &str, req_timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(req_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limit(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches `url` via GET and normalizes the response.
pub async fn fetch(client: &Client, url: &str) -> FetchOutcome {
    match client.get(url).send().await {
        Ok(response) => {
            let final_url = response.url().to_string();
            let status_code = response.status().as_u16();
            let headers = response.headers().clone();
            match response.bytes().await {
                Ok(bytes) => {
                    let body = decode_text(&bytes);
                    FetchOutcome::Success(UniformResponse {
                        url: final_url,
                        status_code,
                        headers,
                        body,
                        content_bytes: bytes.to_vec(),
                    })
                }
                Err(e) => FetchOutcome::NetworkError(e.to_string()),
            }
        }
        Err(e) => FetchOutcome::NetworkError(e.to_string()),
    }
}

/// Decodes raw bytes as UTF-8; on failure, falls back to ISO-8859-9
/// (Turkish Latin-5), then to lossy UTF-8 as a last resort.
fn decode_text(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (decoded, _, had_errors) = encoding_rs::WINDOWS_1254.decode(bytes);
    if !had_errors {
        return decoded.into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}
