//! Search result cache: length-delimited binary encoding of ranked results,
//! and the query front-end that consults it before invoking the ranker.

use crate::ranker::{rank, NormalizationMethod, RankerWeights, SearchResult};
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

const FORMAT_VERSION: u8 = 1;

/// Encodes a ranked result list into the versioned, length-delimited format:
/// one byte format version, 4-byte LE record count, then per record a
/// length-prefixed URL, title, description, and an 8-byte LE score.
pub fn encode(results: &[SearchResult]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&(results.len() as u32).to_le_bytes());

    for r in results {
        write_string(&mut buf, &r.url);
        write_string(&mut buf, r.title.as_deref().unwrap_or(""));
        write_string(&mut buf, r.description.as_deref().unwrap_or(""));
        buf.extend_from_slice(&r.score.to_le_bytes());
    }

    buf
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub score: f64,
}

/// Decodes a payload written by [`encode`]. Returns `None` on a format
/// version mismatch or truncated payload.
pub fn decode(bytes: &[u8]) -> Option<Vec<CachedResult>> {
    let mut cursor = 0usize;
    let version = *bytes.get(cursor)?;
    if version != FORMAT_VERSION {
        return None;
    }
    cursor += 1;

    let count = u32::from_le_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?) as usize;
    cursor += 4;

    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let url = read_string(bytes, &mut cursor)?;
        let title = read_string(bytes, &mut cursor)?;
        let description = read_string(bytes, &mut cursor)?;
        let score = f64::from_le_bytes(bytes.get(cursor..cursor + 8)?.try_into().ok()?);
        cursor += 8;
        results.push(CachedResult {
            url,
            title,
            description,
            score,
        });
    }

    Some(results)
}

fn read_string(bytes: &[u8], cursor: &mut usize) -> Option<String> {
    let len = u32::from_le_bytes(bytes.get(*cursor..*cursor + 4)?.try_into().ok()?) as usize;
    *cursor += 4;
    let s = std::str::from_utf8(bytes.get(*cursor..*cursor + len)?).ok()?.to_string();
    *cursor += len;
    Some(s)
}

/// Normalizes a raw query string: trim, collapse internal whitespace.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Consults the cache first; on a miss, runs the ranker and writes the
/// encoded result back. On a hit older than `retry_after_minutes`, returns
/// the stale cached value but the caller is expected to schedule a
/// background refresh (see [`needs_refresh`]).
pub fn query(
    storage: &mut impl Storage,
    raw_query: &str,
    weights: RankerWeights,
    method: NormalizationMethod,
    k: usize,
) -> crate::Result<Vec<CachedResult>> {
    let query = normalize_query(raw_query);

    if let Some(payload) = storage.get_cached_results(&query)? {
        if let Some(results) = decode(&payload) {
            return Ok(results);
        }
    }

    let (results, _total) = rank(&*storage, &query, weights, method, k)?;
    let payload = encode(&results);
    storage.set_cached_results(&query, &payload)?;
    info!(query = %query, result_count = results.len(), "cache miss, ranked and cached");

    Ok(decode(&payload).unwrap_or_default())
}

/// Whether a cache entry timestamped `cached_at` is stale and should be
/// refreshed in the background.
pub fn needs_refresh(cached_at: &DateTime<Utc>, retry_after_minutes: i64) -> bool {
    Utc::now() - *cached_at > Duration::minutes(retry_after_minutes)
}
