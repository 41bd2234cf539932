//! HTML/document extraction: links, meta tags, favicon/robots/sitemap, and
//! the tagged token stream the indexer consumes.

use crate::net::{fetch, FetchOutcome, UniformResponse};
use crate::url::base_url;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// File extensions that make a link's classification `Invalid` outright.
pub const INVALID_LINK_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "csv", "zip", "rar", "tar", "gz", "7z",
    "mp3", "mp4", "avi", "mkv", "mov", "flv", "wmv", "wav", "ogg", "jpg", "jpeg", "png", "gif",
    "svg", "bmp", "webp", "ico",
];

/// Default per-tag weights used by both the extractor's token stream and the
/// ranker's tag-weight sub-score.
pub fn default_tag_weights() -> HashMap<String, f64> {
    [
        ("title", 2.0),
        ("h1", 1.5),
        ("h2", 1.2),
        ("h3", 1.1),
        ("p", 1.0),
        ("a", 0.8),
        ("span", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub fn tag_weight(weights: &HashMap<String, f64>, tag: &str) -> f64 {
    weights.get(tag).copied().unwrap_or(1.0)
}

/// A two-character transliteration of Turkish-specific characters to ASCII,
/// matching the source extractor's deliberately partial map: `ö`, `ü`, `ç`
/// are intentionally left untouched.
fn transliterate(word: &str) -> String {
    word.chars()
        .map(|c| match c {
            'ı' => 'i',
            'ğ' => 'g',
            'ş' => 's',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Internal,
    External,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub link_type: LinkType,
    pub href: String,
    pub anchor_text: String,
    /// Absolute URL for `Internal`/`External` links.
    pub full_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct MetaTags {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

/// One occurrence of a word in the document's token stream.
#[derive(Debug, Clone)]
pub struct TokenOccurrence {
    pub word: String,
    pub location: usize,
    pub tag: String,
}

/// Extracts all `<a>` links from `response`, classified per §4.4.
pub fn extract_links(response: &UniformResponse) -> Vec<ExtractedLink> {
    let base = match base_url(&response.url) {
        Ok(b) => b,
        Err(_) => return Vec::new(),
    };
    let document = Html::parse_document(&response.body);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim().to_string();
            let anchor_text = el.text().collect::<String>().trim().to_string();
            let link_type = classify_link(&base, &href);
            let full_url = match link_type {
                LinkType::Internal if href.starts_with('/') => format!("{}{}", base, href),
                _ => href.clone(),
            };
            Some(ExtractedLink {
                link_type,
                href,
                anchor_text,
                full_url,
            })
        })
        .collect()
}

fn classify_link(base_url: &str, href: &str) -> LinkType {
    let lower = href.to_lowercase();
    if INVALID_LINK_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
    {
        return LinkType::Invalid;
    }

    let href_base = crate::url::base_url(href).ok();
    if href.contains(base_url) || href_base.as_deref() == Some(base_url) || href.starts_with('/') {
        return LinkType::Internal;
    }
    if href.starts_with("http") {
        return LinkType::External;
    }
    LinkType::Invalid
}

/// Extracts `<title>`, `<meta name="description">`, `<meta name="keywords">`.
pub fn extract_meta_tags(response: &UniformResponse) -> MetaTags {
    let document = Html::parse_document(&response.body);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    });

    let description = meta_content(&document, "description");
    let keywords = meta_content(&document, "keywords").map(|raw| {
        raw.split(',')
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    });

    MetaTags {
        title,
        description,
        keywords,
    }
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{}"]"#, name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string())
}

/// Fetches favicon bytes: `base_url/favicon.ico` first, falling back to a
/// `<link rel="shortcut icon">`/`<link rel="icon">` href.
pub async fn fetch_favicon(client: &Client, response: &UniformResponse) -> Option<Vec<u8>> {
    let base = base_url(&response.url).ok()?;
    if let FetchOutcome::Success(r) = fetch(client, &format!("{}/favicon.ico", base)).await {
        if r.status_code == 200 {
            return Some(r.content_bytes);
        }
    }

    let document = Html::parse_document(&response.body);
    for rel in ["shortcut icon", "icon"] {
        let selector = Selector::parse(&format!(r#"link[rel="{}"]"#, rel)).ok()?;
        if let Some(href) = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("href"))
        {
            let icon_url = resolve(&base, href);
            if let FetchOutcome::Success(r) = fetch(client, &icon_url).await {
                if r.status_code == 200 {
                    return Some(r.content_bytes);
                }
            }
        }
    }
    None
}

/// Fetches `base_url/robots.txt`, requiring status 200 and `text/plain`.
pub async fn fetch_robots_txt(client: &Client, response: &UniformResponse) -> Option<Vec<u8>> {
    let base = base_url(&response.url).ok()?;
    match fetch(client, &format!("{}/robots.txt", base)).await {
        FetchOutcome::Success(r)
            if r.status_code == 200 && r.header("content-type").unwrap_or("").contains("text/plain") =>
        {
            Some(r.content_bytes)
        }
        _ => None,
    }
}

/// Fetches `base_url/sitemap.xml`, requiring status 200 and `application/xml`.
pub async fn fetch_sitemap(client: &Client, response: &UniformResponse) -> Option<Vec<u8>> {
    let base = base_url(&response.url).ok()?;
    match fetch(client, &format!("{}/sitemap.xml", base)).await {
        FetchOutcome::Success(r)
            if r.status_code == 200
                && r.header("content-type").unwrap_or("").contains("application/xml") =>
        {
            Some(r.content_bytes)
        }
        _ => None,
    }
}

fn resolve(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if let Some(stripped) = href.strip_prefix('/') {
        format!("{}/{}", base, stripped)
    } else {
        format!("{}/{}", base, href)
    }
}

/// Walks the configured weighted tags, producing the document's token stream.
///
/// `location` is a single counter incremented once per emitted token across
/// the whole document, not reset per tag or per word.
pub fn tokenize(body: &str, tag_weights: &HashMap<String, f64>, max_document_length: usize) -> Vec<TokenOccurrence> {
    let document = Html::parse_document(body);
    let mut tokens = Vec::new();
    let mut location = 0usize;
    let mut consumed = 0usize;

    let combined = tag_weights.keys().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
    let selector = match Selector::parse(&combined) {
        Ok(s) => s,
        Err(_) => return tokens,
    };

    for el in document.select(&selector) {
        let tag = el.value().name().to_string();
        let text: String = el.text().collect::<String>().to_lowercase().nfc().collect();
        for raw_word in text.split_whitespace() {
            if consumed >= max_document_length {
                return tokens;
            }
            consumed += raw_word.len();

            let cleaned: String = raw_word.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.is_empty() {
                continue;
            }
            let word = transliterate(&cleaned);
            tokens.push(TokenOccurrence {
                word,
                location,
                tag: tag.clone(),
            });
            location += 1;
        }
    }

    tokens
}

/// Aggregates a token stream into a frequency counter and a per-word list of
/// `(location, tag)` occurrences, as the indexer requires.
pub fn aggregate_tokens(
    tokens: &[TokenOccurrence],
) -> (HashMap<String, u64>, HashMap<String, Vec<(usize, String)>>) {
    let mut frequency: HashMap<String, u64> = HashMap::new();
    let mut details: HashMap<String, Vec<(usize, String)>> = HashMap::new();

    for t in tokens {
        *frequency.entry(t.word.clone()).or_insert(0) += 1;
        details
            .entry(t.word.clone())
            .or_default()
            .push((t.location, t.tag.clone()));
    }

    (frequency, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(url: &str, body: &str) -> UniformResponse {
        UniformResponse {
            url: url.to_string(),
            status_code: 200,
            headers: HeaderMap::new(),
            body: body.to_string(),
            content_bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn classifies_internal_absolute_and_relative_links() {
        let r = response(
            "https://example.com/page",
            r#"<html><body><a href="/other">A</a><a href="https://example.com/x">B</a></body></html>"#,
        );
        let links = extract_links(&r);
        assert!(links.iter().all(|l| l.link_type == LinkType::Internal));
        assert_eq!(links[0].full_url, "https://example.com/other");
    }

    #[test]
    fn classifies_external_links() {
        let r = response(
            "https://example.com/page",
            r#"<html><body><a href="https://other.com/x">A</a></body></html>"#,
        );
        let links = extract_links(&r);
        assert_eq!(links[0].link_type, LinkType::External);
    }

    #[test]
    fn classifies_invalid_extension_links() {
        let r = response(
            "https://example.com/page",
            r#"<html><body><a href="/file.pdf">A</a></body></html>"#,
        );
        let links = extract_links(&r);
        assert_eq!(links[0].link_type, LinkType::Invalid);
    }

    #[test]
    fn extracts_meta_tags() {
        let r = response(
            "https://example.com/",
            r#"<html><head><title> Test </title>
            <meta name="description" content="desc">
            <meta name="keywords" content=" a , b ,c"></head></html>"#,
        );
        let meta = extract_meta_tags(&r);
        assert_eq!(meta.title.as_deref(), Some("Test"));
        assert_eq!(meta.description.as_deref(), Some("desc"));
        assert_eq!(meta.keywords.as_deref(), Some("a,b,c"));
    }

    #[test]
    fn tokenizes_with_turkish_transliteration_and_location_counter() {
        let weights = default_tag_weights();
        let tokens = tokenize("<p>Işık şimdi</p>", &weights, 100_000);
        assert_eq!(tokens[0].word, "isik");
        assert_eq!(tokens[1].word, "simdi");
        assert_eq!(tokens[0].location, 0);
        assert_eq!(tokens[1].location, 1);
    }

    #[test]
    fn aggregate_counts_and_locations() {
        let tokens = vec![
            TokenOccurrence { word: "foo".into(), location: 0, tag: "p".into() },
            TokenOccurrence { word: "foo".into(), location: 1, tag: "p".into() },
            TokenOccurrence { word: "bar".into(), location: 2, tag: "p".into() },
        ];
        let (freq, details) = aggregate_tokens(&tokens);
        assert_eq!(freq["foo"], 2);
        assert_eq!(details["foo"].len(), 2);
        assert_eq!(freq["bar"], 1);
    }
}
