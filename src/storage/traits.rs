//! Storage trait and error types for the crawl corpus.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A registered IP/domain record, scanned by the IP scanner stage.
#[derive(Debug, Clone)]
pub struct IpDomainRecord {
    pub domain: String,
    pub ip: String,
    pub reserved: bool,
    pub scanned_at: Option<String>,
    pub resolved_host: Option<String>,
}

/// A URL awaiting resolution by the URL-frontier resolver.
#[derive(Debug, Clone)]
pub struct FrontierRecord {
    pub url: String,
    pub domain: String,
    pub discovered_at: String,
    pub resolved_at: Option<String>,
    pub source_page_url: Option<String>,
}

/// A crawled page, or a seed row awaiting its first crawl.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub page_url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub status_code: Option<u16>,
    pub body: Option<Vec<u8>>,
    pub favicon: Option<Vec<u8>>,
    pub robots_txt: Option<Vec<u8>>,
    pub sitemap: Option<Vec<u8>>,
    pub last_crawled: Option<String>,
}

impl PageRecord {
    /// A seed row: all nullable fields null, awaiting its first crawl.
    pub fn seed(page_url: &str, domain: &str) -> Self {
        Self {
            page_url: page_url.to_string(),
            domain: domain.to_string(),
            title: None,
            description: None,
            keywords: None,
            status_code: None,
            body: None,
            favicon: None,
            robots_txt: None,
            sitemap: None,
            last_crawled: None,
        }
    }
}

/// A discovered backlink between two pages.
#[derive(Debug, Clone)]
pub struct BacklinkRecord {
    pub id: i64,
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: Option<String>,
    pub discovered_at: String,
}

/// One row of the inverted index.
#[derive(Debug, Clone)]
pub struct DocumentIndexRecord {
    pub document_url: String,
    pub word: String,
    pub location: u64,
    pub tag: String,
    pub frequency: u64,
}

/// Storage backend for the crawl corpus and search cache.
///
/// Implementations provide the persistence the IP scanner, URL-frontier
/// resolver, page crawler, indexer, backlink analyzer, and ranker all share.
pub trait Storage {
    // ===== IP / Domain =====

    fn upsert_ip_domain(&mut self, record: &IpDomainRecord) -> StorageResult<()>;
    fn get_ip_domain(&self, domain: &str) -> StorageResult<Option<IpDomainRecord>>;
    fn get_unscanned_domains(&self, limit: usize) -> StorageResult<Vec<String>>;
    fn count_domains(&self) -> StorageResult<u64>;
    fn remove_duplicate_ip_domains(&mut self) -> StorageResult<u64>;

    // ===== URL Frontier =====

    fn enqueue_frontier_url(&mut self, record: &FrontierRecord) -> StorageResult<()>;
    fn get_unresolved_frontier_urls(&self, limit: usize) -> StorageResult<Vec<FrontierRecord>>;
    fn mark_frontier_resolved(&mut self, url: &str) -> StorageResult<()>;
    fn remove_duplicate_frontier_urls(&mut self) -> StorageResult<u64>;

    // ===== Page =====

    fn upsert_page(&mut self, record: &PageRecord) -> StorageResult<()>;
    fn get_page(&self, page_url: &str) -> StorageResult<Option<PageRecord>>;
    fn get_unscanned_pages(&self, limit: usize) -> StorageResult<Vec<String>>;
    fn count_pages(&self) -> StorageResult<u64>;
    fn all_page_urls(&self) -> StorageResult<Vec<String>>;
    fn all_page_urls_with_body(&self) -> StorageResult<Vec<(String, Vec<u8>)>>;

    // ===== Backlink =====

    fn insert_backlink(&mut self, source_url: &str, target_url: &str, anchor_text: Option<&str>) -> StorageResult<()>;
    fn delete_backlinks_from(&mut self, source_url: &str) -> StorageResult<()>;
    fn get_backlinks_to(&self, target_url: &str) -> StorageResult<Vec<BacklinkRecord>>;
    fn get_all_backlinks(&self) -> StorageResult<Vec<BacklinkRecord>>;

    // ===== Domain authority =====

    fn set_domain_authority(&mut self, domain: &str, score: f64) -> StorageResult<()>;
    fn get_domain_authority(&self, domain: &str) -> StorageResult<f64>;
    fn reset_domain_authority(&mut self) -> StorageResult<()>;

    // ===== Document index =====

    fn clear_document_index(&mut self) -> StorageResult<()>;
    fn insert_document_index_rows(&mut self, rows: &[DocumentIndexRecord]) -> StorageResult<()>;
    fn get_document_index_for_word(&self, word: &str) -> StorageResult<Vec<DocumentIndexRecord>>;
    fn count_documents_containing(&self, word: &str) -> StorageResult<u64>;
    fn count_indexed_documents(&self) -> StorageResult<u64>;

    // ===== Search result cache =====

    fn get_cached_results(&self, query: &str) -> StorageResult<Option<Vec<u8>>>;
    fn set_cached_results(&mut self, query: &str, payload: &[u8]) -> StorageResult<()>;
}
