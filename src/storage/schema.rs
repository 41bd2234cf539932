//! Database schema definitions.
//!
//! This module contains all SQL schema definitions for the crawl corpus.

/// SQL schema for the database.
pub const SCHEMA_SQL: &str = r#"
-- IPs reserved or visited by the IP scanner.
CREATE TABLE IF NOT EXISTS ip_domain (
    domain TEXT PRIMARY KEY,
    ip TEXT NOT NULL,
    reserved INTEGER NOT NULL DEFAULT 0,
    scanned_at TEXT,
    resolved_host TEXT
);

CREATE INDEX IF NOT EXISTS idx_ip_domain_scanned_at ON ip_domain(scanned_at);

-- URLs discovered but not yet crawled.
CREATE TABLE IF NOT EXISTS url_frontier (
    url TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    resolved_at TEXT,
    source_page_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_url_frontier_domain ON url_frontier(domain);
CREATE INDEX IF NOT EXISTS idx_url_frontier_resolved_at ON url_frontier(resolved_at);

-- Crawled pages. `body` is null for seed rows awaiting their first crawl.
CREATE TABLE IF NOT EXISTS page (
    page_url TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    title TEXT,
    description TEXT,
    keywords TEXT,
    status_code INTEGER,
    body BLOB,
    favicon BLOB,
    robots_txt BLOB,
    sitemap BLOB,
    last_crawled TEXT
);

CREATE INDEX IF NOT EXISTS idx_page_domain ON page(domain);
CREATE INDEX IF NOT EXISTS idx_page_last_crawled ON page(last_crawled);

-- Backlinks discovered between pages.
CREATE TABLE IF NOT EXISTS backlink (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL,
    target_url TEXT NOT NULL,
    anchor_text TEXT,
    discovered_at TEXT NOT NULL,
    UNIQUE(source_url, target_url)
);

CREATE INDEX IF NOT EXISTS idx_backlink_target ON backlink(target_url);
CREATE INDEX IF NOT EXISTS idx_backlink_source ON backlink(source_url);

-- Authority score derived from backlink analysis, one row per domain.
CREATE TABLE IF NOT EXISTS domain_authority (
    domain TEXT PRIMARY KEY,
    score REAL NOT NULL DEFAULT 0.0
);

-- Inverted index: word occurrences across crawled documents.
CREATE TABLE IF NOT EXISTS document_index (
    document_url TEXT NOT NULL,
    word TEXT NOT NULL,
    location INTEGER NOT NULL,
    tag TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    PRIMARY KEY (document_url, word, location)
);

CREATE INDEX IF NOT EXISTS idx_document_index_word ON document_index(word);

-- Cached search results, refreshed in the background.
CREATE TABLE IF NOT EXISTS search_result_cache (
    query TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

/// Initializes the database schema.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub fn get_schema_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "ip_domain",
            "url_frontier",
            "page",
            "backlink",
            "domain_authority",
            "document_index",
            "search_result_cache",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                        table
                    ),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }
}
