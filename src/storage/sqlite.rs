//! SQLite storage implementation.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    BacklinkRecord, DocumentIndexRecord, FrontierRecord, IpDomainRecord, PageRecord, Storage,
    StorageError, StorageResult,
};
use crate::SumiError;
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// SQLite storage backend.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`, applying the tuned PRAGMAs.
    pub fn new(path: &Path) -> Result<Self, SumiError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Opens an in-memory database, for tests.
    pub fn new_in_memory() -> Result<Self, SumiError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Retries `f` with exponential backoff and jitter when SQLite reports
    /// `SQLITE_BUSY` or `SQLITE_LOCKED`. Any other error is returned
    /// immediately.
    fn with_retry<T>(&self, mut f: impl FnMut(&Connection) -> rusqlite::Result<T>) -> StorageResult<T> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 20;

        let mut attempt = 0;
        loop {
            match f(&self.conn) {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < MAX_ATTEMPTS && is_retryable(&e) => {
                    let backoff = BASE_DELAY_MS * 2u64.pow(attempt);
                    let jitter = rand::thread_rng().gen_range(0..BASE_DELAY_MS);
                    sleep(Duration::from_millis(backoff + jitter));
                    attempt += 1;
                }
                Err(e) => return Err(StorageError::Sqlite(e)),
            }
        }
    }
}

fn is_retryable(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl Storage for SqliteStorage {
    // ===== IP / Domain =====

    fn upsert_ip_domain(&mut self, record: &IpDomainRecord) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO ip_domain (domain, ip, reserved, scanned_at, resolved_host)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(domain) DO UPDATE SET
                     ip = excluded.ip,
                     reserved = excluded.reserved,
                     scanned_at = excluded.scanned_at,
                     resolved_host = excluded.resolved_host",
                params![
                    record.domain,
                    record.ip,
                    record.reserved as i64,
                    record.scanned_at,
                    record.resolved_host,
                ],
            )?;
            Ok(())
        })
    }

    fn get_ip_domain(&self, domain: &str) -> StorageResult<Option<IpDomainRecord>> {
        self.conn
            .query_row(
                "SELECT domain, ip, reserved, scanned_at, resolved_host FROM ip_domain WHERE domain = ?1",
                params![domain],
                |row| {
                    Ok(IpDomainRecord {
                        domain: row.get(0)?,
                        ip: row.get(1)?,
                        reserved: row.get::<_, i64>(2)? != 0,
                        scanned_at: row.get(3)?,
                        resolved_host: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::Sqlite)
    }

    fn get_unscanned_domains(&self, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain FROM ip_domain WHERE scanned_at IS NULL AND reserved = 0 LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    fn count_domains(&self) -> StorageResult<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM ip_domain", [], |row| row.get::<_, i64>(0))? as u64)
    }

    fn remove_duplicate_ip_domains(&mut self) -> StorageResult<u64> {
        self.with_retry(|conn| {
            let removed = conn.execute(
                "DELETE FROM ip_domain WHERE rowid NOT IN (
                    SELECT MIN(rowid) FROM ip_domain GROUP BY domain
                )",
                [],
            )?;
            Ok(removed as u64)
        })
    }

    // ===== URL Frontier =====

    fn enqueue_frontier_url(&mut self, record: &FrontierRecord) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO url_frontier (url, domain, discovered_at, resolved_at, source_page_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.url,
                    record.domain,
                    record.discovered_at,
                    record.resolved_at,
                    record.source_page_url,
                ],
            )?;
            Ok(())
        })
    }

    fn get_unresolved_frontier_urls(&self, limit: usize) -> StorageResult<Vec<FrontierRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, domain, discovered_at, resolved_at, source_page_url
             FROM url_frontier WHERE resolved_at IS NULL LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(FrontierRecord {
                    url: row.get(0)?,
                    domain: row.get(1)?,
                    discovered_at: row.get(2)?,
                    resolved_at: row.get(3)?,
                    source_page_url: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes the frontier entry outright: a resolved (or unresolvable) URL
    /// no longer belongs to the frontier, it belongs to `ip_domain` or
    /// nowhere at all.
    fn mark_frontier_resolved(&mut self, url: &str) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute("DELETE FROM url_frontier WHERE url = ?1", params![url])?;
            Ok(())
        })
    }

    fn remove_duplicate_frontier_urls(&mut self) -> StorageResult<u64> {
        self.with_retry(|conn| {
            let removed = conn.execute(
                "DELETE FROM url_frontier WHERE rowid NOT IN (
                    SELECT MIN(rowid) FROM url_frontier GROUP BY url
                )",
                [],
            )?;
            Ok(removed as u64)
        })
    }

    // ===== Page =====

    fn upsert_page(&mut self, record: &PageRecord) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO page (page_url, domain, title, description, keywords, status_code,
                                   body, favicon, robots_txt, sitemap, last_crawled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(page_url) DO UPDATE SET
                     domain = excluded.domain,
                     title = excluded.title,
                     description = excluded.description,
                     keywords = excluded.keywords,
                     status_code = excluded.status_code,
                     body = excluded.body,
                     favicon = excluded.favicon,
                     robots_txt = excluded.robots_txt,
                     sitemap = excluded.sitemap,
                     last_crawled = excluded.last_crawled",
                params![
                    record.page_url,
                    record.domain,
                    record.title,
                    record.description,
                    record.keywords,
                    record.status_code.map(|c| c as i64),
                    record.body,
                    record.favicon,
                    record.robots_txt,
                    record.sitemap,
                    record.last_crawled,
                ],
            )?;
            Ok(())
        })
    }

    fn get_page(&self, page_url: &str) -> StorageResult<Option<PageRecord>> {
        self.conn
            .query_row(
                "SELECT page_url, domain, title, description, keywords, status_code,
                        body, favicon, robots_txt, sitemap, last_crawled
                 FROM page WHERE page_url = ?1",
                params![page_url],
                |row| {
                    Ok(PageRecord {
                        page_url: row.get(0)?,
                        domain: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        keywords: row.get(4)?,
                        status_code: row.get::<_, Option<i64>>(5)?.map(|c| c as u16),
                        body: row.get(6)?,
                        favicon: row.get(7)?,
                        robots_txt: row.get(8)?,
                        sitemap: row.get(9)?,
                        last_crawled: row.get(10)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::Sqlite)
    }

    fn get_unscanned_pages(&self, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT page_url FROM page WHERE last_crawled IS NULL LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM page", [], |row| row.get::<_, i64>(0))? as u64)
    }

    fn all_page_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT page_url FROM page")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    fn all_page_urls_with_body(&self) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT page_url, body FROM page WHERE body IS NOT NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== Backlink =====

    fn insert_backlink(
        &mut self,
        source_url: &str,
        target_url: &str,
        anchor_text: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO backlink (source_url, target_url, anchor_text, discovered_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![source_url, target_url, anchor_text, now],
            )?;
            Ok(())
        })
    }

    fn delete_backlinks_from(&mut self, source_url: &str) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute("DELETE FROM backlink WHERE source_url = ?1", params![source_url])?;
            Ok(())
        })
    }

    fn get_backlinks_to(&self, target_url: &str) -> StorageResult<Vec<BacklinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_url, target_url, anchor_text, discovered_at
             FROM backlink WHERE target_url = ?1",
        )?;
        let rows = stmt
            .query_map(params![target_url], row_to_backlink)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_all_backlinks(&self) -> StorageResult<Vec<BacklinkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, source_url, target_url, anchor_text, discovered_at FROM backlink")?;
        let rows = stmt
            .query_map([], row_to_backlink)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== Domain authority =====

    fn set_domain_authority(&mut self, domain: &str, score: f64) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO domain_authority (domain, score) VALUES (?1, ?2)
                 ON CONFLICT(domain) DO UPDATE SET score = excluded.score",
                params![domain, score],
            )?;
            Ok(())
        })
    }

    fn get_domain_authority(&self, domain: &str) -> StorageResult<f64> {
        self.conn
            .query_row(
                "SELECT score FROM domain_authority WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()
            .map(|v| v.unwrap_or(0.0))
            .map_err(StorageError::Sqlite)
    }

    fn reset_domain_authority(&mut self) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute("UPDATE domain_authority SET score = 0.0", [])?;
            Ok(())
        })
    }

    // ===== Document index =====

    fn clear_document_index(&mut self) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute("DELETE FROM document_index", [])?;
            Ok(())
        })
    }

    fn insert_document_index_rows(&mut self, rows: &[DocumentIndexRecord]) -> StorageResult<()> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO document_index (document_url, word, location, tag, frequency)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for r in rows {
                    stmt.execute(params![
                        r.document_url,
                        r.word,
                        r.location as i64,
                        r.tag,
                        r.frequency as i64,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn get_document_index_for_word(&self, word: &str) -> StorageResult<Vec<DocumentIndexRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_url, word, location, tag, frequency FROM document_index WHERE word = ?1",
        )?;
        let rows = stmt
            .query_map(params![word], |row| {
                Ok(DocumentIndexRecord {
                    document_url: row.get(0)?,
                    word: row.get(1)?,
                    location: row.get::<_, i64>(2)? as u64,
                    tag: row.get(3)?,
                    frequency: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_documents_containing(&self, word: &str) -> StorageResult<u64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT document_url) FROM document_index WHERE word = ?1",
            params![word],
            |row| row.get::<_, i64>(0),
        )? as u64)
    }

    fn count_indexed_documents(&self) -> StorageResult<u64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT document_url) FROM document_index",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64)
    }

    // ===== Search result cache =====

    fn get_cached_results(&self, query: &str) -> StorageResult<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT payload FROM search_result_cache WHERE query = ?1",
                params![query],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::Sqlite)
    }

    fn set_cached_results(&mut self, query: &str, payload: &[u8]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO search_result_cache (query, payload, cached_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(query) DO UPDATE SET payload = excluded.payload, cached_at = excluded.cached_at",
                params![query, payload, now],
            )?;
            Ok(())
        })
    }
}

fn row_to_backlink(row: &rusqlite::Row) -> rusqlite::Result<BacklinkRecord> {
    Ok(BacklinkRecord {
        id: row.get(0)?,
        source_url: row.get(1)?,
        target_url: row.get(2)?,
        anchor_text: row.get(3)?,
        discovered_at: row.get(4)?,
    })
}
