//! Storage module for persisting crawl data.
//!
//! This module handles all database operations shared by the crawl stages:
//! - SQLite database initialization and schema management
//! - IP/domain scan state
//! - URL frontier queueing and resolution
//! - Page, backlink, and domain-authority persistence
//! - The inverted document index and the search result cache

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{
    BacklinkRecord, DocumentIndexRecord, FrontierRecord, IpDomainRecord, PageRecord, Storage,
    StorageError, StorageResult,
};

use crate::SumiError;
use std::path::Path;

/// Opens (or creates) a SQLite-backed storage at `path`.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SumiError> {
    SqliteStorage::new(path)
}

/// Compile-time partitioning extension point. `partition_of` buckets a key
/// into a partition name; the default scheme is not wired into
/// [`SqliteStorage`] and exists for callers that want to shard by domain.
pub trait PartitionScheme {
    fn partition_of(key: &str) -> &'static str;
}

/// Default partition scheme: first ASCII-lowercase letter of the key, or
/// `"default"` if the key has none.
pub struct DefaultPartitionScheme;

impl PartitionScheme for DefaultPartitionScheme {
    fn partition_of(key: &str) -> &'static str {
        const LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";
        match key.to_lowercase().chars().find(|c| c.is_ascii_lowercase()) {
            Some(c) => {
                let idx = LETTERS.find(c).unwrap();
                &LETTERS[idx..idx + 1]
            }
            None => "default",
        }
    }
}
