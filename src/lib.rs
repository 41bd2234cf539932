//! Sumi-Tarama: a small-scale, Turkish-content-biased crawl-and-rank engine
//!
//! Four cooperating stages (IP scanner, URL-frontier resolver, page crawler,
//! indexer/analyzer scheduler) share a SQLite-backed corpus and feed a
//! TF-IDF-plus-authority ranker.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod extract;
pub mod indexer;
pub mod net;
pub mod orchestrator;
pub mod ranker;
pub mod stages;
pub mod storage;
pub mod url;
pub mod validate;

use thiserror::Error;

/// Top-level error type reaching `main`.
///
/// Per the error-handling design, only configuration/fatal errors and
/// cooperative cancellation are meant to surface here. Transient network,
/// parse, and validation failures are handled as data within each stage.
#[derive(Debug, Error)]
pub enum SumiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk_size {chunk_size} does not divide 256")]
    InvalidChunkSize { chunk_size: u32 },

    #[error("machine_id {machine_id} must be < total_machines {total_machines}")]
    InvalidMachineId { machine_id: u32, total_machines: u32 },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// URL-specific errors.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),

    #[error("invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("missing host in URL")]
    MissingHost,
}

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, SumiError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations.
pub type UrlResult<T> = std::result::Result<T, UrlError>;

pub use config::Config;
pub use url::base_url;
