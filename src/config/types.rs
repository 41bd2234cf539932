use serde::Deserialize;

/// Root configuration document, loaded from `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub system: SystemConfig,
}

/// Crawler behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of parallel IP-scanner workers per machine.
    pub parallelism: u32,

    pub max_workers: MaxWorkerConfig,

    /// Must divide 256; the IPv4 space is partitioned into chunks of this size
    /// per octet.
    pub chunk_size: u32,

    /// Per-request total timeout, in seconds.
    pub req_timeout: u64,

    pub user_agent: String,

    pub allowed_protocols: Vec<String>,

    /// Minutes before a cached query result or a previously-failed URL is
    /// considered eligible for re-fetch.
    pub retry_after_minutes: u32,

    pub fail_reason_weights: FailReasonWeights,

    /// Characters the extractor's token stream is truncated to before
    /// tokenizing.
    pub max_document_length: usize,

    pub ports: Vec<u16>,

    pub shuffle_chunks: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaxWorkerConfig {
    pub ip_search: usize,
    pub url_frontier: usize,
    pub page_search: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailReasonWeights {
    #[serde(rename = "INVALID_STATUS_CODE")]
    pub invalid_status_code: f64,
    #[serde(rename = "NOT_AVAILABLE")]
    pub not_available: f64,
    #[serde(rename = "NOT_TURKISH")]
    pub not_turkish: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub machine_id: u32,
    pub total_machines: u32,
}
