//! Orchestrator: runs the crawl stages as long-lived tasks and serializes
//! the periodic indexer/analyzer passes.

use crate::config::CrawlerConfig;
use crate::stages::ip_scanner::{self, IpRangeDescriptor};
use crate::stages::{page_crawler, url_resolver, StopFlag};
use crate::storage::SqliteStorage;
use crate::{analyzer, indexer};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const PRODUCTIVE_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Which stages to launch, mirroring the CLI's `--ip/--url/--page/--all` flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageSelection {
    pub ip: bool,
    pub url: bool,
    pub page: bool,
}

impl StageSelection {
    pub fn all() -> Self {
        Self {
            ip: true,
            url: true,
            page: true,
        }
    }
}

/// Launches the selected stages plus the indexer/analyzer scheduler, all
/// sharing `stop` for cooperative shutdown. Each stage owns its own
/// connection to `db_path`.
pub async fn run(
    db_path: PathBuf,
    config: CrawlerConfig,
    machine_id: u32,
    total_machines: u32,
    selection: StageSelection,
    indexer_interval_minutes: u64,
    analyzer_interval_minutes: u64,
    stop: StopFlag,
) -> crate::Result<()> {
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    if selection.ip {
        let db_path = db_path.clone();
        let config = config.clone();
        let stop = stop.clone();
        handles.push(tokio::spawn(async move {
            run_ip_scanner_loop(db_path, config, machine_id, total_machines, stop).await;
        }));
    }

    if selection.url {
        let db_path = db_path.clone();
        let config = config.clone();
        let stop = stop.clone();
        handles.push(tokio::spawn(async move {
            run_url_resolver_loop(db_path, config, stop).await;
        }));
    }

    if selection.page {
        let db_path = db_path.clone();
        let config = config.clone();
        let stop = stop.clone();
        handles.push(tokio::spawn(async move {
            run_page_crawler_loop(db_path, config, stop).await;
        }));
    }

    let scheduler_lock = std::sync::Arc::new(Mutex::new(()));
    {
        let db_path = db_path.clone();
        let config = config.clone();
        let stop = stop.clone();
        let lock = scheduler_lock.clone();
        handles.push(tokio::spawn(async move {
            run_indexer_schedule(db_path, config, indexer_interval_minutes, lock, stop).await;
        }));
    }
    {
        let stop = stop.clone();
        let lock = scheduler_lock.clone();
        handles.push(tokio::spawn(async move {
            run_analyzer_schedule(db_path, analyzer_interval_minutes, lock, stop).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn run_ip_scanner_loop(db_path: PathBuf, config: CrawlerConfig, machine_id: u32, total_machines: u32, stop: StopFlag) {
    let descriptor = IpRangeDescriptor {
        a: ip_scanner::OctetRange(1, 223),
        b: ip_scanner::OctetRange(0, 255),
        c: ip_scanner::OctetRange(0, 255),
        d: ip_scanner::OctetRange(0, 255),
    };
    let reserved_blocks = ip_scanner::default_reserved_blocks();

    while !stop.is_stopped() {
        match ip_scanner::run(&db_path, &config, machine_id, total_machines, &descriptor, &reserved_blocks, &stop).await {
            Ok(()) => tokio::time::sleep(PRODUCTIVE_BATCH_DELAY).await,
            Err(e) => {
                warn!(error = %e, "ip scanner pass failed");
                return;
            }
        }
    }
}

async fn run_url_resolver_loop(db_path: PathBuf, config: CrawlerConfig, stop: StopFlag) {
    while !stop.is_stopped() {
        let mut storage = match SqliteStorage::new(&db_path) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "url resolver failed to open storage");
                return;
            }
        };

        match url_resolver::run(&mut storage, &config, None, &stop).await {
            Ok(()) => tokio::time::sleep(PRODUCTIVE_BATCH_DELAY).await,
            Err(e) => {
                warn!(error = %e, "url resolver pass failed");
                return;
            }
        }
    }
}

async fn run_page_crawler_loop(db_path: PathBuf, config: CrawlerConfig, stop: StopFlag) {
    const BATCH_LIMIT: usize = 100;

    while !stop.is_stopped() {
        let mut storage = match SqliteStorage::new(&db_path) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "page crawler failed to open storage");
                return;
            }
        };

        match page_crawler::run(&mut storage, &config, BATCH_LIMIT, &stop).await {
            Ok(()) => tokio::time::sleep(PRODUCTIVE_BATCH_DELAY).await,
            Err(e) => {
                warn!(error = %e, "page crawler pass failed");
                return;
            }
        }
    }
}

async fn run_indexer_schedule(
    db_path: PathBuf,
    config: CrawlerConfig,
    interval_minutes: u64,
    lock: std::sync::Arc<Mutex<()>>,
    stop: StopFlag,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    while !stop.is_stopped() {
        ticker.tick().await;
        let _guard = lock.lock().await;
        let mut storage = match SqliteStorage::new(&db_path) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "indexer failed to open storage");
                continue;
            }
        };
        if let Err(e) = indexer::run(&mut storage, config.max_document_length) {
            warn!(error = %e, "indexer pass failed");
        } else {
            info!("indexer pass complete");
        }
    }
}

async fn run_analyzer_schedule(db_path: PathBuf, interval_minutes: u64, lock: std::sync::Arc<Mutex<()>>, stop: StopFlag) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    while !stop.is_stopped() {
        ticker.tick().await;
        let _guard = lock.lock().await;
        let mut storage = match SqliteStorage::new(&db_path) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "analyzer failed to open storage");
                continue;
            }
        };
        if let Err(e) = analyzer::run(&mut storage) {
            warn!(error = %e, "analyzer pass failed");
        } else {
            info!("analyzer pass complete");
        }
    }
}
