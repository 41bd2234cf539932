//! URL-frontier resolver stage: turns frontier entries into IP/Domain rows.

use crate::config::CrawlerConfig;
use crate::net::{build_http_client, fetch, FetchOutcome};
use crate::stages::ip_scanner::default_accepted_status_codes;
use crate::stages::StopFlag;
use crate::storage::{FrontierRecord, IpDomainRecord, Storage};
use crate::url::base_url;
use crate::validate::validate;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

const DEFAULT_BATCH_LIMIT: usize = 500;

/// The outcome of the concurrent fetch phase for one frontier entry, applied
/// to storage sequentially afterward.
enum ResolveOutcome {
    Dropped,
    Resolved { base: String },
}

/// Runs one resolver pass, pulling up to `limit` unresolved frontier entries.
///
/// The fetch-and-validate phase for the batch runs concurrently, gated by
/// `Semaphore(max_workers.url_frontier)`; the resulting storage writes are
/// then applied sequentially, since `Storage` is not safely shared across
/// concurrently-polled tasks.
pub async fn run(
    storage: &mut impl Storage,
    config: &CrawlerConfig,
    limit: Option<usize>,
    stop: &StopFlag,
) -> crate::Result<()> {
    let client = build_http_client(&config.user_agent, config.req_timeout)?;
    let accepted_status_codes = default_accepted_status_codes();
    let entries = storage.get_unresolved_frontier_urls(limit.unwrap_or(DEFAULT_BATCH_LIMIT))?;

    let semaphore = Arc::new(Semaphore::new(config.max_workers.url_frontier.max(1)));
    let mut fetches = JoinSet::new();

    for entry in entries {
        if stop.is_stopped() {
            break;
        }

        let client = client.clone();
        let accepted_status_codes = accepted_status_codes.clone();
        let semaphore = semaphore.clone();
        fetches.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let outcome = resolve_one(&client, &entry, &accepted_status_codes).await;
            (entry, outcome)
        });
    }

    let mut resolved = 0usize;
    let mut dropped = 0usize;

    while let Some(joined) = fetches.join_next().await {
        let (entry, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "url resolver task panicked");
                continue;
            }
        };

        match outcome {
            ResolveOutcome::Dropped => {
                storage.mark_frontier_resolved(&entry.url)?;
                dropped += 1;
            }
            ResolveOutcome::Resolved { base } => {
                if storage.get_ip_domain(&base)?.is_none() {
                    storage.upsert_ip_domain(&IpDomainRecord {
                        domain: base.clone(),
                        ip: String::new(),
                        reserved: false,
                        scanned_at: Some(Utc::now().to_rfc3339()),
                        resolved_host: None,
                    })?;
                }
                storage.mark_frontier_resolved(&entry.url)?;
                resolved += 1;
            }
        }
    }

    let removed = storage.remove_duplicate_ip_domains()?;
    if removed > 0 {
        info!(removed, "removed duplicate ip/domain rows after resolver pass");
    }

    info!(resolved, dropped, "url-frontier resolver pass complete");
    Ok(())
}

async fn resolve_one(
    client: &reqwest::Client,
    entry: &FrontierRecord,
    accepted_status_codes: &[u16],
) -> ResolveOutcome {
    let base = match base_url(&entry.url) {
        Ok(b) => b,
        Err(_) => return ResolveOutcome::Dropped,
    };

    let response = match fetch(client, &base).await {
        FetchOutcome::Success(r) => r,
        FetchOutcome::NetworkError(_) => return ResolveOutcome::Dropped,
    };

    if !validate(&response, accepted_status_codes).is_empty() {
        return ResolveOutcome::Dropped;
    }

    ResolveOutcome::Resolved { base }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FailReasonWeights, MaxWorkerConfig};
    use crate::storage::{FrontierRecord, SqliteStorage};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            parallelism: 1,
            max_workers: MaxWorkerConfig { ip_search: 1, url_frontier: 2, page_search: 1 },
            chunk_size: 16,
            req_timeout: 5,
            user_agent: "TestBot/1.0".to_string(),
            allowed_protocols: vec!["http".to_string(), "https".to_string()],
            retry_after_minutes: 60,
            fail_reason_weights: FailReasonWeights { invalid_status_code: 1.0, not_available: 1.0, not_turkish: 1.0 },
            max_document_length: 100_000,
            ports: vec![80, 443],
            shuffle_chunks: false,
        }
    }

    #[tokio::test]
    async fn unreachable_frontier_entries_are_removed() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .enqueue_frontier_url(&FrontierRecord {
                url: "http://127.0.0.1:1".to_string(),
                domain: "127.0.0.1".to_string(),
                discovered_at: Utc::now().to_rfc3339(),
                resolved_at: None,
                source_page_url: None,
            })
            .unwrap();

        let stop = StopFlag::new();
        run(&mut storage, &test_config(), None, &stop).await.unwrap();

        assert!(storage.get_unresolved_frontier_urls(10).unwrap().is_empty());
        assert!(storage.get_ip_domain("http://127.0.0.1").unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_fetch_inserts_ip_row_and_resolves_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .insert_header("content-language", "tr")
                    .set_body_string("<html lang=\"tr\">merhaba</html>"),
            )
            .mount(&server)
            .await;

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .enqueue_frontier_url(&FrontierRecord {
                url: format!("{}/", server.uri()),
                domain: "test".to_string(),
                discovered_at: Utc::now().to_rfc3339(),
                resolved_at: None,
                source_page_url: None,
            })
            .unwrap();

        let stop = StopFlag::new();
        run(&mut storage, &test_config(), None, &stop).await.unwrap();

        assert!(storage.get_unresolved_frontier_urls(10).unwrap().is_empty());
        assert!(storage.get_ip_domain(&server.uri()).unwrap().is_some());
    }
}
