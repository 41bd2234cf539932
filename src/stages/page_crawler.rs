//! Page crawler stage: fetches pages, stores their metadata, and expands
//! the frontier/IP tables from the links it finds.

use crate::config::CrawlerConfig;
use crate::extract::{
    extract_links, extract_meta_tags, fetch_favicon, fetch_robots_txt, fetch_sitemap, ExtractedLink, LinkType, MetaTags,
};
use crate::net::{build_http_client, fetch, FetchOutcome, UniformResponse};
use crate::stages::ip_scanner::default_accepted_status_codes;
use crate::stages::StopFlag;
use crate::storage::{FrontierRecord, PageRecord, Storage};
use crate::url::base_url;
use crate::validate::validate;
use chrono::Utc;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// One task for the crawler: either a known IP/domain row or a page seed.
enum CrawlTask {
    Domain(String),
    Page(String),
}

/// Everything a successful fetch needs to be committed to storage, gathered
/// without touching `Storage` so the fetch phase can run concurrently.
struct FetchedPage {
    response: UniformResponse,
    meta: MetaTags,
    favicon: Option<Vec<u8>>,
    robots_txt: Option<Vec<u8>>,
    sitemap: Option<Vec<u8>>,
    links: Vec<ExtractedLink>,
}

/// Splits `limit` proportionally between IP and page work, reserving at
/// least one slot for whichever side has candidates but rounded to zero.
fn split_batch(limit: usize, n_ip: usize, n_page: usize) -> (usize, usize) {
    if n_ip + n_page == 0 {
        return (0, 0);
    }
    let mut ip_limit = limit * n_ip / (n_ip + n_page);
    let mut page_limit = limit - ip_limit;

    if ip_limit == 0 && n_ip > 0 {
        ip_limit = 1;
        page_limit = page_limit.saturating_sub(1);
    } else if page_limit == 0 && n_page > 0 {
        page_limit = 1;
        ip_limit = ip_limit.saturating_sub(1);
    }

    (ip_limit.min(n_ip), page_limit.min(n_page))
}

/// Runs one crawler batch of up to `limit` tasks. Sleeps 30s and returns if
/// nothing was available to crawl.
///
/// The fetch-extract phase for the whole batch runs concurrently, gated by
/// `Semaphore(max_workers.page_search)`; the resulting storage writes are
/// then applied sequentially, since `Storage` is not safely shared across
/// concurrently-polled tasks.
pub async fn run(storage: &mut impl Storage, config: &CrawlerConfig, limit: usize, stop: &StopFlag) -> crate::Result<()> {
    let mut domains = storage.get_unscanned_domains(limit)?;
    let mut pages = storage.get_unscanned_pages(limit)?;
    domains.shuffle(&mut rand::thread_rng());
    pages.shuffle(&mut rand::thread_rng());

    let (ip_limit, page_limit) = split_batch(limit, domains.len(), pages.len());
    if ip_limit == 0 && page_limit == 0 {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        return Ok(());
    }

    let mut tasks: Vec<CrawlTask> = domains.into_iter().take(ip_limit).map(CrawlTask::Domain).collect();
    tasks.extend(pages.into_iter().take(page_limit).map(CrawlTask::Page));

    let client = build_http_client(&config.user_agent, config.req_timeout)?;
    let accepted_status_codes = default_accepted_status_codes();

    let mut resolved_tasks = Vec::with_capacity(tasks.len());
    for task in tasks {
        if stop.is_stopped() {
            break;
        }

        let (task_url, original_url) = match &task {
            CrawlTask::Domain(domain) => {
                let url = storage
                    .get_ip_domain(domain)?
                    .map(|r| if r.domain.is_empty() { r.ip.clone() } else { r.domain.clone() })
                    .unwrap_or_else(|| domain.clone());
                (url, domain.clone())
            }
            CrawlTask::Page(url) => (url.clone(), url.clone()),
        };
        resolved_tasks.push((task, task_url, original_url));
    }

    let semaphore = Arc::new(Semaphore::new(config.max_workers.page_search.max(1)));
    let mut fetches = JoinSet::new();
    for (task, task_url, original_url) in resolved_tasks {
        let client = client.clone();
        let accepted_status_codes = accepted_status_codes.clone();
        let semaphore = semaphore.clone();
        fetches.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let fetched = fetch_one(&client, &task_url, &accepted_status_codes).await;
            (task, task_url, original_url, fetched)
        });
    }

    while let Some(joined) = fetches.join_next().await {
        let (task, task_url, original_url, fetched) = match joined {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "page crawl task panicked");
                continue;
            }
        };

        if let Some(fetched) = fetched {
            if let Err(e) = apply_fetched_page(storage, &fetched) {
                warn!(url = %task_url, error = %e, "failed to store crawled page");
            }
        }

        match &task {
            CrawlTask::Domain(_) => {
                if let Some(mut record) = storage.get_ip_domain(&original_url)? {
                    record.scanned_at = Some(Utc::now().to_rfc3339());
                    storage.upsert_ip_domain(&record)?;
                }
            }
            CrawlTask::Page(url) => {
                if let Some(mut page) = storage.get_page(url)? {
                    page.last_crawled = Some(Utc::now().to_rfc3339());
                    storage.upsert_page(&page)?;
                }
            }
        }
    }

    info!("page crawler batch complete");
    Ok(())
}

/// Fetches, validates, and extracts everything needed from one URL. Returns
/// `None` on a network error, a non-passing validation, or a task that
/// hasn't resolved to a real URL. No storage access happens here.
async fn fetch_one(client: &Client, url: &str, accepted_status_codes: &[u16]) -> Option<FetchedPage> {
    let response = match fetch(client, url).await {
        FetchOutcome::Success(r) => r,
        FetchOutcome::NetworkError(_) => return None,
    };

    if !validate(&response, accepted_status_codes).is_empty() {
        return None;
    }

    let meta = extract_meta_tags(&response);
    let favicon = fetch_favicon(client, &response).await;
    let robots_txt = fetch_robots_txt(client, &response).await;
    let sitemap = fetch_sitemap(client, &response).await;
    let links = extract_links(&response);

    Some(FetchedPage {
        response,
        meta,
        favicon,
        robots_txt,
        sitemap,
        links,
    })
}

/// Commits one fetched page plus the idempotent backlink replay and
/// frontier/page seeding for the links it carries.
fn apply_fetched_page(storage: &mut impl Storage, fetched: &FetchedPage) -> crate::Result<()> {
    let page_url = fetched.response.url.clone();
    let domain = base_url(&page_url)?;

    let page = PageRecord {
        page_url: page_url.clone(),
        domain: domain.clone(),
        title: fetched.meta.title.clone(),
        description: fetched.meta.description.clone(),
        keywords: fetched.meta.keywords.clone(),
        status_code: Some(fetched.response.status_code),
        body: Some(fetched.response.content_bytes.clone()),
        favicon: fetched.favicon.clone(),
        robots_txt: fetched.robots_txt.clone(),
        sitemap: fetched.sitemap.clone(),
        last_crawled: Some(Utc::now().to_rfc3339()),
    };
    storage.upsert_page(&page)?;

    storage.delete_backlinks_from(&page_url)?;
    for link in &fetched.links {
        match link.link_type {
            LinkType::Internal => {
                if storage.get_page(&link.full_url)?.is_none() {
                    storage.upsert_page(&PageRecord::seed(&link.full_url, &domain))?;
                }
            }
            LinkType::External => {
                if let Ok(link_base) = base_url(&link.full_url) {
                    if storage.get_ip_domain(&link_base)?.is_none() {
                        storage.enqueue_frontier_url(&FrontierRecord {
                            url: link.full_url.clone(),
                            domain: link_base,
                            discovered_at: Utc::now().to_rfc3339(),
                            resolved_at: None,
                            source_page_url: Some(page_url.clone()),
                        })?;
                    }
                }
                storage.insert_backlink(
                    &page_url,
                    &link.full_url,
                    Some(link.anchor_text.as_str()).filter(|s| !s.is_empty()),
                )?;
            }
            LinkType::Invalid => continue,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_batch_is_proportional() {
        assert_eq!(split_batch(10, 5, 5), (5, 5));
        assert_eq!(split_batch(10, 10, 0), (10, 0));
    }

    #[test]
    fn split_batch_reserves_one_slot_for_sparse_side() {
        assert_eq!(split_batch(10, 1, 100), (1, 9));
    }

    #[test]
    fn split_batch_handles_empty_input() {
        assert_eq!(split_batch(10, 0, 0), (0, 0));
    }
}
