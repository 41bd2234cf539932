//! End-to-end integration tests wiring the URL resolver, page crawler,
//! indexer, analyzer, and ranker together against a mock HTTP server and an
//! in-memory SQLite corpus.

use chrono::Utc;
use sumi_tarama::cache::query;
use sumi_tarama::config::{CrawlerConfig, FailReasonWeights, MaxWorkerConfig};
use sumi_tarama::ranker::{rank, NormalizationMethod, RankerWeights};
use sumi_tarama::stages::{page_crawler, url_resolver, StopFlag};
use sumi_tarama::storage::{FrontierRecord, IpDomainRecord, PageRecord, SqliteStorage, Storage};
use sumi_tarama::{analyzer, indexer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> CrawlerConfig {
    CrawlerConfig {
        parallelism: 1,
        max_workers: MaxWorkerConfig {
            ip_search: 1,
            url_frontier: 1,
            page_search: 1,
        },
        chunk_size: 16,
        req_timeout: 5,
        user_agent: "SumiTaramaTest/1.0".to_string(),
        allowed_protocols: vec!["http".to_string(), "https".to_string()],
        retry_after_minutes: 60,
        fail_reason_weights: FailReasonWeights {
            invalid_status_code: 1.0,
            not_available: 1.0,
            not_turkish: 1.0,
        },
        max_document_length: 100_000,
        ports: vec![80, 443],
        shuffle_chunks: false,
    }
}

fn turkish_page(title: &str, body: &str, links: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .insert_header("content-language", "tr")
        .set_body_string(format!(
            "<html lang=\"tr\"><head><title>{}</title></head><body>{}{}</body></html>",
            title, body, links
        ))
}

/// Full pipeline: a frontier URL resolves to an IP/domain row, the page
/// crawler fetches and stores the page plus its backlinks, the indexer
/// builds the inverted index, and a query against it finds the page.
#[tokio::test]
async fn full_pipeline_resolves_crawls_indexes_and_ranks() {
    let server = MockServer::start().await;
    let root = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(turkish_page(
            "Anasayfa",
            "<p>kahve ve çay hakkında bir sayfa</p>",
            &format!("<a href=\"{}ikinci\">ikinci sayfa</a>", server.uri()),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ikinci"))
        .respond_with(turkish_page("Ikinci Sayfa", "<p>çay ve kahve burada da var</p>", ""))
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage
        .enqueue_frontier_url(&FrontierRecord {
            url: root.clone(),
            domain: "test".to_string(),
            discovered_at: Utc::now().to_rfc3339(),
            resolved_at: None,
            source_page_url: None,
        })
        .unwrap();

    let config = test_config();
    let stop = StopFlag::new();

    url_resolver::run(&mut storage, &config, None, &stop).await.unwrap();
    assert!(storage.get_ip_domain(&server.uri()).unwrap().is_some());

    page_crawler::run(&mut storage, &config, 10, &stop).await.unwrap();
    assert!(storage.get_page(&root).unwrap().is_some());

    let second_url = format!("{}ikinci", server.uri());
    page_crawler::run(&mut storage, &config, 10, &stop).await.unwrap();
    assert!(storage.get_page(&second_url).unwrap().is_some());

    indexer::run(&mut storage, config.max_document_length).unwrap();
    assert!(storage.count_indexed_documents().unwrap() >= 2);

    let (results, total) = rank(&storage, "kahve", RankerWeights::default(), NormalizationMethod::default(), 10).unwrap();
    assert!(total >= 2);
    assert!(results.iter().any(|r| r.url == root));
}

/// A crawled page's external link seeds a Backlink and a Frontier row, and
/// re-crawling the same page replaces rather than duplicates that backlink.
/// An internal (same-domain) link seeds a Page row but never a backlink.
#[tokio::test]
async fn recrawl_replaces_backlinks_without_duplicating() {
    let server = MockServer::start().await;
    let root = format!("{}/", server.uri());
    let external_target = "https://external.example/sayfa";

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(turkish_page(
            "Kok",
            "<p>istanbul ankara izmir</p>",
            &format!(
                "<a href=\"{}\">dis baglanti</a><a href=\"/ic-sayfa\">ic baglanti</a>",
                external_target
            ),
        ))
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage
        .upsert_ip_domain(&IpDomainRecord {
            domain: server.uri(),
            ip: String::new(),
            reserved: false,
            scanned_at: None,
            resolved_host: None,
        })
        .unwrap();
    storage.upsert_page(&PageRecord::seed(&root, &server.uri())).unwrap();

    let config = test_config();
    let stop = StopFlag::new();

    page_crawler::run(&mut storage, &config, 10, &stop).await.unwrap();
    let first_pass = storage.get_all_backlinks().unwrap().len();
    assert_eq!(first_pass, 1, "only the external link should produce a backlink");
    assert_eq!(first_pass, storage.get_backlinks_to(external_target).unwrap().len());
    assert!(
        storage.get_page(&format!("{}/ic-sayfa", server.uri())).unwrap().is_some(),
        "the internal link should still seed a page row"
    );

    storage
        .upsert_page(&PageRecord {
            last_crawled: None,
            ..storage.get_page(&root).unwrap().unwrap()
        })
        .unwrap();
    page_crawler::run(&mut storage, &config, 10, &stop).await.unwrap();

    let second_pass = storage.get_all_backlinks().unwrap().len();
    assert_eq!(second_pass, 1, "backlinks from a re-crawled source must not accumulate");
}

/// Domain-authority scoring: a cross-domain backlink increments the target's
/// score, while the same page untouched by outside links stays at zero.
#[tokio::test]
async fn analyzer_scores_only_cross_domain_backlinks() {
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    for (domain, url, title) in [
        ("https://a.example", "https://a.example/", "A"),
        ("https://b.example", "https://b.example/", "B"),
    ] {
        storage
            .upsert_ip_domain(&IpDomainRecord {
                domain: domain.to_string(),
                ip: String::new(),
                reserved: false,
                scanned_at: None,
                resolved_host: None,
            })
            .unwrap();
        storage
            .upsert_page(&PageRecord {
                page_url: url.to_string(),
                domain: domain.to_string(),
                title: Some(title.to_string()),
                description: None,
                keywords: None,
                status_code: Some(200),
                body: Some(b"<p>makale hakkinda bilgi</p>".to_vec()),
                favicon: None,
                robots_txt: None,
                sitemap: None,
                last_crawled: Some(Utc::now().to_rfc3339()),
            })
            .unwrap();
    }

    // An external site links only to b.example; a same-domain self-link on
    // a.example must not contribute to its own score.
    storage
        .insert_backlink("https://c.example/", "https://b.example/", Some("makale"))
        .unwrap();
    storage
        .insert_backlink("https://a.example/other", "https://a.example/", Some("self"))
        .unwrap();

    let config = test_config();
    indexer::run(&mut storage, config.max_document_length).unwrap();
    analyzer::run(&mut storage).unwrap();

    assert_eq!(storage.get_domain_authority("https://a.example").unwrap(), 0.0);
    assert_eq!(storage.get_domain_authority("https://b.example").unwrap(), 1.0);
}

/// A non-Turkish response is rejected by the validator and never stored.
#[tokio::test]
async fn non_turkish_page_is_not_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .insert_header("content-language", "en")
                .set_body_string("<html lang=\"en\"><head><title>Hello</title></head><body>hello world</body></html>"),
        )
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage
        .upsert_ip_domain(&IpDomainRecord {
            domain: server.uri(),
            ip: String::new(),
            reserved: false,
            scanned_at: None,
            resolved_host: None,
        })
        .unwrap();
    storage
        .upsert_page(&PageRecord::seed(&format!("{}/", server.uri()), &server.uri()))
        .unwrap();

    let config = test_config();
    let stop = StopFlag::new();
    page_crawler::run(&mut storage, &config, 10, &stop).await.unwrap();

    let page = storage.get_page(&format!("{}/", server.uri())).unwrap().unwrap();
    assert!(page.body.is_none(), "non-Turkish page must not have its body stored");
}

/// A repeated query is served from the cache rather than re-ranked.
#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage
        .upsert_page(&PageRecord {
            page_url: "https://a.example/".to_string(),
            domain: "https://a.example".to_string(),
            title: Some("A".to_string()),
            description: None,
            keywords: None,
            status_code: Some(200),
            body: Some(b"<p>deniz deniz deniz</p>".to_vec()),
            favicon: None,
            robots_txt: None,
            sitemap: None,
            last_crawled: Some(Utc::now().to_rfc3339()),
        })
        .unwrap();
    indexer::run(&mut storage, 100_000).unwrap();

    let first = query(&mut storage, "deniz", RankerWeights::default(), NormalizationMethod::default(), 10).unwrap();
    assert_eq!(first.len(), 1);

    // Wipe the index; a cache hit must still return the original result.
    storage.clear_document_index().unwrap();
    let second = query(&mut storage, "  deniz  ", RankerWeights::default(), NormalizationMethod::default(), 10).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].url, first[0].url);
}
