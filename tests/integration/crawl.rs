//! Crawler behavior against a mocked listing API

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bili_space_downloader::config::NetworkConfig;
use bili_space_downloader::fetcher::{ApiClient, CrawlerConfig, FetcherError, SpaceCrawler};
use bili_space_downloader::signing::KeyMaterial;
use bili_space_downloader::TimeWindow;

fn network_config(server: &MockServer) -> NetworkConfig {
    NetworkConfig {
        use_random_ua: false,
        delay_ms: 0,
        max_pages: 100,
        page_size: 2,
        timeout_secs: 5,
        api_base: server.uri(),
        max_retries: 1,
    }
}

fn crawler_config(max_pages: u32) -> CrawlerConfig {
    CrawlerConfig {
        page_size: 2,
        max_pages,
        page_delay: Duration::from_millis(0),
    }
}

fn test_keys() -> KeyMaterial {
    KeyMaterial::new(
        "7cd084941338484aae1ad9425b84077c",
        "4932caff0ff746eab6f01bf08b70ac45",
    )
    .unwrap()
}

fn entry(bvid: &str, created: i64) -> serde_json::Value {
    json!({
        "bvid": bvid,
        "aid": 1,
        "title": format!("title {bvid}"),
        "description": "",
        "author": "someone",
        "mid": 23318408,
        "created": created,
        "length": "01:00",
        "pic": "",
        "play": 10,
        "comment": 1,
        "video_review": 2
    })
}

fn page_response(entries: Vec<serde_json::Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "message": "0",
        "data": { "list": { "vlist": entries } }
    }))
}

async fn mount_page(server: &MockServer, pn: &str, entries: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .and(query_param("pn", pn))
        .respond_with(page_response(entries))
        .mount(server)
        .await;
}

#[tokio::test]
async fn early_stop_on_out_of_window_entry() {
    let server = MockServer::start().await;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    // Page 1: both entries in window. Page 2: first entry older than the
    // window start, which must stop the crawl without touching page 3.
    mount_page(
        &server,
        "1",
        vec![entry("BV1aaa", 1_700_003_500), entry("BV1bbb", 1_700_002_000)],
    )
    .await;
    mount_page(&server, "2", vec![entry("BV1ccc", 1_699_999_000)]).await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(100));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    assert!(outcome.degraded.is_none(), "crawl must complete cleanly");
    assert_eq!(outcome.pages_fetched, 2, "exactly two page fetches");
    assert!(!outcome.truncated);
    let bvids: Vec<&str> = outcome.records.iter().map(|r| r.bvid.as_str()).collect();
    assert_eq!(bvids, vec!["BV1aaa", "BV1bbb"]);

    // One signed GET per page and nothing else.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn entries_newer_than_window_end_are_skipped_without_stopping() {
    let server = MockServer::start().await;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    // A pinned/newer entry precedes the in-window ones; it must be skipped
    // while the scan continues.
    mount_page(
        &server,
        "1",
        vec![entry("BV1new", 1_700_009_999), entry("BV1aaa", 1_700_003_000)],
    )
    .await;
    mount_page(&server, "2", vec![]).await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(100));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    let bvids: Vec<&str> = outcome.records.iter().map(|r| r.bvid.as_str()).collect();
    assert_eq!(bvids, vec!["BV1aaa"]);
    assert_eq!(outcome.pages_fetched, 2, "empty page 2 ends the catalog");
    assert!(!outcome.truncated);
}

#[tokio::test]
async fn page_cap_sets_truncation_flag() {
    let server = MockServer::start().await;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    mount_page(
        &server,
        "1",
        vec![entry("BV1aaa", 1_700_003_500), entry("BV1bbb", 1_700_002_000)],
    )
    .await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(1));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    assert!(outcome.truncated, "page cap without early stop is truncation");
    assert!(outcome.degraded.is_none(), "truncation is non-fatal");
    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test]
async fn api_error_degrades_source_and_keeps_partial_results() {
    let server = MockServer::start().await;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    mount_page(
        &server,
        "1",
        vec![entry("BV1aaa", 1_700_003_500), entry("BV1bbb", 1_700_003_400)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -352,
            "message": "risk control",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(100));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    assert_eq!(outcome.records.len(), 2, "partial results are kept");
    let degraded = outcome.degraded.expect("source must be marked degraded");
    assert!(degraded.contains("-352"), "degraded reason: {degraded}");
}

#[tokio::test]
async fn transport_failure_degrades_after_attempt_budget() {
    let server = MockServer::start().await;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(100));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    assert!(outcome.records.is_empty());
    assert!(outcome.degraded.is_some());
}

#[tokio::test]
async fn retryable_status_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "1", vec![entry("BV1aaa", 1_700_003_500)]).await;
    mount_page(&server, "2", vec![]).await;

    let mut network = network_config(&server);
    network.max_retries = 3;
    let window = TimeWindow::from_timestamps(1_700_000_000, Some(1_700_003_600)).unwrap();

    let client = ApiClient::new(&network, None).unwrap();
    let crawler = SpaceCrawler::new(client, crawler_config(100));
    let outcome = crawler.crawl("23318408", &test_keys(), &window).await;

    assert!(outcome.degraded.is_none(), "retry must recover the page");
    assert_eq!(outcome.records.len(), 1);
}

#[tokio::test]
async fn key_fetch_succeeds_from_nav_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "wbi_img": {
                    "img_url": "https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png",
                    "sub_url": "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"
                }
            }
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let keys = client.fetch_wbi_keys().await.unwrap();
    assert_eq!(keys.img_key, "7cd084941338484aae1ad9425b84077c");
    assert_eq!(keys.sub_key, "4932caff0ff746eab6f01bf08b70ac45");
}

#[tokio::test]
async fn key_fetch_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -101,
            "message": "not logged in",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&network_config(&server), None).unwrap();
    let err = client.fetch_wbi_keys().await.unwrap_err();
    match err {
        FetcherError::Api { code, .. } => assert_eq!(code, -101),
        other => panic!("expected Api error, got {other:?}"),
    }
}
