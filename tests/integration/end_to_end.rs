//! Full run against a mocked API and a scripted downloader

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bili_space_downloader::config::AppConfig;
use bili_space_downloader::downloader::{DownloadStatus, VideoDownloader};
use bili_space_downloader::orchestrator::Orchestrator;
use bili_space_downloader::snapshot;

struct RecordingDownloader {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl VideoDownloader for RecordingDownloader {
    async fn download(&self, short_id: &str, _user_agent: &str, work_dir: &Path) -> DownloadStatus {
        self.calls.lock().unwrap().push(short_id.to_string());
        std::fs::write(work_dir.join(format!("{short_id}.mp4")), b"video").unwrap();
        DownloadStatus::Success
    }
}

async fn mount_api(server: &MockServer) {
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
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "list": { "vlist": [
                {
                    "bvid": "BV1aaa", "aid": 1, "title": "newest", "description": "",
                    "author": "someone", "mid": 23318408, "created": 1700003500,
                    "length": "01:00", "pic": "", "play": 10, "comment": 1, "video_review": 2
                },
                {
                    "bvid": "BV1bbb", "aid": 2, "title": "older", "description": "",
                    "author": "someone", "mid": 23318408, "created": 1700002000,
                    "length": "02:00", "pic": "", "play": 20, "comment": 2, "video_review": 4
                }
            ] } }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "list": { "vlist": [
                {
                    "bvid": "BV1ccc", "aid": 3, "title": "too old", "description": "",
                    "author": "someone", "mid": 23318408, "created": 1699999000,
                    "length": "03:00", "pic": "", "play": 30, "comment": 3, "video_review": 6
                }
            ] } }
        })))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, root: &Path) -> AppConfig {
    let yaml = format!(
        r#"
base:
  mode: single
  data_dir: "{data}"
  download_dir: "{downloads}"
auth:
  cookie: "SESSDATA=test"
uploader:
  single_mid: "23318408"
time:
  start_timestamp: 1700000000
  end_timestamp: 1700003600
network:
  use_random_ua: false
  delay_ms: 0
  page_size: 2
  max_pages: 100
  timeout_secs: 5
  max_retries: 1
  api_base: "{api}"
data:
  format: csv
"#,
        data = root.join("data").display(),
        downloads = root.join("downloads").display(),
        api = server.uri(),
    );
    AppConfig::from_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn run_crawls_snapshots_and_downloads() {
    let server = MockServer::start().await;
    mount_api(&server).await;
    let tmp = tempfile::tempdir().unwrap();

    let config = test_config(&server, tmp.path());
    config.validate().unwrap();
    let snapshot_path = config.snapshot_path("23318408");

    let calls = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = Orchestrator::new(config)
        .unwrap()
        .with_downloader(Arc::new(RecordingDownloader {
            calls: calls.clone(),
        }));

    let summary = orchestrator.run().await;

    assert_eq!(summary.reports.len(), 1);
    let report = &summary.reports[0];
    assert!(summary.is_clean(), "report: {report}");
    assert_eq!(report.found, 2, "page 2 entry is outside the window");
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 0);

    // Snapshot was persisted before dispatch and holds both records.
    let rows = snapshot::csv::read_all(&snapshot_path).unwrap();
    assert_eq!(rows.len(), 2);

    // Both downloads went to the per-uploader folder.
    let mut called = calls.lock().unwrap().clone();
    called.sort();
    assert_eq!(called, vec!["BV1aaa", "BV1bbb"]);
    let folder = tmp.path().join("downloads").join("Bili-UP-23318408");
    assert!(folder.join("BV1aaa.mp4").exists());
    assert!(folder.join("BV1bbb.mp4").exists());
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_api(&server).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&server, tmp.path());

    let first = Orchestrator::new(config.clone())
        .unwrap()
        .with_downloader(Arc::new(RecordingDownloader {
            calls: Arc::new(Mutex::new(Vec::new())),
        }));
    assert!(first.run().await.is_clean());

    let calls = Arc::new(Mutex::new(Vec::new()));
    let second = Orchestrator::new(config)
        .unwrap()
        .with_downloader(Arc::new(RecordingDownloader {
            calls: calls.clone(),
        }));
    let summary = second.run().await;

    let report = &summary.reports[0];
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.skipped, 2);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn key_fetch_failure_aborts_source_with_zero_records() {
    let server = MockServer::start().await;
    // Nav endpoint rejects; listing pages are never reached.
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -101, "message": "not logged in", "data": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&server, tmp.path());
    let orchestrator = Orchestrator::new(config).unwrap();

    let summary = orchestrator.run().await;
    let report = &summary.reports[0];
    assert_eq!(report.found, 0);
    assert!(report
        .degraded
        .as_deref()
        .unwrap_or_default()
        .contains("key fetch failed"));
}
