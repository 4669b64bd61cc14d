//! Dispatcher behavior through the downloader trait seam

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bili_space_downloader::downloader::{
    DispatcherConfig, DownloadDispatcher, DownloadStatus, SourceReport, VideoDownloader,
};
use bili_space_downloader::user_agent::UserAgentPolicy;
use bili_space_downloader::VideoRecord;

fn record(bvid: &str) -> VideoRecord {
    VideoRecord {
        bvid: bvid.to_string(),
        aid: 1,
        title: format!("title {bvid}"),
        description: String::new(),
        author: "someone".to_string(),
        mid: 23_318_408,
        created: 1_700_000_000,
        length: "01:00".to_string(),
        pic: String::new(),
        play: 0,
        comment: 0,
        video_review: 0,
    }
}

/// Scripted downloader: per-bvid outcomes, call recording, and optional
/// artifact creation on success so the skip filter sees "downloaded" files.
struct ScriptedDownloader {
    outcomes: HashMap<String, DownloadStatus>,
    calls: Arc<Mutex<Vec<String>>>,
    write_artifacts: bool,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedDownloader {
    fn succeeding(write_artifacts: bool) -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            write_artifacts,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_outcome(mut self, bvid: &str, status: DownloadStatus) -> Self {
        self.outcomes.insert(bvid.to_string(), status);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoDownloader for ScriptedDownloader {
    async fn download(&self, short_id: &str, _user_agent: &str, work_dir: &Path) -> DownloadStatus {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push(short_id.to_string());

        let status = self
            .outcomes
            .get(short_id)
            .cloned()
            .unwrap_or(DownloadStatus::Success);
        if matches!(status, DownloadStatus::Success) && self.write_artifacts {
            std::fs::write(work_dir.join(format!("{short_id}.mp4")), b"video").unwrap();
        }
        status
    }
}

fn dispatcher(downloader: Arc<dyn VideoDownloader>, concurrency: usize) -> DownloadDispatcher {
    DownloadDispatcher::new(
        downloader,
        UserAgentPolicy::new(false),
        DispatcherConfig {
            concurrency,
            check_downloaded: true,
        },
    )
}

#[tokio::test]
async fn one_failing_item_does_not_affect_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let records: Vec<VideoRecord> = (1..=5).map(|i| record(&format!("BV{i}"))).collect();

    let downloader = Arc::new(
        ScriptedDownloader::succeeding(false).with_outcome(
            "BV3",
            DownloadStatus::Failed {
                reason: "exit status 1: boom".to_string(),
            },
        ),
    );
    let mut report = SourceReport::new("up", "42");
    report.found = records.len();

    dispatcher(downloader.clone(), 2)
        .dispatch_all(&records, tmp.path(), &mut report)
        .await;

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 0);
    assert_eq!(report.failed_ids, vec!["BV3"]);
    assert_eq!(downloader.calls().len(), 5, "every sibling still ran");
}

#[tokio::test]
async fn second_run_skips_everything_already_downloaded() {
    let tmp = tempfile::tempdir().unwrap();
    let records: Vec<VideoRecord> = (1..=3).map(|i| record(&format!("BV{i}"))).collect();

    // First run materializes an artifact per record.
    let first = Arc::new(ScriptedDownloader::succeeding(true));
    let mut report = SourceReport::new("up", "42");
    report.found = records.len();
    dispatcher(first.clone(), 2)
        .dispatch_all(&records, tmp.path(), &mut report)
        .await;
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 0);

    // Second run must not invoke the downloader at all.
    let second = Arc::new(ScriptedDownloader::succeeding(true));
    let mut rerun = SourceReport::new("up", "42");
    rerun.found = records.len();
    dispatcher(second.clone(), 2)
        .dispatch_all(&records, tmp.path(), &mut rerun)
        .await;

    assert_eq!(rerun.succeeded, 0);
    assert_eq!(rerun.skipped, records.len());
    assert!(second.calls().is_empty(), "no downloader invocations");
}

#[tokio::test]
async fn timeouts_are_counted_separately_from_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let records = vec![record("BV1"), record("BV2"), record("BV3")];

    let downloader = Arc::new(
        ScriptedDownloader::succeeding(false)
            .with_outcome("BV1", DownloadStatus::TimedOut)
            .with_outcome(
                "BV2",
                DownloadStatus::Failed {
                    reason: "exit status 1".to_string(),
                },
            ),
    );
    let mut report = SourceReport::new("up", "42");
    report.found = records.len();

    dispatcher(downloader, 3)
        .dispatch_all(&records, tmp.path(), &mut report)
        .await;

    assert_eq!(report.timed_out, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed_ids, vec!["BV1", "BV2"], "sorted before emission");
}

#[tokio::test]
async fn concurrency_stays_within_the_pool_size() {
    let tmp = tempfile::tempdir().unwrap();
    let records: Vec<VideoRecord> = (1..=8).map(|i| record(&format!("BV{i}"))).collect();

    let downloader = Arc::new(ScriptedDownloader::succeeding(false));
    let max_in_flight = downloader.max_in_flight.clone();
    let mut report = SourceReport::new("up", "42");
    report.found = records.len();

    dispatcher(downloader, 2)
        .dispatch_all(&records, tmp.path(), &mut report)
        .await;

    assert_eq!(report.succeeded, 8);
    assert!(
        max_in_flight.load(Ordering::SeqCst) <= 2,
        "worker pool must stay bounded"
    );
}

#[tokio::test]
async fn pre_existing_artifacts_are_skipped_up_front() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("BV1 old upload.mp4"), b"video").unwrap();
    let records = vec![record("BV1"), record("BV2")];

    let downloader = Arc::new(ScriptedDownloader::succeeding(false));
    let mut report = SourceReport::new("up", "42");
    report.found = records.len();

    dispatcher(downloader.clone(), 2)
        .dispatch_all(&records, tmp.path(), &mut report)
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(downloader.calls(), vec!["BV2"]);
}
