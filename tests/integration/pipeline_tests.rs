//! End-to-end stage tests with in-memory collaborators

use article_relay::config::LoopTiming;
use article_relay::extract::HtmlExtractor;
use article_relay::filter::AdmissionFilter;
use article_relay::pipeline::{
    cancel_on_shutdown_signal, Candidate, CleanupStage, DiscoverStage, FetchStage, ItemSource, PageFetcher, ProcessStage,
    PublishSettings, PublishStage, Publisher, ReplyHandle, Stage, WorkerLoop, CONTINUATION_MARKER,
};
use article_relay::queue::RetryPolicy;
use article_relay::storage::{ItemRef, SqliteStorage, StatName, Storage};
use article_relay::{RelayError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SIGNATURE: &str = "^(I am a bot)";

/// Hands out a fixed batch of candidates once
struct FixedSource {
    batch: Mutex<Option<Vec<Candidate>>>,
}

impl FixedSource {
    fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            batch: Mutex::new(Some(candidates)),
        }
    }
}

#[async_trait]
impl ItemSource for FixedSource {
    async fn poll(&self) -> Result<Vec<Candidate>> {
        Ok(self.batch.lock().unwrap().take().unwrap_or_default())
    }
}

/// Serves pages from a map; unknown URLs fail like a 404
struct MapFetcher {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| RelayError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[derive(Default)]
struct RecordingPublisher {
    replies: Mutex<Vec<(String, String)>>,
    highlighted: Mutex<Vec<String>>,
    fail_highlight: bool,
}

impl RecordingPublisher {
    fn record(&self, parent: &str, text: &str) -> ReplyHandle {
        let mut replies = self.replies.lock().unwrap();
        replies.push((parent.to_string(), text.to_string()));
        ReplyHandle(format!("t1_{}", replies.len()))
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn post_reply(&self, destination: &str, text: &str) -> Result<ReplyHandle> {
        Ok(self.record(destination, text))
    }

    async fn reply_to_reply(&self, parent: &ReplyHandle, text: &str) -> Result<ReplyHandle> {
        Ok(self.record(&parent.0, text))
    }

    async fn highlight(&self, reply: &ReplyHandle) -> Result<()> {
        if self.fail_highlight {
            return Err(RelayError::Reddit("403 Forbidden".to_string()));
        }
        self.highlighted.lock().unwrap().push(reply.0.clone());
        Ok(())
    }
}

fn candidate(external_id: &str, origin: &str, url: &str, age: Duration) -> Candidate {
    Candidate {
        external_id: external_id.to_string(),
        origin: origin.to_string(),
        url: url.to_string(),
        created_at: Utc::now() - age,
    }
}

fn article(title: &str, paragraphs: usize) -> String {
    let body: String = (0..paragraphs)
        .map(|n| format!("<p>Paragraph {} of the story about {}.</p>", n, title))
        .collect();
    format!(
        r#"<html><head><meta property="og:title" content="{}"></head>
        <body><nav>Menu</nav><article>{}</article></body></html>"#,
        title, body
    )
}

fn settings(max_length: usize, highlight: &[&str]) -> PublishSettings {
    PublishSettings {
        max_length,
        chunk_pause: std::time::Duration::ZERO,
        highlight_origins: highlight.iter().map(|s| s.to_string()).collect(),
        coverage_origins: HashSet::new(),
        coverage_trailer: String::new(),
    }
}

fn open_temp() -> (TempDir, Arc<SqliteStorage>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = SqliteStorage::new(&dir.path().join("pipeline.db")).expect("Failed to open");
    (dir, Arc::new(storage))
}

fn stat(storage: &SqliteStorage, name: StatName) -> i64 {
    storage
        .load_stats()
        .unwrap()
        .into_iter()
        .find(|s| s.name == name)
        .map(|s| s.value)
        .unwrap_or(0)
}

#[tokio::test]
async fn test_full_pipeline_cycle() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite.clone();
    let cancel = CancellationToken::new();

    let source = Arc::new(FixedSource::new(vec![
        candidate("t3_good", "WorldNews", "https://paper.example.com/storm", Duration::minutes(5)),
        candidate("t3_banned", "worldnews", "https://cdn.blocked.com/a", Duration::minutes(5)),
        candidate("t3_image", "worldnews", "https://site.com/photo.jpg", Duration::minutes(5)),
        candidate("t3_old", "worldnews", "https://paper.example.com/old", Duration::hours(48)),
        candidate("t3_missing", "worldnews", "https://paper.example.com/gone", Duration::minutes(1)),
    ]));
    let fetcher = Arc::new(MapFetcher {
        pages: HashMap::from([(
            "https://paper.example.com/storm".to_string(),
            article("Storm hits coast", 3),
        )]),
        calls: Mutex::new(Vec::new()),
    });
    let publisher = Arc::new(RecordingPublisher::default());

    let discover = DiscoverStage::new(
        storage.clone(),
        source,
        Arc::new(AdmissionFilter::compile(["*.blocked.com", "*.jpg"])),
        Duration::hours(24),
    );
    let fetch = FetchStage::new(storage.clone(), fetcher.clone(), RetryPolicy::default(), 10);
    let process = ProcessStage::new(storage.clone(), Arc::new(HtmlExtractor::new()), SIGNATURE, 10);
    let publish = PublishStage::new(
        storage.clone(),
        publisher.clone(),
        settings(10_000, &["worldnews"]),
        10,
    );

    discover.run_cycle(&cancel).await.unwrap();
    assert_eq!(stat(&sqlite, StatName::TotalDiscovered), 2);
    assert_eq!(stat(&sqlite, StatName::Skipped), 3);

    fetch.run_cycle(&cancel).await.unwrap();
    assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    // The failed fetch is pushed out, not retried in the same cycle
    fetch.run_cycle(&cancel).await.unwrap();
    assert_eq!(fetcher.calls.lock().unwrap().len(), 2);

    process.run_cycle(&cancel).await.unwrap();
    publish.run_cycle(&cancel).await.unwrap();

    let replies = publisher.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "t3_good");
    assert!(replies[0].1.contains("> # Storm hits coast"));
    assert!(replies[0].1.ends_with(SIGNATURE));
    assert!(!replies[0].1.contains("Menu"));
    // Origin matching ignores case
    assert_eq!(*publisher.highlighted.lock().unwrap(), vec!["t1_1".to_string()]);

    let good = sqlite
        .get_item(&ItemRef::ExternalId("t3_good".to_string()))
        .unwrap()
        .unwrap();
    assert!(good.item.published_at.is_some());
    let missing = sqlite
        .get_item(&ItemRef::ExternalId("t3_missing".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(missing.item.retry_count, 1);
    assert!(missing.item.fetched_at.is_none());

    // Published items are not offered again
    publish.run_cycle(&cancel).await.unwrap();
    assert_eq!(publisher.replies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_long_article_is_published_as_reply_chain() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite.clone();
    let cancel = CancellationToken::new();

    let source = Arc::new(FixedSource::new(vec![candidate(
        "t3_long",
        "news",
        "https://paper.example.com/long",
        Duration::minutes(1),
    )]));
    let fetcher = Arc::new(MapFetcher {
        pages: HashMap::from([(
            "https://paper.example.com/long".to_string(),
            article("Long read", 40),
        )]),
        calls: Mutex::new(Vec::new()),
    });
    let publisher = Arc::new(RecordingPublisher::default());

    DiscoverStage::new(
        storage.clone(),
        source,
        Arc::new(AdmissionFilter::compile(Vec::<String>::new())),
        Duration::hours(24),
    )
    .run_cycle(&cancel)
    .await
    .unwrap();
    FetchStage::new(storage.clone(), fetcher, RetryPolicy::default(), 10)
        .run_cycle(&cancel)
        .await
        .unwrap();
    ProcessStage::new(storage.clone(), Arc::new(HtmlExtractor::new()), SIGNATURE, 10)
        .run_cycle(&cancel)
        .await
        .unwrap();
    PublishStage::new(storage.clone(), publisher.clone(), settings(500, &[]), 10)
        .run_cycle(&cancel)
        .await
        .unwrap();

    let replies = publisher.replies.lock().unwrap().clone();
    assert!(replies.len() > 1);
    assert_eq!(replies[0].0, "t3_long");
    for (n, (parent, text)) in replies.iter().enumerate() {
        assert!(text.len() <= 500);
        if n > 0 {
            assert_eq!(parent, &format!("t1_{}", n));
        }
        if n + 1 < replies.len() {
            assert!(text.ends_with(CONTINUATION_MARKER));
        }
    }
    assert!(publisher.highlighted.lock().unwrap().is_empty());
    assert_eq!(stat(&sqlite, StatName::Published), 1);
}

#[tokio::test]
async fn test_highlight_failure_still_publishes() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite.clone();
    let now = Utc::now();

    let item = candidate("t3_a", "news", "https://paper.example.com/a", Duration::zero());
    sqlite.insert_if_absent(&item.into(), now).unwrap();
    let id = sqlite.lease_for_fetch(now, 1).unwrap()[0].item_id;
    sqlite.complete_fetch(id, "raw", now).unwrap();
    sqlite.complete_process(id, "> quoted text", now).unwrap();

    let publisher = Arc::new(RecordingPublisher {
        fail_highlight: true,
        ..Default::default()
    });
    PublishStage::new(storage, publisher.clone(), settings(10_000, &["news"]), 10)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(publisher.replies.lock().unwrap().len(), 1);
    assert!(sqlite.lease_for_publish(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_unextractable_page_is_evicted() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite.clone();
    let now = Utc::now();

    let item = candidate("t3_empty", "news", "https://paper.example.com/e", Duration::zero());
    sqlite.insert_if_absent(&item.into(), now).unwrap();
    let id = sqlite.lease_for_fetch(now, 1).unwrap()[0].item_id;
    sqlite
        .complete_fetch(id, "<html><body><script>x()</script></body></html>", now)
        .unwrap();

    ProcessStage::new(storage, Arc::new(HtmlExtractor::new()), SIGNATURE, 10)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(sqlite.get_item(&ItemRef::Id(id)).unwrap().is_none());
    assert_eq!(stat(&sqlite, StatName::Evicted), 1);
}

#[tokio::test]
async fn test_cleanup_stage_purges_old_published_items() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite.clone();
    let long_ago = Utc::now() - Duration::hours(72);

    let item = candidate("t3_old", "news", "https://paper.example.com/o", Duration::hours(80));
    sqlite.insert_if_absent(&item.into(), long_ago).unwrap();
    let id = sqlite.lease_for_fetch(long_ago, 1).unwrap()[0].item_id;
    sqlite.complete_fetch(id, "raw", long_ago).unwrap();
    sqlite.complete_process(id, "text", long_ago).unwrap();
    sqlite.complete_publish(id, long_ago).unwrap();

    CleanupStage::new(storage, Duration::hours(24))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(sqlite.get_item(&ItemRef::Id(id)).unwrap().is_none());
    assert_eq!(sqlite.queue_depths(Utc::now()).unwrap().raw_payloads, 0);
}

#[tokio::test]
async fn test_worker_loops_stop_on_cancel() {
    let (_dir, sqlite) = open_temp();
    let storage: Arc<dyn Storage> = sqlite;
    let cancel = CancellationToken::new();

    let stage: Arc<dyn Stage> = Arc::new(CleanupStage::new(storage, Duration::hours(24)));
    let worker = WorkerLoop::new(stage, LoopTiming::from_secs(3600, 3600), cancel.clone());
    let handle = tokio::spawn(worker.run());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let cycles = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
    assert_eq!(cycles, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_cancels_workers() {
    let cancel = CancellationToken::new();
    let listener = cancel_on_shutdown_signal(cancel.clone()).unwrap();

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("failed to run kill");
    assert!(status.success());

    tokio::time::timeout(std::time::Duration::from_secs(5), cancel.cancelled())
        .await
        .expect("SIGTERM did not cancel the token");
    listener.await.unwrap();
}

#[tokio::test]
async fn test_signal_listener_exits_after_cancel() {
    let cancel = CancellationToken::new();
    let listener = cancel_on_shutdown_signal(cancel.clone()).unwrap();

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), listener)
        .await
        .expect("listener kept running")
        .unwrap();
}
