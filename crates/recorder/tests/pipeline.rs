use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shortlink_common::{ShortlinkError, ShortlinkResult};
use shortlink_geoip::{GeoLookup, Region, RegionResolver};
use shortlink_recorder::{ClickEvent, ClickMetadata, ClickRecorder, ClickStore};
use tokio::sync::Notify;

struct CountingLookup {
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl GeoLookup for CountingLookup {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn lookup(&self, _addr: IpAddr) -> ShortlinkResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok("Canada".to_string())
    }
}

#[derive(Clone, Copy)]
enum StoreBehavior {
    Succeed,
    Fail,
    Hang,
}

struct FakeStore {
    behavior: StoreBehavior,
    attempts: AtomicUsize,
    events: Mutex<Vec<ClickEvent>>,
    release: Option<Notify>,
}

impl FakeStore {
    fn new(behavior: StoreBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            attempts: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            release: None,
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            behavior: StoreBehavior::Succeed,
            attempts: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            release: Some(Notify::new()),
        })
    }

    fn events(&self) -> Vec<ClickEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClickStore for FakeStore {
    async fn append_click(&self, event: &ClickEvent) -> ShortlinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(ref release) = self.release {
            release.notified().await;
        }
        match self.behavior {
            StoreBehavior::Succeed => {
                self.events.lock().unwrap().push(event.clone());
                Ok(())
            }
            StoreBehavior::Fail => Err(ShortlinkError::Store("disk full".into())),
            StoreBehavior::Hang => std::future::pending().await,
        }
    }
}

fn lookup(delay: Duration) -> Arc<CountingLookup> {
    Arc::new(CountingLookup {
        calls: AtomicUsize::new(0),
        delay,
    })
}

fn metadata(source: &str) -> ClickMetadata {
    ClickMetadata {
        source_address: source.to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        referer: "https://news.example/".to_string(),
    }
}

#[tokio::test]
async fn test_loopback_click_skips_lookup() {
    let geo = lookup(Duration::ZERO);
    let store = FakeStore::new(StoreBehavior::Succeed);
    let recorder = ClickRecorder::new(
        RegionResolver::new(geo.clone(), Duration::from_secs(2)),
        store.clone(),
        Duration::from_secs(1),
    );

    recorder.record_click(42, metadata("127.0.0.1")).await.unwrap();

    assert_eq!(geo.calls.load(Ordering::SeqCst), 0);
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subject_id, 42);
    assert_eq!(events[0].resolved_region, Region::LocalTesting);
    assert_eq!(events[0].user_agent, "Mozilla/5.0");
    assert_eq!(events[0].referer, "https://news.example/");
}

#[tokio::test]
async fn test_public_click_is_resolved_before_write() {
    let geo = lookup(Duration::from_millis(10));
    let store = FakeStore::new(StoreBehavior::Succeed);
    let recorder = ClickRecorder::new(
        RegionResolver::new(geo.clone(), Duration::from_secs(2)),
        store.clone(),
        Duration::from_secs(1),
    );

    recorder.record_click(7, metadata("8.8.8.8")).await.unwrap();

    assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.events()[0].resolved_region, Region::Resolved("Canada".into()));
    assert_eq!(recorder.metrics().recorded.get(), 1);
    assert_eq!(recorder.metrics().unresolved.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_timeout_still_persists() {
    let geo = lookup(Duration::from_secs(30));
    let store = FakeStore::new(StoreBehavior::Succeed);
    let recorder = ClickRecorder::new(
        RegionResolver::new(geo.clone(), Duration::from_secs(2)),
        store.clone(),
        Duration::from_secs(1),
    );

    recorder.record_click(3, metadata("8.8.8.8")).await.unwrap();

    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].resolved_region, Region::Unknown);
    assert_eq!(recorder.metrics().unresolved.get(), 1);
    assert_eq!(recorder.metrics().recorded.get(), 1);
}

#[tokio::test]
async fn test_failed_write_is_attempted_once() {
    let store = FakeStore::new(StoreBehavior::Fail);
    let recorder = ClickRecorder::new(RegionResolver::disabled(), store.clone(), Duration::from_secs(1));

    recorder.record_click(9, metadata("10.0.0.8")).await.unwrap();
    // Give any stray retry a chance to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.metrics().failed.get(), 1);
    assert_eq!(recorder.metrics().recorded.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hung_write_is_abandoned() {
    let store = FakeStore::new(StoreBehavior::Hang);
    let recorder = ClickRecorder::new(RegionResolver::disabled(), store.clone(), Duration::from_secs(1));

    tokio::time::timeout(Duration::from_secs(5), recorder.record_click(1, metadata("::1")))
        .await
        .expect("recording unit should finish after the write timeout")
        .unwrap();

    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.metrics().failed.get(), 1);
}

#[tokio::test]
async fn test_record_returns_before_work_completes() {
    let store = FakeStore::gated();
    let recorder = ClickRecorder::new(RegionResolver::disabled(), store.clone(), Duration::from_secs(5));

    let handle = recorder.record(ClickEvent::capture(11, metadata("192.168.1.20")));
    // The caller is already free; nothing has been written.
    assert!(store.events().is_empty());

    store.release.as_ref().unwrap().notify_one();
    handle.await.unwrap();

    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].resolved_region, Region::LocalNetwork);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_clicks_each_written_once() {
    let store = FakeStore::new(StoreBehavior::Succeed);
    let recorder = ClickRecorder::new(
        RegionResolver::new(lookup(Duration::from_millis(5)), Duration::from_secs(2)),
        store.clone(),
        Duration::from_secs(1),
    );

    let handles: Vec<_> = (0..100u64)
        .map(|i| recorder.record_click(i, metadata(if i % 2 == 0 { "8.8.8.8" } else { "127.0.0.1" })))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut ids: Vec<u64> = store.events().iter().map(|e| e.subject_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..100).collect::<Vec<_>>());
    assert_eq!(store.attempts.load(Ordering::SeqCst), 100);
}
