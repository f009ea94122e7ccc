//! Fire-and-forget click recording.
//!
//! [`ClickRecorder::record`] hands a captured [`ClickEvent`] to a detached
//! Tokio task and returns at once. The task resolves the event's region,
//! then makes exactly one bounded attempt to write it to the [`ClickStore`].
//! Failures are logged and counted, never retried and never reported back:
//! the stream is for aggregate analytics, not an audit trail.

pub mod event;
pub mod metrics;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use shortlink_geoip::RegionResolver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use event::{ClickEvent, ClickMetadata};
pub use metrics::RecorderMetrics;
pub use store::{ClickStore, JsonLinesStore};

/// Launches one detached recording unit per click.
///
/// Cheaply cloneable; clones share the resolver, store and metrics.
#[derive(Clone)]
pub struct ClickRecorder {
    inner: Arc<RecorderInner>,
}

struct RecorderInner {
    resolver: RegionResolver,
    store: Arc<dyn ClickStore>,
    write_timeout: Duration,
    metrics: RecorderMetrics,
}

impl ClickRecorder {
    pub fn new(resolver: RegionResolver, store: Arc<dyn ClickStore>, write_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                resolver,
                store,
                write_timeout,
                metrics: RecorderMetrics::new(),
            }),
        }
    }

    pub fn metrics(&self) -> &RecorderMetrics {
        &self.inner.metrics
    }

    /// Record `event` in the background.
    ///
    /// Must be called from within a Tokio runtime. The returned handle may be
    /// dropped; dropping it does not cancel the unit.
    pub fn record(&self, event: ClickEvent) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.process(event).await })
    }

    /// Capture an event for `subject_id` from `metadata` and record it.
    pub fn record_click(&self, subject_id: u64, metadata: ClickMetadata) -> JoinHandle<()> {
        self.record(ClickEvent::capture(subject_id, metadata))
    }
}

impl RecorderInner {
    async fn process(&self, mut event: ClickEvent) {
        event.resolved_region = self.resolver.resolve(&event.source_address).await;
        if event.resolved_region.is_unknown() {
            self.metrics.unresolved.inc();
        }

        match tokio::time::timeout(self.write_timeout, self.store.append_click(&event)).await {
            Ok(Ok(())) => {
                self.metrics.recorded.inc();
                debug!(
                    click_id = %event.id,
                    subject_id = event.subject_id,
                    region = %event.resolved_region,
                    "click recorded"
                );
            }
            Ok(Err(e)) => {
                self.metrics.failed.inc();
                warn!(click_id = %event.id, subject_id = event.subject_id, error = %e, "failed to record click");
            }
            Err(_) => {
                self.metrics.failed.inc();
                warn!(
                    click_id = %event.id,
                    subject_id = event.subject_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "click store write timed out"
                );
            }
        }
    }
}
