use prometheus::{IntCounter, Opts, Registry};

/// Counters describing what happened to detached click recordings.
#[derive(Clone)]
pub struct RecorderMetrics {
    pub recorded: IntCounter,
    pub failed: IntCounter,
    pub unresolved: IntCounter,
}

impl RecorderMetrics {
    pub fn new() -> Self {
        let recorded = IntCounter::with_opts(Opts::new(
            "shortlink_clicks_recorded_total",
            "Clicks written to the click store",
        ))
        .expect("failed to create clicks_recorded counter");

        let failed = IntCounter::with_opts(Opts::new(
            "shortlink_clicks_failed_total",
            "Clicks dropped because the store write failed or timed out",
        ))
        .expect("failed to create clicks_failed counter");

        let unresolved = IntCounter::with_opts(Opts::new(
            "shortlink_clicks_unresolved_total",
            "Clicks whose region could not be resolved",
        ))
        .expect("failed to create clicks_unresolved counter");

        Self {
            recorded,
            failed,
            unresolved,
        }
    }

    /// Register all counters with `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.recorded.clone()))?;
        registry.register(Box::new(self.failed.clone()))?;
        registry.register(Box::new(self.unresolved.clone()))?;
        Ok(())
    }
}

impl Default for RecorderMetrics {
    fn default() -> Self {
        Self::new()
    }
}
