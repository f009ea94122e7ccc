use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use prometheus::{IntCounter, IntGauge, Opts, Registry};
use shortlink_common::{AppConfig, LinkConfig};
use shortlink_geoip::RegionResolver;
use shortlink_rate_limit::AdmissionGate;
use shortlink_recorder::{ClickRecorder, JsonLinesStore};
use tracing::{info, warn};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Central application state: admission gate, click recorder, links, metrics.
pub struct AppState {
    pub gate: Option<AdmissionGate>,
    pub recorder: Option<ClickRecorder>,
    pub links: HashMap<String, LinkConfig>,
    pub trust_proxy_headers: bool,
    pub metrics: ServerMetrics,
    pub start_time: Instant,
}

/// Prometheus metrics exposed at `/metrics`.
pub struct ServerMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_rate_limited: IntCounter,
    pub redirects_total: IntCounter,
    pub ledger_entries: IntGauge,
}

impl ServerMetrics {
    /// Create all counters and register them against a fresh registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "shortlink_requests_total",
            "Total redirect requests received",
        ))
        .expect("failed to create requests_total counter");

        let requests_rate_limited = IntCounter::with_opts(Opts::new(
            "shortlink_requests_rate_limited_total",
            "Requests rejected by the admission gate",
        ))
        .expect("failed to create requests_rate_limited counter");

        let redirects_total = IntCounter::with_opts(Opts::new(
            "shortlink_redirects_total",
            "Redirects served for known links",
        ))
        .expect("failed to create redirects_total counter");

        let ledger_entries = IntGauge::with_opts(Opts::new(
            "shortlink_ledger_entries",
            "Client identities currently tracked by the admission gate",
        ))
        .expect("failed to create ledger_entries gauge");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("failed to register requests_total");
        registry
            .register(Box::new(requests_rate_limited.clone()))
            .expect("failed to register requests_rate_limited");
        registry
            .register(Box::new(redirects_total.clone()))
            .expect("failed to register redirects_total");
        registry
            .register(Box::new(ledger_entries.clone()))
            .expect("failed to register ledger_entries");

        Self {
            registry,
            requests_total,
            requests_rate_limited,
            redirects_total,
            ledger_entries,
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Assemble state from configuration and an already-built recorder.
    pub fn new(config: &AppConfig, recorder: Option<ClickRecorder>) -> Self {
        let gate = if config.rate_limit.enabled {
            Some(AdmissionGate::from_config(&config.rate_limit))
        } else {
            info!("rate limiting disabled");
            None
        };

        let metrics = ServerMetrics::new();
        if let Some(ref recorder) = recorder {
            if let Err(e) = recorder.metrics().register(&metrics.registry) {
                warn!(error = %e, "failed to register recorder metrics");
            }
        }

        let links = config
            .links
            .iter()
            .map(|link| (link.code.clone(), link.clone()))
            .collect();

        Self {
            gate,
            recorder,
            links,
            trust_proxy_headers: config.server.trust_proxy_headers,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Build the full state: open the click log and the geolocation backend, then
/// assemble everything else.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<SharedState> {
    let recorder = if config.recorder.enabled {
        let resolver =
            RegionResolver::from_config(&config.geoip).context("failed to set up geolocation")?;
        let store = JsonLinesStore::open(&config.recorder.log_path)
            .await
            .context("failed to open click log")?;
        Some(ClickRecorder::new(
            resolver,
            Arc::new(store),
            config.recorder.write_timeout(),
        ))
    } else {
        info!("click recording disabled");
        None
    };

    Ok(Arc::new(AppState::new(config, recorder)))
}
