use std::sync::Arc;
use std::time::Duration;

use shortlink_common::{GeoIpConfig, ShortlinkResult};
use tracing::{debug, info};

use crate::classify::{classify, AddressClass};
use crate::lookup::{GeoLookup, IpApiLookup};
use crate::mmdb::MaxMindLookup;
use crate::region::Region;

/// Turns a raw source address into a [`Region`] without ever failing.
///
/// Local and reserved addresses short-circuit to a sentinel. Public addresses
/// get exactly one backend call, cut off after `timeout`.
pub struct RegionResolver {
    backend: Option<Arc<dyn GeoLookup>>,
    timeout: Duration,
}

impl RegionResolver {
    pub fn new(backend: Arc<dyn GeoLookup>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// A resolver with no backend: public addresses resolve to `Unknown`.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
        }
    }

    /// Build the resolver described by `config`.
    ///
    /// A configured `database_path` selects the MaxMind backend, otherwise the
    /// HTTP endpoint is used.
    pub fn from_config(config: &GeoIpConfig) -> ShortlinkResult<Self> {
        if !config.enabled {
            info!("geolocation disabled, regions will be recorded as unknown");
            return Ok(Self::disabled());
        }

        let backend: Arc<dyn GeoLookup> = match config.database_path {
            Some(ref path) => Arc::new(MaxMindLookup::open(path)?),
            None => Arc::new(IpApiLookup::new(config.endpoint.clone(), config.timeout())?),
        };
        info!(
            backend = backend.name(),
            timeout_ms = config.timeout_ms,
            "geolocation enabled"
        );

        Ok(Self::new(backend, config.timeout()))
    }

    pub async fn resolve(&self, source_address: &str) -> Region {
        let addr = match classify(source_address) {
            AddressClass::Loopback => return Region::LocalTesting,
            AddressClass::NonPublic => return Region::LocalNetwork,
            AddressClass::Unparsable => {
                debug!(source_address, "source address is not an IP, skipping lookup");
                return Region::Unknown;
            }
            AddressClass::Public(addr) => addr,
        };

        let Some(backend) = self.backend.as_ref() else {
            return Region::Unknown;
        };

        match tokio::time::timeout(self.timeout, backend.lookup(addr)).await {
            Ok(Ok(name)) => Region::Resolved(name),
            Ok(Err(e)) => {
                debug!(addr = %addr, backend = backend.name(), error = %e, "region lookup failed");
                Region::Unknown
            }
            Err(_) => {
                debug!(
                    addr = %addr,
                    backend = backend.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "region lookup timed out"
                );
                Region::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shortlink_common::ShortlinkError;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers after `delay` with `answer`, counting calls.
    struct FakeLookup {
        calls: AtomicUsize,
        delay: Duration,
        answer: Option<&'static str>,
    }

    impl FakeLookup {
        fn new(delay: Duration, answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                answer,
            })
        }
    }

    #[async_trait]
    impl GeoLookup for FakeLookup {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn lookup(&self, _addr: IpAddr) -> ShortlinkResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer
                .map(String::from)
                .ok_or_else(|| ShortlinkError::Lookup("no answer".into()))
        }
    }

    #[tokio::test]
    async fn loopback_never_calls_backend() {
        let fake = FakeLookup::new(Duration::ZERO, Some("Nowhere"));
        let resolver = RegionResolver::new(fake.clone(), Duration::from_secs(2));

        assert_eq!(resolver.resolve("127.0.0.1").await, Region::LocalTesting);
        assert_eq!(resolver.resolve("192.168.0.10").await, Region::LocalNetwork);
        assert_eq!(resolver.resolve("not-an-ip").await, Region::Unknown);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn public_address_resolves() {
        let fake = FakeLookup::new(Duration::ZERO, Some("Australia"));
        let resolver = RegionResolver::new(fake.clone(), Duration::from_secs(2));

        assert_eq!(
            resolver.resolve("1.1.1.1").await,
            Region::Resolved("Australia".into())
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_error_is_unknown() {
        let fake = FakeLookup::new(Duration::ZERO, None);
        let resolver = RegionResolver::new(fake.clone(), Duration::from_secs(2));

        assert_eq!(resolver.resolve("8.8.4.4").await, Region::Unknown);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let fake = FakeLookup::new(Duration::from_secs(30), Some("Too Late"));
        let resolver = RegionResolver::new(fake.clone(), Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        assert_eq!(resolver.resolve("8.8.8.8").await, Region::Unknown);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn disabled_resolver_still_classifies() {
        let resolver = RegionResolver::disabled();
        assert_eq!(resolver.resolve("::1").await, Region::LocalTesting);
        assert_eq!(resolver.resolve("8.8.8.8").await, Region::Unknown);
    }

    #[test]
    fn from_config_disabled_and_bad_database() {
        let config = GeoIpConfig {
            enabled: false,
            ..GeoIpConfig::default()
        };
        assert!(RegionResolver::from_config(&config).unwrap().backend.is_none());

        let config = GeoIpConfig {
            database_path: Some("/nonexistent/GeoLite2-Country.mmdb".into()),
            ..GeoIpConfig::default()
        };
        assert!(RegionResolver::from_config(&config).is_err());
    }
}
