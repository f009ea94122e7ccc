use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use shortlink_common::{ShortlinkError, ShortlinkResult};
use tracing::{debug, info};

use crate::lookup::GeoLookup;

/// Minimal struct for deserializing the country from a MaxMind DB.
#[derive(serde::Deserialize)]
struct CountryRecord {
    country: Option<CountryInfo>,
}

#[derive(serde::Deserialize)]
struct CountryInfo {
    iso_code: Option<String>,
    names: Option<BTreeMap<String, String>>,
}

impl CountryInfo {
    /// English name, falling back to the ISO code.
    fn display_name(self) -> Option<String> {
        self.names
            .and_then(|mut names| names.remove("en"))
            .or(self.iso_code)
    }
}

/// Offline lookup using a MaxMind `.mmdb` country database.
///
/// Uses `ArcSwap` for lock-free hot-reload of the database file.
pub struct MaxMindLookup {
    reader: ArcSwap<Option<maxminddb::Reader<Vec<u8>>>>,
}

impl MaxMindLookup {
    /// Open the database at `path`.
    pub fn open(path: &Path) -> ShortlinkResult<Self> {
        let reader = open_reader(path)?;
        info!(path = %path.display(), "loaded GeoIP database");
        Ok(Self {
            reader: ArcSwap::from_pointee(Some(reader)),
        })
    }

    /// A lookup with no database; every lookup fails until [`reload`](Self::reload).
    pub fn new_empty() -> Self {
        Self {
            reader: ArcSwap::from_pointee(None),
        }
    }

    /// Hot-reload the database from a new path. On failure the current
    /// database stays in place.
    pub fn reload(&self, path: &Path) -> ShortlinkResult<()> {
        let reader = open_reader(path)?;
        self.reader.store(Arc::new(Some(reader)));
        info!(path = %path.display(), "reloaded GeoIP database");
        Ok(())
    }

    fn lookup_country(&self, addr: IpAddr) -> ShortlinkResult<String> {
        let guard = self.reader.load();
        let reader = guard
            .as_ref()
            .as_ref()
            .ok_or_else(|| ShortlinkError::Lookup("no GeoIP database loaded".to_string()))?;

        match reader.lookup::<CountryRecord>(addr) {
            Ok(record) => record
                .country
                .and_then(CountryInfo::display_name)
                .ok_or_else(|| ShortlinkError::Lookup(format!("no country for {}", addr))),
            Err(e) => {
                debug!(addr = %addr, error = %e, "GeoIP lookup failed");
                Err(ShortlinkError::Lookup(e.to_string()))
            }
        }
    }
}

fn open_reader(path: &Path) -> ShortlinkResult<maxminddb::Reader<Vec<u8>>> {
    maxminddb::Reader::open_readfile(path).map_err(|e| {
        ShortlinkError::Lookup(format!(
            "failed to open GeoIP database {}: {}",
            path.display(),
            e
        ))
    })
}

#[async_trait]
impl GeoLookup for MaxMindLookup {
    fn name(&self) -> &'static str {
        "maxmind"
    }

    async fn lookup(&self, addr: IpAddr) -> ShortlinkResult<String> {
        self.lookup_country(addr)
    }
}
