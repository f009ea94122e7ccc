use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shortlink_common::{ShortlinkError, ShortlinkResult};

/// An external source of location names for public IP addresses.
///
/// Implementations must be safe for concurrent use; callers bound every call
/// with their own timeout.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Resolve `addr` to a location name. Any failure is an `Err`.
    async fn lookup(&self, addr: IpAddr) -> ShortlinkResult<String>;
}

/// Lookup against the ip-api.com JSON endpoint (or anything that speaks the
/// same format).
pub struct IpApiLookup {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    country: String,
}

impl IpApiLookup {
    /// Create a lookup client for `endpoint` (for example
    /// `http://ip-api.com/json`). `timeout` is applied to every HTTP request.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ShortlinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShortlinkError::Lookup(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, endpoint))
    }

    /// Use a preconfigured client. The caller is responsible for its timeout.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, addr: IpAddr) -> String {
        format!("{}/{}?fields=status,country", self.endpoint, addr)
    }
}

fn country_from_response(body: IpApiResponse) -> ShortlinkResult<String> {
    if body.status == "success" && !body.country.is_empty() {
        Ok(body.country)
    } else {
        Err(ShortlinkError::Lookup(format!(
            "lookup returned status '{}' without a country",
            body.status
        )))
    }
}

#[async_trait]
impl GeoLookup for IpApiLookup {
    fn name(&self) -> &'static str {
        "ip-api"
    }

    async fn lookup(&self, addr: IpAddr) -> ShortlinkResult<String> {
        let response = self
            .client
            .get(self.url_for(addr))
            .send()
            .await
            .map_err(|e| ShortlinkError::Lookup(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShortlinkError::Lookup(format!("unexpected status {}", status)));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| ShortlinkError::Lookup(format!("malformed response: {}", e)))?;

        country_from_response(body)
    }
}
