use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortlink_geoip::Region;
use uuid::Uuid;

/// Request metadata copied out of a request before it goes out of scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickMetadata {
    pub source_address: String,
    pub user_agent: String,
    pub referer: String,
}

/// One observed redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: Uuid,
    /// Identifier of the link that was followed.
    pub subject_id: u64,
    pub source_address: String,
    pub user_agent: String,
    pub referer: String,
    pub resolved_region: Region,
    pub clicked_at: DateTime<Utc>,
}

impl ClickEvent {
    /// Capture an event on the request path. Only copies fields; the region
    /// stays `Unknown` until the recorder resolves it.
    pub fn capture(subject_id: u64, metadata: ClickMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            source_address: metadata.source_address,
            user_agent: metadata.user_agent,
            referer: metadata.referer,
            resolved_region: Region::Unknown,
            clicked_at: Utc::now(),
        }
    }
}
