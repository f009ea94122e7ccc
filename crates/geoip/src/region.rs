use std::fmt;

use serde::{Deserialize, Serialize};

pub const LOCAL_TESTING: &str = "Local (Testing)";
pub const LOCAL_NETWORK: &str = "Local (Private Network)";
pub const UNKNOWN: &str = "Unknown";

/// Where a click came from, as far as it could be determined.
///
/// Serialized as a plain string: the resolved name or one of the sentinels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Region {
    /// Name reported by the lookup backend.
    Resolved(String),
    /// Loopback traffic.
    LocalTesting,
    /// Private or reserved address ranges.
    LocalNetwork,
    /// Lookup skipped, failed or timed out.
    #[default]
    Unknown,
}

impl Region {
    pub fn as_str(&self) -> &str {
        match self {
            Region::Resolved(name) => name,
            Region::LocalTesting => LOCAL_TESTING,
            Region::LocalNetwork => LOCAL_NETWORK,
            Region::Unknown => UNKNOWN,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Region::Unknown)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        match region {
            Region::Resolved(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        match value.as_str() {
            LOCAL_TESTING => Region::LocalTesting,
            LOCAL_NETWORK => Region::LocalNetwork,
            UNKNOWN | "" => Region::Unknown,
            _ => Region::Resolved(value),
        }
    }
}
