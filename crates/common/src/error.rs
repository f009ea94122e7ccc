use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShortlinkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("geolocation lookup failed: {0}")]
    Lookup(String),

    #[error("click store error: {0}")]
    Store(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type ShortlinkResult<T> = Result<T, ShortlinkError>;
