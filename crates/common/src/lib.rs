//! Shared configuration and error types for the shortlink workspace.

pub mod config;
pub mod error;

pub use config::{
    AppConfig, GeoIpConfig, LinkConfig, RateLimitConfig, RecorderConfig, ServerConfig,
    RESERVED_PATHS,
};
pub use error::{ShortlinkError, ShortlinkResult};
