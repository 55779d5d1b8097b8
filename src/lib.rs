//! yzw-harvest: a resumable catalogue harvester
//!
//! This crate walks the graduate admissions catalogue (province → school → major → detail)
//! exposed by a paginated portal, normalizes every detail row and stores it in SQLite.
//! Failed requests are recorded in an append-only log and replayed on the next start.

pub mod config;
pub mod crawler;
pub mod failure_log;
pub mod output;
pub mod proxy;
pub mod session;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid breakpoint: {0}")]
    InvalidBreakpoint(String),

    #[error("Portal asked for login {prompts} times, session presumed invalid")]
    LoginLimitExceeded { prompts: u32 },

    #[error("Direct egress failed after proxies were exhausted: {0}")]
    DirectEgressFailed(String),
}

impl HarvestError {
    /// Returns true for the two conditions that end the whole process
    ///
    /// Everything else is contained at task granularity by the crawl engine.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LoginLimitExceeded { .. } | Self::DirectEgressFailed(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{BreakpointCursor, CrawlEngine, Level, ResponseClassification};
pub use failure_log::{FailureLog, FailureLogEntry};
pub use proxy::ProxyManager;
