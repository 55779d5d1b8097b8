//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[database]` may be omitted and falls back to defaults.
//!
//! # Example
//!
//! ```no_run
//! use yzw_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Base interval: {}s", config.interval.seconds);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DatabaseConfig, FailureLogConfig, IntervalConfig, LogFormat, PortalConfig,
    ProxyConfig, RetryConfig, SessionConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
