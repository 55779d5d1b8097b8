//! Outbound proxy selection
//!
//! This module handles:
//! - Fetching and evicting identities from an external proxy pool
//! - Falling back to fixed backup proxies, then direct egress
//! - Probing a proxy before trusting it
//! - Recording direct-egress failures to the IP failure log

mod manager;
mod pool;

pub use manager::ProxyManager;
pub use pool::ProxyPool;
