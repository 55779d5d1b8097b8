//! The proxy ladder: pool proxies, then fixed backups, then direct egress

use crate::config::ProxyConfig;
use crate::proxy::pool::ProxyPool;
use crate::HarvestError;
use chrono::Local;
use reqwest::{Client, Proxy};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Tracks the current outbound identity and every identity that has failed
///
/// `current == None` means direct egress. An identity that fails is never
/// chosen again for the life of the manager.
#[derive(Debug)]
pub struct ProxyManager {
    pool: ProxyPool,
    backups: Vec<String>,
    current: Option<String>,
    failed: HashSet<String>,
    probe_url: String,
    probe_timeout: Duration,
    max_init_attempts: u32,
    ip_failure_log: PathBuf,
}

impl ProxyManager {
    pub fn new(config: &ProxyConfig) -> Result<Self, HarvestError> {
        let probe_timeout = Duration::from_secs(config.probe_timeout_seconds);
        Ok(Self {
            pool: ProxyPool::new(&config.pool_url, probe_timeout)?,
            backups: config.backup.clone(),
            current: None,
            failed: HashSet::new(),
            probe_url: config.probe_url.clone(),
            probe_timeout,
            max_init_attempts: config.max_init_attempts,
            ip_failure_log: PathBuf::from(&config.ip_failure_log),
        })
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_failed(&self, proxy: &str) -> bool {
        self.failed.contains(proxy)
    }

    /// True while a proxy is selected and has not failed
    pub fn should_use_proxy(&self) -> bool {
        self.current
            .as_deref()
            .map_or(false, |proxy| !self.failed.contains(proxy))
    }

    /// `http://host:port` for the current proxy, or `None` when going direct
    pub fn proxy_url(&self) -> Option<String> {
        if !self.should_use_proxy() {
            return None;
        }
        self.current.as_ref().map(|proxy| format!("http://{}", proxy))
    }

    /// Marks the current identity failed and moves to the next one
    ///
    /// Tries the pool first, then the first backup not yet failed. Returns the
    /// new identity, or `None` when the ladder has reached direct egress.
    pub async fn switch_proxy(&mut self) -> Option<String> {
        if let Some(current) = self.current.take() {
            self.pool.delete(&current).await;
            self.failed.insert(current);
        }

        if let Some(proxy) = self.pool.fetch().await {
            if !self.failed.contains(&proxy) {
                tracing::info!("Using pool proxy {}", proxy);
                self.current = Some(proxy.clone());
                return Some(proxy);
            }
        }

        if let Some(proxy) = self.backups.iter().find(|p| !self.failed.contains(*p)) {
            tracing::info!("Using backup proxy {}", proxy);
            self.current = Some(proxy.clone());
            return Some(proxy.clone());
        }

        tracing::warn!("All proxies have failed, using direct egress");
        None
    }

    /// Checks whether `proxy` can reach the probe URL
    pub async fn probe(&self, proxy: &str) -> bool {
        let client = match Proxy::all(format!("http://{}", proxy)).and_then(|p| {
            Client::builder()
                .proxy(p)
                .timeout(self.probe_timeout)
                .build()
        }) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Cannot build probe client for {}: {}", proxy, e);
                return false;
            }
        };

        match client.get(&self.probe_url).send().await {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                tracing::debug!("Probe through {} failed: {}", proxy, e);
                false
            }
        }
    }

    /// Selects and probes proxies until one works
    ///
    /// Bounded by `max_init_attempts`. Returns `false` when the ladder ran dry
    /// or the bound was hit, leaving the manager on direct egress.
    pub async fn initialize(&mut self) -> bool {
        tracing::info!("Initializing proxy");

        for attempt in 1..=self.max_init_attempts {
            let Some(proxy) = self.switch_proxy().await else {
                return false;
            };

            if self.probe(&proxy).await {
                tracing::info!("Proxy {} is working", proxy);
                return true;
            }

            tracing::warn!(
                "Proxy {} failed its probe (attempt {}/{})",
                proxy,
                attempt,
                self.max_init_attempts
            );
            self.failed.insert(proxy);
        }

        tracing::warn!("Proxy initialization gave up, using direct egress");
        self.current = None;
        false
    }

    /// Appends a direct-egress failure to the IP failure log
    pub fn record_direct_ip_failure(&self, error: &str) -> std::io::Result<()> {
        tracing::error!("Direct egress failed, shutting down: {}", error);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ip_failure_log)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{}] 自身IP失败: {}", timestamp, error)
    }
}
