//! HTTP access to the catalogue portal
//!
//! This module handles:
//! - Building HTTP clients that share one cookie jar
//! - Posting level forms and returning the raw status and body
//! - Touching the session keepalive page
//! - Rebuilding the client when the proxy identity changes

use crate::config::PortalConfig;
use crate::crawler::classify::TransportFailure;
use crate::crawler::task::Level;
use crate::proxy::ProxyManager;
use crate::HarvestError;
use reqwest::cookie::Jar;
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Session keepalive page
pub const KEEPALIVE_PATH: &str = "/zsml/a/dw.do";

/// Builds an HTTP client for the portal
///
/// # Arguments
///
/// * `config` - Portal transport settings
/// * `jar` - Cookie jar shared across client rebuilds
/// * `proxy_url` - `http://host:port` of the proxy to route through, if any
pub fn build_http_client(
    config: &PortalConfig,
    jar: Arc<Jar>,
    proxy_url: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .cookie_provider(jar)
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy_url {
        builder = builder.proxy(Proxy::all(proxy_url)?);
    }

    builder.build()
}

#[derive(Debug, Clone)]
struct Endpoints {
    school_list: Url,
    major_list: Url,
    detail: Url,
    keepalive: Url,
}

impl Endpoints {
    fn new(base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            school_list: base.join(Level::Province.endpoint())?,
            major_list: base.join(Level::School.endpoint())?,
            detail: base.join(Level::Major.endpoint())?,
            keepalive: base.join(KEEPALIVE_PATH)?,
        })
    }

    fn for_level(&self, level: Level) -> &Url {
        match level {
            Level::Province => &self.school_list,
            Level::School => &self.major_list,
            Level::Major => &self.detail,
        }
    }
}

/// The portal client plus the proxy identity it currently routes through
pub struct Portal {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    endpoints: Endpoints,
    config: PortalConfig,
    proxy: Option<ProxyManager>,
}

impl Portal {
    /// Creates a portal client, routed through the manager's current proxy if there is one
    pub fn new(config: &PortalConfig, proxy: Option<ProxyManager>) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.base_url)?;
        let endpoints = Endpoints::new(&base_url)?;
        let jar = Arc::new(Jar::default());
        let proxy_url = proxy.as_ref().and_then(ProxyManager::proxy_url);
        let client = build_http_client(config, Arc::clone(&jar), proxy_url.as_deref())?;

        Ok(Self {
            client,
            jar,
            base_url,
            endpoints,
            config: config.clone(),
            proxy,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn has_proxy_manager(&self) -> bool {
        self.proxy.is_some()
    }

    pub fn proxy_manager(&self) -> Option<&ProxyManager> {
        self.proxy.as_ref()
    }

    /// Posts a level form and returns `(status, body)`
    pub async fn post_form(
        &self,
        level: Level,
        form: &[(&'static str, String)],
    ) -> Result<(u16, String), TransportFailure> {
        let url = self.endpoints.for_level(level).clone();
        tracing::debug!("POST {} ({} fields)", url, form.len());

        let response = self.client.post(url).form(form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok((status, body))
    }

    /// Fetches the keepalive page so the portal refreshes session cookies
    pub async fn touch_session(&self) -> Result<(), HarvestError> {
        let url = self.endpoints.keepalive.clone();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        tracing::debug!("Keepalive {} returned {}", url, response.status());
        Ok(())
    }

    /// Reacts to a connect error by moving down the proxy ladder
    ///
    /// With a live proxy the manager switches identity and the client is rebuilt.
    /// Once the ladder has reached direct egress, the failure is recorded and
    /// `DirectEgressFailed` is returned; callers treat it as fatal.
    pub async fn escalate_connect_failure(&mut self, error: &str) -> Result<(), HarvestError> {
        let Some(manager) = self.proxy.as_mut() else {
            return Ok(());
        };

        if !manager.should_use_proxy() {
            if let Err(e) = manager.record_direct_ip_failure(error) {
                tracing::error!("Failed to write IP failure log: {}", e);
            }
            return Err(HarvestError::DirectEgressFailed(error.to_string()));
        }

        // An identity reqwest cannot use is failed like a dead one; the next
        // switch marks it and moves on, ending at direct egress.
        loop {
            let Some(proxy) = manager.switch_proxy().await else {
                tracing::warn!("No proxies left, falling back to direct egress");
                self.client = build_http_client(&self.config, Arc::clone(&self.jar), None)?;
                return Ok(());
            };

            let proxy_url = format!("http://{}", proxy);
            match build_http_client(&self.config, Arc::clone(&self.jar), Some(&proxy_url)) {
                Ok(client) => {
                    tracing::info!("Switched to proxy {}", proxy);
                    self.client = client;
                    return Ok(());
                }
                Err(e) => tracing::warn!("Proxy {} is unusable: {}", proxy, e),
            }
        }
    }
}
