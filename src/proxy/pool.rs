//! Client for the external proxy pool service
//!
//! The pool exposes `GET /get/` returning `{"proxy": "host:port"}` and
//! `GET /delete/?proxy=host:port` to evict a dead identity. Failures are
//! logged and swallowed; an unreachable pool just means "no proxy".

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct PoolResponse {
    #[serde(default)]
    proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProxyPool {
    base_url: String,
    client: Client,
}

impl ProxyPool {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Asks the pool for a proxy identity
    pub async fn fetch(&self) -> Option<String> {
        let url = format!("{}/get/", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Proxy pool unreachable: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Proxy pool returned {}", response.status());
            return None;
        }

        match response.json::<PoolResponse>().await {
            Ok(body) => body.proxy.filter(|p| !p.is_empty()),
            Err(e) => {
                tracing::warn!("Proxy pool returned an unreadable body: {}", e);
                None
            }
        }
    }

    /// Asks the pool to evict a proxy identity
    pub async fn delete(&self, proxy: &str) {
        let url = format!("{}/delete/", self.base_url);
        if let Err(e) = self
            .client
            .get(&url)
            .query(&[("proxy", proxy)])
            .send()
            .await
        {
            tracing::warn!("Failed to delete proxy {} from pool: {}", proxy, e);
        }
    }
}
