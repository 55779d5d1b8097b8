//! Portal session acquisition
//!
//! A session is either imported from a cookie string copied out of a browser
//! or obtained by submitting credentials to the CAS login form. Either way the
//! cookies land in the portal client's shared jar.

mod login;

pub use login::{cas_login, parse_login_form, LoginForm};

use crate::config::SessionConfig;
use crate::crawler::Portal;
use crate::HarvestError;

/// How the session is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    Cookie(String),
    Credentials { username: String, password: String },
    Anonymous,
}

impl SessionSource {
    /// Picks the session source; a cookie given on the command line wins over the config
    pub fn from_config(config: &SessionConfig, cookie_override: Option<&str>) -> Self {
        if let Some(cookie) = cookie_override.filter(|c| !c.trim().is_empty()) {
            return Self::Cookie(cookie.to_string());
        }
        if let Some(cookie) = config.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            return Self::Cookie(cookie.to_string());
        }
        match (&config.username, &config.password) {
            (Some(username), Some(password)) if !username.is_empty() => Self::Credentials {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Self::Anonymous,
        }
    }
}

/// Splits a `k=v; k2=v2` cookie string into pairs, dropping fragments without `=`
pub fn parse_cookie_string(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Loads cookies into the portal's jar, scoped to the portal host
pub fn import_cookies(portal: &Portal, cookie: &str) -> usize {
    let pairs = parse_cookie_string(cookie);
    for (key, value) in &pairs {
        portal
            .jar()
            .add_cookie_str(&format!("{}={}; Path=/", key, value), portal.base_url());
    }
    pairs.len()
}

/// Establishes a session and touches the keepalive page to sync it
pub async fn establish(
    portal: &mut Portal,
    config: &SessionConfig,
    cookie_override: Option<&str>,
) -> Result<(), HarvestError> {
    match SessionSource::from_config(config, cookie_override) {
        SessionSource::Cookie(cookie) => {
            let count = import_cookies(portal, &cookie);
            if count == 0 {
                return Err(HarvestError::Session(
                    "cookie string contains no key=value pairs".to_string(),
                ));
            }
            tracing::info!("Imported {} session cookies", count);
        }
        SessionSource::Credentials { username, password } => {
            cas_login(portal.client(), &config.login_url, &username, &password).await?;
        }
        SessionSource::Anonymous => {
            tracing::warn!("No session credentials configured, continuing without login");
        }
    }

    touch_with_escalation(portal).await
}

/// Touches the keepalive page, moving down the proxy ladder on connect errors
///
/// Ends with `DirectEgressFailed` once direct egress cannot connect either.
async fn touch_with_escalation(portal: &mut Portal) -> Result<(), HarvestError> {
    loop {
        match portal.touch_session().await {
            Err(HarvestError::Http { url, source })
                if source.is_connect() && portal.has_proxy_manager() =>
            {
                tracing::warn!("Keepalive {} could not connect: {}", url, source);
                portal.escalate_connect_failure(&source.to_string()).await?;
            }
            other => return other,
        }
    }
}
