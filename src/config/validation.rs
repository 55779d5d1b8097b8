use crate::config::types::{
    Config, DatabaseConfig, FailureLogConfig, IntervalConfig, PortalConfig, ProxyConfig,
    RetryConfig, SessionConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_portal_config(&config.portal)?;
    validate_interval_config(&config.interval)?;
    validate_retry_config(&config.retry)?;
    validate_proxy_config(&config.proxy)?;
    validate_database_config(&config.database)?;
    validate_failure_log_config(&config.failure_log)?;
    validate_session_config(&config.session)?;
    Ok(())
}

/// Validates portal configuration
fn validate_portal_config(config: &PortalConfig) -> Result<(), ConfigError> {
    validate_http_url("portal.base-url", &config.base_url)?;

    if config.page_size < 1 || config.detail_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page sizes must be >= 1, got page-size={} detail-page-size={}",
            config.page_size, config.detail_page_size
        )));
    }

    if config.rate_limit_message.is_empty() {
        return Err(ConfigError::Validation(
            "rate-limit-message cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_seconds == 0 || config.connect_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

/// Validates the inter-request interval
fn validate_interval_config(config: &IntervalConfig) -> Result<(), ConfigError> {
    if !config.seconds.is_finite() || config.seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "interval.seconds must be a non-negative number, got {}",
            config.seconds
        )));
    }
    Ok(())
}

/// Validates retry ceilings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.login_prompt_limit < 1 {
        return Err(ConfigError::Validation(
            "login-prompt-limit must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates proxy configuration (only when enabled)
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    validate_http_url("proxy.pool-url", &config.pool_url)?;
    validate_http_url("proxy.probe-url", &config.probe_url)?;

    for entry in &config.backup {
        validate_proxy_address(entry)?;
    }

    if config.ip_failure_log.is_empty() {
        return Err(ConfigError::Validation(
            "proxy.ip-failure-log cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "database.path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates failure log configuration
fn validate_failure_log_config(config: &FailureLogConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "failure-log.path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates session credentials: a cookie, a username/password pair, or neither
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    validate_http_url("session.login-url", &config.login_url)?;

    let has_cookie = config.cookie.as_deref().is_some_and(|c| !c.trim().is_empty());
    let has_user = config.username.as_deref().is_some_and(|u| !u.is_empty());
    let has_password = config.password.as_deref().is_some_and(|p| !p.is_empty());

    if has_user != has_password {
        return Err(ConfigError::Validation(
            "session.username and session.password must be given together".to_string(),
        ));
    }

    if has_cookie && has_user {
        return Err(ConfigError::Validation(
            "session.cookie cannot be combined with username/password".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses http or https
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates a `host:port` proxy identity
fn validate_proxy_address(address: &str) -> Result<(), ConfigError> {
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        ConfigError::Validation(format!("Proxy '{}' must be in host:port form", address))
    })?;

    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}' must be in host:port form",
            address
        )));
    }

    Ok(())
}
