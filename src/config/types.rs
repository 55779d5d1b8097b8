use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub interval: IntervalConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    pub database: DatabaseConfig,
    #[serde(rename = "failure-log", default)]
    pub failure_log: FailureLogConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Remote portal endpoints and transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Scheme and host the level endpoints are joined onto
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "connect-timeout-seconds", default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(rename = "request-timeout-seconds", default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Exact `msg` the portal returns when it throttles a client
    #[serde(rename = "rate-limit-message", default = "default_rate_limit_message")]
    pub rate_limit_message: String,

    /// Rows per page for the school and major lists
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(rename = "detail-page-size", default = "default_detail_page_size")]
    pub detail_page_size: u32,
}

/// Inter-request pacing
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    /// Base delay between requests, jittered by ±20%
    #[serde(default = "default_interval_seconds")]
    pub seconds: f64,
}

/// Retry ceilings and backoff units
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "max-transport-retries", default = "default_max_transport_retries")]
    pub max_transport_retries: u32,

    #[serde(rename = "transport-retry-delay-ms", default = "default_transport_retry_delay")]
    pub transport_retry_delay_ms: u64,

    /// One unit of rate-limit backoff
    #[serde(rename = "backoff-unit-ms", default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,

    #[serde(rename = "login-prompt-limit", default = "default_login_prompt_limit")]
    pub login_prompt_limit: u32,
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(rename = "pool-url", default = "default_pool_url")]
    pub pool_url: String,

    /// Fixed `host:port` identities tried when the pool runs dry
    #[serde(default = "default_backup_proxies")]
    pub backup: Vec<String>,

    #[serde(rename = "probe-url", default = "default_probe_url")]
    pub probe_url: String,

    #[serde(rename = "probe-timeout-seconds", default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,

    #[serde(rename = "max-init-attempts", default = "default_max_init_attempts")]
    pub max_init_attempts: u32,

    #[serde(rename = "ip-failure-log", default = "default_ip_failure_log")]
    pub ip_failure_log: String,
}

/// Relational sink location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Failure log location and line format
#[derive(Debug, Clone, Deserialize)]
pub struct FailureLogConfig {
    #[serde(default = "default_failure_log_path")]
    pub path: String,

    #[serde(default)]
    pub format: LogFormat,
}

/// Line format used when appending to the failure log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    JsonLines,
    /// `[ts] [type] {params}, xwlxmc: .., province_code: ..，错误原因: 重试次数过多`
    LegacyText,
}

/// Credentials for acquiring a portal session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "login-url", default = "default_login_url")]
    pub login_url: String,

    #[serde(default)]
    pub cookie: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
            rate_limit_message: default_rate_limit_message(),
            page_size: default_page_size(),
            detail_page_size: default_detail_page_size(),
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            seconds: default_interval_seconds(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_transport_retries: default_max_transport_retries(),
            transport_retry_delay_ms: default_transport_retry_delay(),
            backoff_unit_ms: default_backoff_unit(),
            login_prompt_limit: default_login_prompt_limit(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pool_url: default_pool_url(),
            backup: default_backup_proxies(),
            probe_url: default_probe_url(),
            probe_timeout_seconds: default_probe_timeout(),
            max_init_attempts: default_max_init_attempts(),
            ip_failure_log: default_ip_failure_log(),
        }
    }
}

impl Default for FailureLogConfig {
    fn default() -> Self {
        Self {
            path: default_failure_log_path(),
            format: LogFormat::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            cookie: None,
            username: None,
            password: None,
        }
    }
}

fn default_base_url() -> String {
    "https://yz.chsi.com.cn".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_rate_limit_message() -> String {
    "访问太频繁，请稍后再试".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_detail_page_size() -> u32 {
    3
}

fn default_interval_seconds() -> f64 {
    3.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_transport_retries() -> u32 {
    3
}

fn default_transport_retry_delay() -> u64 {
    5000
}

fn default_backoff_unit() -> u64 {
    1000
}

fn default_login_prompt_limit() -> u32 {
    10
}

fn default_pool_url() -> String {
    "http://127.0.0.1:5010".to_string()
}

fn default_backup_proxies() -> Vec<String> {
    vec![
        "127.0.0.1:7890".to_string(),
        "127.0.0.1:1080".to_string(),
        "127.0.0.1:8080".to_string(),
    ]
}

fn default_probe_url() -> String {
    "https://www.baidu.com".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_max_init_attempts() -> u32 {
    10
}

fn default_ip_failure_log() -> String {
    "ip_failure.log".to_string()
}

fn default_failure_log_path() -> String {
    "failed_requests.log".to_string()
}

fn default_login_url() -> String {
    "https://account.chsi.com.cn/passport/login?entrytype=yzgr&service=https%3A%2F%2Fyz.chsi.com.cn%2Fj_spring_cas_security_check".to_string()
}
