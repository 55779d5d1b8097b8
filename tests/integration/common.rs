//! Shared fixtures for the integration tests

use serde_json::{json, Value};
use std::path::Path;
use wiremock::{MockServer, Request};
use yzw_harvest::config::{
    Config, DatabaseConfig, FailureLogConfig, IntervalConfig, LogFormat, PortalConfig,
    ProxyConfig, RetryConfig, SessionConfig,
};
use yzw_harvest::crawler::{CrawlTask, ProvinceRef};

pub const SCHOOL_LIST: &str = "/zsml/rs/dws.do";
pub const MAJOR_LIST: &str = "/zsml/rs/dwzys.do";
pub const DETAIL: &str = "/zsml/rs/yjfxs.do";
pub const KEEPALIVE: &str = "/zsml/a/dw.do";

/// A config pointed at `base_url` with every delay shrunk to (almost) nothing
pub fn test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        portal: PortalConfig {
            base_url: base_url.to_string(),
            connect_timeout_seconds: 2,
            request_timeout_seconds: 5,
            ..PortalConfig::default()
        },
        interval: IntervalConfig { seconds: 0.0 },
        retry: RetryConfig {
            backoff_unit_ms: 1,
            transport_retry_delay_ms: 1,
            ..RetryConfig::default()
        },
        proxy: ProxyConfig {
            ip_failure_log: dir.join("ip_failure.log").display().to_string(),
            ..ProxyConfig::default()
        },
        database: DatabaseConfig {
            path: dir.join("harvest.db").display().to_string(),
        },
        failure_log: FailureLogConfig {
            path: dir.join("failed_requests.log").display().to_string(),
            format: LogFormat::LegacyText,
        },
        session: SessionConfig::default(),
    }
}

pub fn beijing() -> ProvinceRef {
    ProvinceRef {
        code: "11".to_string(),
        name: "北京".to_string(),
    }
}

pub fn beijing_task() -> CrawlTask {
    CrawlTask::province(beijing())
}

/// A successful list envelope
pub fn list_page(items: Vec<Value>, next_page_available: bool) -> Value {
    json!({
        "flag": true,
        "msg": {
            "list": items,
            "nextPageAvailable": next_page_available
        }
    })
}

/// A refusal envelope carrying a message
pub fn refusal(msg: &str) -> Value {
    json!({ "flag": false, "msg": msg })
}

pub fn school(code: &str, name: &str) -> Value {
    json!({ "dwdm": code, "dwmc": name })
}

pub fn major(school_code: &str, code: &str, name: &str) -> Value {
    json!({ "dwdm": school_code, "zydm": code, "zymc": name, "xwlxmc": "学术学位" })
}

pub fn detail(direction: &str, subject1: &str) -> Value {
    json!({
        "yxsmc": "(001)信息学院",
        "yjfxmc": direction,
        "xxfsmc": "全日制",
        "ksfsmc": "统考",
        "kskm1": subject1,
        "kskm2": "(201)英语一"
    })
}

/// Requests the server received, as (path, body) pairs
pub async fn received(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|r: Request| {
            (
                r.url.path().to_string(),
                String::from_utf8_lossy(&r.body).into_owned(),
            )
        })
        .collect()
}

/// How many received requests hit `path`
pub async fn hits(server: &MockServer, path: &str) -> usize {
    received(server)
        .await
        .iter()
        .filter(|(p, _)| p == path)
        .count()
}

/// An address nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
