//! Proxy ladder behaviour against a stand-in pool service

use crate::common::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yzw_harvest::config::{Config, ProxyConfig};
use yzw_harvest::crawler::{BreakpointCursor, CrawlEngine, Portal};
use yzw_harvest::failure_log::FailureLogEntry;
use yzw_harvest::proxy::ProxyManager;
use yzw_harvest::storage::SqliteStorage;
use yzw_harvest::HarvestError;

fn proxy_config(config: &Config, pool_url: &str, backup: Vec<String>) -> ProxyConfig {
    ProxyConfig {
        enabled: true,
        pool_url: pool_url.to_string(),
        backup,
        probe_url: "http://probe.test/ok".to_string(),
        probe_timeout_seconds: 2,
        ..config.proxy.clone()
    }
}

fn host_port(url: &str) -> String {
    url.trim_start_matches("http://").to_string()
}

#[tokio::test]
async fn test_direct_egress_failure_is_fatal() {
    let pool = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&closed_port_url(), dir.path());

    let manager = ProxyManager::new(&proxy_config(&config, &pool.uri(), vec![])).unwrap();
    let mut portal = Portal::new(&config.portal, Some(manager)).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let mut failures: Vec<FailureLogEntry> = Vec::new();

    let mut engine = CrawlEngine::new(
        &config,
        &mut portal,
        &mut storage,
        &mut failures,
        BreakpointCursor::empty(),
    );
    let result = engine.run(beijing_task()).await;

    match result {
        Err(e @ HarvestError::DirectEgressFailed(_)) => assert!(e.is_fatal()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(failures.is_empty());

    let log = std::fs::read_to_string(dir.path().join("ip_failure.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("自身IP失败"));
}

#[tokio::test]
async fn test_connect_error_switches_proxy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let dead_proxy = host_port(&closed_port_url());

    Mock::given(method("GET"))
        .and(path("/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "proxy": dead_proxy })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/delete/"))
        .and(query_param("proxy", dead_proxy.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_page(vec![], false)))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = ProxyManager::new(&proxy_config(&config, &server.uri(), vec![])).unwrap();
    assert_eq!(manager.switch_proxy().await.as_deref(), Some(dead_proxy.as_str()));

    let mut portal = Portal::new(&config.portal, Some(manager)).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let mut failures: Vec<FailureLogEntry> = Vec::new();

    let mut engine = CrawlEngine::new(
        &config,
        &mut portal,
        &mut storage,
        &mut failures,
        BreakpointCursor::empty(),
    );
    engine.run(beijing_task()).await.unwrap();
    let stats = engine.into_stats();

    assert_eq!(stats.proxy_switches, 1);
    assert!(failures.is_empty());

    let manager = portal.proxy_manager().unwrap();
    assert_eq!(manager.current(), None);
    assert!(manager.is_failed(&dead_proxy));
}

#[tokio::test]
async fn test_initialize_exhausts_backups() {
    let pool = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&pool.uri(), dir.path());

    let first = host_port(&closed_port_url());
    let second = host_port(&closed_port_url());
    let mut manager = ProxyManager::new(&proxy_config(
        &config,
        &pool.uri(),
        vec![first.clone(), second.clone()],
    ))
    .unwrap();

    assert!(!manager.initialize().await);
    assert_eq!(manager.current(), None);
    assert!(manager.is_failed(&first));
    assert!(manager.is_failed(&second));
    assert!(!manager.should_use_proxy());
}

#[tokio::test]
async fn test_initialize_accepts_working_proxy() {
    let pool = MockServer::start().await;
    let proxy = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&pool.uri(), dir.path());
    let identity = host_port(&proxy.uri());

    Mock::given(method("GET"))
        .and(path("/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "proxy": identity })))
        .mount(&pool)
        .await;
    // Any forwarded request succeeds.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&proxy)
        .await;

    let mut manager = ProxyManager::new(&proxy_config(&config, &pool.uri(), vec![])).unwrap();

    assert!(manager.initialize().await);
    assert_eq!(manager.current(), Some(identity.as_str()));
    assert!(manager.should_use_proxy());
    assert_eq!(manager.proxy_url(), Some(format!("http://{}", identity)));
}

#[tokio::test]
async fn test_unusable_pool_proxy_falls_back_to_direct() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let dead_proxy = host_port(&closed_port_url());

    Mock::given(method("GET"))
        .and(path("/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "proxy": dead_proxy })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "proxy": "bad host:1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_page(vec![], false)))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = ProxyManager::new(&proxy_config(&config, &server.uri(), vec![])).unwrap();
    manager.switch_proxy().await;

    let mut portal = Portal::new(&config.portal, Some(manager)).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let mut failures: Vec<FailureLogEntry> = Vec::new();

    let mut engine = CrawlEngine::new(
        &config,
        &mut portal,
        &mut storage,
        &mut failures,
        BreakpointCursor::empty(),
    );
    engine.run(beijing_task()).await.unwrap();
    let stats = engine.into_stats();

    assert_eq!(stats.proxy_switches, 1);
    assert!(failures.is_empty());

    let manager = portal.proxy_manager().unwrap();
    assert_eq!(manager.current(), None);
    assert!(manager.is_failed(&dead_proxy));
    assert!(manager.is_failed("bad host:1"));
}
