//! Traversal, retry and breakpoint behaviour of the crawl engine

use crate::common::*;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yzw_harvest::crawler::{BreakpointCursor, CrawlEngine, Level, Portal};
use yzw_harvest::failure_log::{FailureKind, FailureLogEntry};
use yzw_harvest::storage::{RecordSink, SqliteStorage};
use yzw_harvest::HarvestError;

async fn mount_json(server: &MockServer, at: &str, body_part: Option<&str>, body: serde_json::Value) {
    let mut mock = Mock::given(method("POST")).and(path(at));
    if let Some(part) = body_part {
        mock = mock.and(body_string_contains(part));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_depth_first_harvest_across_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(&server, SCHOOL_LIST, Some("curPage=1"), list_page(vec![school("10001", "北京大学")], true)).await;
    mount_json(&server, SCHOOL_LIST, Some("curPage=2"), list_page(vec![school("10003", "清华大学")], false)).await;
    mount_json(&server, MAJOR_LIST, Some("dwdm=10001"), list_page(vec![major("10001", "081200", "计算机科学与技术")], false)).await;
    mount_json(&server, MAJOR_LIST, Some("dwdm=10003"), list_page(vec![major("10003", "085400", "电子信息")], false)).await;
    mount_json(
        &server,
        DETAIL,
        Some("dwdm=10001"),
        list_page(
            vec![
                detail("(01)计算机系统结构", "(101)思想政治理论"),
                detail("(02)计算机软件与理论", "(101)思想政治理论"),
            ],
            false,
        ),
    )
    .await;
    mount_json(&server, DETAIL, Some("dwdm=10003"), list_page(vec![detail("(00)不区分研究方向", "(101)思想政治理论")], false)).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(stats.records_written, 3);
    assert_eq!(stats.requests, 6);
    assert!(failures.is_empty());

    // Each school is fully descended before the next school-list page.
    let order: Vec<(String, bool)> = received(&server)
        .await
        .into_iter()
        .map(|(p, body)| (p, body.contains("dwdm=10003") || body.contains("curPage=2")))
        .collect();
    assert_eq!(
        order,
        vec![
            (SCHOOL_LIST.to_string(), false),
            (MAJOR_LIST.to_string(), false),
            (DETAIL.to_string(), false),
            (SCHOOL_LIST.to_string(), true),
            (MAJOR_LIST.to_string(), true),
            (DETAIL.to_string(), true),
        ]
    );

    let records = storage.all_records().unwrap();
    assert_eq!(records[0].school_name, "北京大学");
    assert_eq!(records[0].province, "北京");
    assert_eq!(records[0].degree_type, "学术学位");
    assert_eq!(records[2].school_name, "清华大学");
    assert_eq!(records[2].major_code, "085400");
}

#[tokio::test]
async fn test_second_run_writes_no_duplicates() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(&server, SCHOOL_LIST, None, list_page(vec![school("10001", "北京大学")], false)).await;
    mount_json(&server, MAJOR_LIST, None, list_page(vec![major("10001", "081200", "计算机科学与技术")], false)).await;
    mount_json(&server, DETAIL, None, list_page(vec![detail("(01)计算机系统结构", "(101)思想政治理论")], false)).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    for _ in 0..2 {
        let mut failures: Vec<FailureLogEntry> = Vec::new();
        let mut engine = CrawlEngine::new(
            &config,
            &mut portal,
            &mut storage,
            &mut failures,
            BreakpointCursor::empty(),
        );
        engine.run(beijing_task()).await.unwrap();
    }

    assert_eq!(storage.count_records().unwrap(), 1);
}

#[tokio::test]
async fn test_retry_ceiling_abandons_after_six_attempts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&server)
        .await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(stats.tasks_abandoned, 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].level(), Level::Province);
    assert_eq!(failures[0].request_type.kind, FailureKind::RetriesExhausted);
    assert_eq!(failures[0].province_code.as_deref(), Some("11"));
    assert_eq!(failures[0].params.get("ssdm").map(String::as_str), Some("11"));
}

#[tokio::test]
async fn test_login_prompt_limit_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(&server, SCHOOL_LIST, None, refusal("请登录")).await;
    Mock::given(method("GET"))
        .and(path(KEEPALIVE))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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
        Err(e @ HarvestError::LoginLimitExceeded { prompts: 10 }) => assert!(e.is_fatal()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(hits(&server, SCHOOL_LIST).await, 10);
    assert_eq!(hits(&server, KEEPALIVE).await, 9);
    assert!(failures.is_empty());
}

#[tokio::test]
async fn test_login_prompt_retries_same_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(refusal("请登录")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(&server, SCHOOL_LIST, None, list_page(vec![], false)).await;
    Mock::given(method("GET"))
        .and(path(KEEPALIVE))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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
    assert_eq!(engine.stats().login_prompts, 1);

    let bodies: Vec<String> = received(&server)
        .await
        .into_iter()
        .filter(|(p, _)| p == SCHOOL_LIST)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_rate_limit_backoff_is_linear() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(refusal("访问太频繁，请稍后再试")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_json(&server, SCHOOL_LIST, None, list_page(vec![], false)).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(
        stats.rate_limit_backoffs,
        vec![Duration::from_millis(2), Duration::from_millis(4)]
    );
    assert_eq!(stats.requests, 3);
    assert!(failures.is_empty());
}

#[tokio::test]
async fn test_retried_page_does_not_continue_paging() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(SCHOOL_LIST))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(&server, SCHOOL_LIST, None, list_page(vec![], true)).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    let requests = received(&server).await;
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|(_, body)| body.contains("curPage=1")));
}

#[tokio::test]
async fn test_malformed_payloads_are_abandoned_without_retry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(&server, SCHOOL_LIST, None, list_page(vec![school("10001", "北京大学"), school("10002", "中国人民大学")], false)).await;
    Mock::given(method("POST"))
        .and(path(MAJOR_LIST))
        .and(body_string_contains("dwdm=10001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    mount_json(&server, MAJOR_LIST, Some("dwdm=10002"), refusal("系统繁忙")).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(hits(&server, MAJOR_LIST).await, 2);
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].request_type.to_string(), "major_list_missing_flag");
    assert_eq!(failures[1].request_type.to_string(), "major_list_malformed");
    assert_eq!(failures[1].params.get("dwmc").map(String::as_str), Some("中国人民大学"));
}

#[tokio::test]
async fn test_detail_failure_does_not_abort_siblings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(&server, SCHOOL_LIST, None, list_page(vec![school("10001", "北京大学")], false)).await;
    mount_json(
        &server,
        MAJOR_LIST,
        None,
        list_page(
            vec![
                major("10001", "081200", "计算机科学与技术"),
                major("10001", "085400", "电子信息"),
            ],
            false,
        ),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(DETAIL))
        .and(body_string_contains("zydm=081200"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    mount_json(&server, DETAIL, Some("zydm=085400"), list_page(vec![detail("(00)不区分研究方向", "(101)思想政治理论")], false)).await;

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(storage.count_records().unwrap(), 1);
    assert_eq!(failures.len(), 1);

    let failure = &failures[0];
    assert_eq!(failure.request_type.to_string(), "major_detail");
    assert_eq!(failure.xwlxmc.as_deref(), Some("学术学位"));
    assert_eq!(failure.province_code.as_deref(), Some("11"));
    assert_eq!(failure.params.get("zydm").map(String::as_str), Some("081200"));
    assert_eq!(failure.params.get("dwmc").map(String::as_str), Some("北京大学"));
}

#[tokio::test]
async fn test_breakpoint_skips_earlier_siblings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    mount_json(
        &server,
        SCHOOL_LIST,
        None,
        list_page(
            vec![
                school("10001", "北京大学"),
                school("10002", "中国人民大学"),
                school("10003", "清华大学"),
            ],
            false,
        ),
    )
    .await;
    mount_json(
        &server,
        MAJOR_LIST,
        None,
        list_page(
            vec![
                major("10002", "010100", "哲学"),
                major("10002", "020100", "理论经济学"),
            ],
            false,
        ),
    )
    .await;
    mount_json(&server, DETAIL, None, list_page(vec![], false)).await;

    let cursor = BreakpointCursor::new(
        Some("北京".to_string()),
        Some("中国人民大学".to_string()),
        Some("020100".to_string()),
    );

    let mut portal = Portal::new(&config.portal, None).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let mut failures: Vec<FailureLogEntry> = Vec::new();

    let mut engine = CrawlEngine::new(&config, &mut portal, &mut storage, &mut failures, cursor);
    engine.run(beijing_task()).await.unwrap();

    let requests = received(&server).await;
    let major_lists: Vec<&String> = requests
        .iter()
        .filter(|(p, _)| p == MAJOR_LIST)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(major_lists.len(), 2);
    assert!(major_lists[0].contains("dwdm=10002"));
    assert!(major_lists[1].contains("dwdm=10003"));

    // 010100 is skipped for 中国人民大学; once 020100 latches, every later major passes.
    let details: Vec<&String> = requests
        .iter()
        .filter(|(p, _)| p == DETAIL)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(details.len(), 3);
    assert!(details[0].contains("zydm=020100"));
}

#[tokio::test]
async fn test_transport_errors_abandon_without_proxy() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&closed_port_url(), dir.path());

    let mut portal = Portal::new(&config.portal, None).unwrap();
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

    assert_eq!(stats.requests, 4);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].request_type.kind, FailureKind::Transport);
}
