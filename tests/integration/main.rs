//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the portal, the proxy pool and
//! the login page, and exercise the crawl engine end-to-end.

mod common;
mod crawl_tests;
mod proxy_tests;
