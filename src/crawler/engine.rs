//! Crawl engine - the traversal loop
//!
//! This module contains the loop that walks the catalogue, including:
//! - Depth-first traversal over an explicit task stack
//! - Applying the breakpoint cursor at the school and major levels
//! - Mapping each response classification to a retry, backoff or abandonment
//! - The login-prompt guard and proxy escalation
//!
//! # Action table
//!
//! | Classification | Action |
//! |----------------|--------|
//! | `Success` | process items, then queue the next page if `continue_paging` |
//! | `NeedLogin` | login-prompt handler, retry unchanged |
//! | `RateLimited` | sleep `2 × retry` units, retry same page |
//! | `HttpError` | retry same page |
//! | `MalformedPayload` | record failure, abandon |
//! | `TransportError` | switch proxy, or flat-delay retry up to the transport ceiling |
//!
//! A task whose retry count exceeds the ceiling is recorded and abandoned
//! before any request is made.

use crate::config::{Config, RetryConfig};
use crate::crawler::classify::{
    ListPayload, MalformedKind, ResponseClassification, ResponseClassifier, TransportFailure,
};
use crate::crawler::cursor::BreakpointCursor;
use crate::crawler::pacer::{self, Pacer};
use crate::crawler::payload::{major_from_item, record_from_detail, school_from_item};
use crate::crawler::portal::Portal;
use crate::crawler::provinces::Province;
use crate::crawler::task::{CrawlTask, Level, MajorRef, ProvinceRef, TaskKind};
use crate::failure_log::{FailureKind, FailureLogEntry, FailureRecorder, RequestType};
use crate::storage::RecordSink;
use crate::HarvestError;
use chrono::Local;
use std::time::Duration;

/// Counters for one engine's lifetime
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub requests: u64,
    pub pages: u64,
    pub records_written: u64,
    pub duplicates: u64,
    pub tasks_abandoned: u64,
    pub login_prompts: u32,
    pub proxy_switches: u32,
    /// Every rate-limit backoff slept, in order
    pub rate_limit_backoffs: Vec<Duration>,
}

/// Counts login prompts and ends the run at the configured limit
#[derive(Debug, Clone)]
pub struct LoginGuard {
    prompts: u32,
    limit: u32,
}

impl LoginGuard {
    pub fn new(limit: u32) -> Self {
        Self { prompts: 0, limit }
    }

    pub fn prompts(&self) -> u32 {
        self.prompts
    }

    /// Registers one prompt; errors once the count reaches the limit
    pub fn register(&mut self) -> Result<u32, HarvestError> {
        self.prompts += 1;
        if self.prompts >= self.limit {
            return Err(HarvestError::LoginLimitExceeded {
                prompts: self.prompts,
            });
        }
        Ok(self.prompts)
    }
}

/// Walks the catalogue and writes records to a sink
///
/// One engine is one crawl session: the login guard and the cursor latches
/// live as long as the engine does.
pub struct CrawlEngine<'a> {
    portal: &'a mut Portal,
    sink: &'a mut dyn RecordSink,
    failures: &'a mut dyn FailureRecorder,
    cursor: BreakpointCursor,
    classifier: ResponseClassifier,
    pacer: Pacer,
    retry: RetryConfig,
    login: LoginGuard,
    stats: CrawlStats,
}

impl<'a> CrawlEngine<'a> {
    pub fn new(
        config: &Config,
        portal: &'a mut Portal,
        sink: &'a mut dyn RecordSink,
        failures: &'a mut dyn FailureRecorder,
        cursor: BreakpointCursor,
    ) -> Self {
        let classifier = ResponseClassifier::new(portal.config().rate_limit_message.clone());

        Self {
            portal,
            sink,
            failures,
            cursor,
            classifier,
            pacer: Pacer::new(&config.interval, &config.retry),
            retry: config.retry.clone(),
            login: LoginGuard::new(config.retry.login_prompt_limit),
            stats: CrawlStats::default(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }

    pub fn cursor(&self) -> &BreakpointCursor {
        &self.cursor
    }

    /// Crawls provinces in order, skipping those before the cursor's province
    pub async fn crawl_provinces<I>(&mut self, provinces: I) -> Result<(), HarvestError>
    where
        I: IntoIterator<Item = &'static Province>,
    {
        let mut reached = self.cursor.province().is_none();

        for province in provinces {
            if !reached {
                if Some(province.name) == self.cursor.province() {
                    reached = true;
                } else {
                    tracing::debug!("Skipping {} before breakpoint", province.name);
                    continue;
                }
            }

            self.crawl_province(province).await?;
        }

        Ok(())
    }

    /// Crawls every school, major and detail of one province
    pub async fn crawl_province(&mut self, province: &Province) -> Result<(), HarvestError> {
        tracing::info!("Crawling province {} ({})", province.name, province.code);
        let root = CrawlTask::province(ProvinceRef {
            code: province.code.to_string(),
            name: province.name.to_string(),
        });
        self.run(root).await?;
        tracing::info!(
            "Finished {}: {} records written, {} duplicates, {} tasks abandoned",
            province.name,
            self.stats.records_written,
            self.stats.duplicates,
            self.stats.tasks_abandoned
        );
        Ok(())
    }

    /// Runs a task and all of its descendants depth-first
    ///
    /// Only fatal errors are returned; every other failure is recorded and
    /// the traversal moves on to the next sibling.
    pub async fn run(&mut self, root: CrawlTask) -> Result<(), HarvestError> {
        let mut stack = vec![root];

        while let Some(task) = stack.pop() {
            let follow_ups = self.step(task).await?;
            // Reversed so the first child is popped first and the next page after all children.
            stack.extend(follow_ups.into_iter().rev());
        }

        Ok(())
    }

    async fn step(&mut self, task: CrawlTask) -> Result<Vec<CrawlTask>, HarvestError> {
        if task.retry > self.retry.max_retries {
            tracing::warn!("Too many retries, giving up on {}", task);
            self.abandon(&task, FailureKind::RetriesExhausted);
            return Ok(Vec::new());
        }

        self.pacer.pause().await;

        let form = task.form(self.portal.config());
        self.stats.requests += 1;
        let outcome = self.portal.post_form(task.level(), &form).await;

        match self.classifier.classify(outcome) {
            ResponseClassification::Success(payload) => Ok(self.on_success(task, payload)),
            ResponseClassification::NeedLogin => {
                self.on_login_prompt().await?;
                Ok(vec![task])
            }
            ResponseClassification::RateLimited => {
                let retry = task.retry_same_page();
                let backoff = self.pacer.rate_limit_backoff(retry.retry);
                tracing::warn!("Rate limited on {}, backing off {:?}", retry, backoff);
                self.stats.rate_limit_backoffs.push(backoff);
                pacer::sleep(backoff).await;
                Ok(vec![retry])
            }
            ResponseClassification::HttpError(status) => {
                tracing::warn!("HTTP {} for {}, retrying", status, task);
                Ok(vec![task.retry_same_page()])
            }
            ResponseClassification::MalformedPayload(kind) => {
                let failure = match kind {
                    MalformedKind::MissingFlag => {
                        tracing::warn!("Response for {} has no flag", task);
                        FailureKind::MissingFlag
                    }
                    MalformedKind::UnexpectedShape(detail) => {
                        tracing::warn!("Unexpected response for {}: {}", task, detail);
                        FailureKind::Malformed
                    }
                };
                self.abandon(&task, failure);
                Ok(Vec::new())
            }
            ResponseClassification::TransportError(failure) => {
                self.on_transport_failure(task, failure).await
            }
        }
    }

    fn on_success(&mut self, task: CrawlTask, payload: ListPayload) -> Vec<CrawlTask> {
        self.stats.pages += 1;

        let children = match &task.kind {
            TaskKind::Province(province) => payload
                .items
                .iter()
                .map(|item| school_from_item(item, province))
                .collect::<Option<Vec<_>>>()
                .map(|schools| {
                    schools
                        .into_iter()
                        .filter(|s| self.cursor.should_process(Level::School, &s.name))
                        .map(CrawlTask::school)
                        .collect::<Vec<_>>()
                }),
            TaskKind::School(school) => payload
                .items
                .iter()
                .map(|item| major_from_item(item, school))
                .collect::<Option<Vec<_>>>()
                .map(|majors| {
                    majors
                        .into_iter()
                        .filter(|m| self.cursor.should_process(Level::Major, &m.code))
                        .map(CrawlTask::major)
                        .collect::<Vec<_>>()
                }),
            TaskKind::Major(major) => {
                let major = major.clone();
                self.store_details(&task, &major, &payload);
                return Vec::new();
            }
        };

        let Some(mut follow_ups) = children else {
            tracing::warn!("List for {} contains non-object items", task);
            self.abandon(&task, FailureKind::Malformed);
            return Vec::new();
        };

        tracing::debug!("{}: {} children", task, follow_ups.len());

        if payload.next_page_available && task.continue_paging {
            follow_ups.push(task.next_page());
        }

        follow_ups
    }

    fn store_details(&mut self, task: &CrawlTask, major: &MajorRef, payload: &ListPayload) {
        for item in &payload.items {
            let Some(record) = record_from_detail(item, major) else {
                tracing::warn!("Skipping non-object detail item for {}", task);
                continue;
            };

            match self.sink.upsert_record(&record) {
                Ok(true) => {
                    self.stats.records_written += 1;
                    tracing::debug!(
                        "Stored {} {} {}",
                        record.school_name,
                        record.major_code,
                        record.research_direction
                    );
                }
                Ok(false) => self.stats.duplicates += 1,
                Err(e) => {
                    tracing::error!("Failed to store detail for {}: {}", task, e);
                    self.abandon(task, FailureKind::Storage);
                    return;
                }
            }
        }
    }

    async fn on_login_prompt(&mut self) -> Result<(), HarvestError> {
        let prompts = match self.login.register() {
            Ok(prompts) => prompts,
            Err(e) => {
                self.stats.login_prompts = self.login.prompts();
                tracing::error!("Portal keeps asking for login, stopping");
                return Err(e);
            }
        };
        self.stats.login_prompts = prompts;
        tracing::warn!("Portal asked for login ({} so far), refreshing session", prompts);

        self.pacer.pause().await;
        if let Err(e) = self.portal.touch_session().await {
            tracing::warn!("Keepalive request failed: {}", e);
        }
        self.pacer.pause().await;

        Ok(())
    }

    async fn on_transport_failure(
        &mut self,
        mut task: CrawlTask,
        failure: TransportFailure,
    ) -> Result<Vec<CrawlTask>, HarvestError> {
        if let TransportFailure::Connect(error) = &failure {
            if self.portal.has_proxy_manager() {
                tracing::warn!("Connect error on {}: {}", task, error);
                self.portal.escalate_connect_failure(error).await?;
                self.stats.proxy_switches += 1;
                return Ok(vec![task]);
            }
        }

        task.transport_retry += 1;
        if task.transport_retry > self.retry.max_transport_retries {
            tracing::warn!("{} on {}, giving up after {} attempts", failure, task, task.transport_retry);
            self.abandon(&task, FailureKind::Transport);
            return Ok(Vec::new());
        }

        tracing::warn!(
            "{} on {}, retry {}/{}",
            failure,
            task,
            task.transport_retry,
            self.retry.max_transport_retries
        );
        pacer::sleep(self.pacer.transport_retry_delay()).await;
        Ok(vec![task])
    }

    fn abandon(&mut self, task: &CrawlTask, kind: FailureKind) {
        self.stats.tasks_abandoned += 1;

        let xwlxmc = match &task.kind {
            TaskKind::Major(major) => major.degree_type.clone(),
            _ => None,
        };

        self.failures.record(FailureLogEntry {
            timestamp: Local::now().naive_local(),
            request_type: RequestType {
                level: task.level(),
                kind,
            },
            params: task.params(self.portal.config()),
            xwlxmc,
            province_code: task.province_ref().map(|p| p.code.clone()),
        });
    }
}
