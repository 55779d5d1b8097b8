//! Crawler module for the catalogue traversal
//!
//! This module contains the core crawling logic, including:
//! - The province table and breakpoint cursor
//! - Task and response classification types
//! - Portal HTTP access and request pacing
//! - The crawl engine and the top-level harvest run

mod classify;
mod cursor;
mod engine;
mod pacer;
mod payload;
mod portal;
pub mod provinces;
pub mod task;

pub use classify::{
    ListPayload, MalformedKind, ResponseClassification, ResponseClassifier, TransportFailure,
    LOGIN_PROMPT,
};
pub use cursor::BreakpointCursor;
pub use engine::{CrawlEngine, CrawlStats, LoginGuard};
pub use pacer::Pacer;
pub use payload::{major_from_item, record_from_detail, school_from_item};
pub use portal::{build_http_client, Portal, KEEPALIVE_PATH};
pub use provinces::{all_provinces, province_by_code, province_by_name, Province};
pub use task::{CrawlTask, Level, MajorRef, ProvinceRef, SchoolRef, TaskKind};

use crate::config::Config;
use crate::failure_log::{reconcile, FailureLog};
use crate::proxy::ProxyManager;
use crate::session;
use crate::storage::{open_storage, RecordSink};
use crate::HarvestError;
use std::path::Path;

/// Where the traversal starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeMode {
    /// From the first province, skipping nothing
    Fresh,
    /// From the most recently stored record
    FromStorage,
    /// From an operator-supplied position
    Manual {
        province: String,
        school_name: Option<String>,
        major_code: Option<String>,
    },
}

/// Run-level switches, usually from the command line
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub resume: ResumeMode,
    pub use_proxy: bool,
    pub reconcile: bool,
    pub cookie: Option<String>,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            resume: ResumeMode::FromStorage,
            use_proxy: true,
            reconcile: true,
            cookie: None,
        }
    }
}

fn valid_province_names() -> String {
    all_provinces().map(|p| p.name).collect::<Vec<_>>().join(", ")
}

/// Builds the breakpoint cursor for a run
///
/// A manual or stored province must be in the province table; otherwise the
/// traversal would skip everything.
pub fn resolve_cursor(
    mode: &ResumeMode,
    sink: &dyn RecordSink,
) -> Result<BreakpointCursor, HarvestError> {
    let cursor = match mode {
        ResumeMode::Fresh => BreakpointCursor::empty(),
        ResumeMode::FromStorage => match sink.last_record()? {
            Some(point) => {
                tracing::info!(
                    "Resuming after {} / {} / {}",
                    point.province,
                    point.school_name,
                    point.major_code
                );
                BreakpointCursor::from(point)
            }
            None => {
                tracing::info!("No stored records, starting from the first province");
                BreakpointCursor::empty()
            }
        },
        ResumeMode::Manual {
            province,
            school_name,
            major_code,
        } => BreakpointCursor::new(
            Some(province.clone()),
            school_name.clone(),
            major_code.clone(),
        ),
    };

    if let Some(province) = cursor.province() {
        if province_by_name(province).is_none() {
            return Err(HarvestError::InvalidBreakpoint(format!(
                "unknown province '{}'; valid provinces: {}",
                province,
                valid_province_names()
            )));
        }
    }

    Ok(cursor)
}

/// Runs a complete harvest
///
/// This is the main entry point. It will:
/// 1. Open the record sink and build the breakpoint cursor
/// 2. Initialize the proxy ladder if enabled
/// 3. Establish the portal session
/// 4. Replay the failure log
/// 5. Traverse every province from the cursor onwards
///
/// # Returns
///
/// * `Ok(CrawlStats)` - The traversal finished
/// * `Err(HarvestError)` - Setup failed or a fatal condition stopped the run
pub async fn run_harvest(
    config: Config,
    options: HarvestOptions,
) -> Result<CrawlStats, HarvestError> {
    let mut storage = open_storage(Path::new(&config.database.path))?;
    let cursor = resolve_cursor(&options.resume, &storage)?;

    let proxy = if options.use_proxy && config.proxy.enabled {
        let mut manager = ProxyManager::new(&config.proxy)?;
        if !manager.initialize().await {
            tracing::warn!("No working proxy found, starting on direct egress");
        }
        Some(manager)
    } else {
        tracing::info!("Proxy disabled, using direct egress");
        None
    };

    let mut portal = Portal::new(&config.portal, proxy)?;
    session::establish(&mut portal, &config.session, options.cookie.as_deref()).await?;

    let mut failure_log = FailureLog::from_config(&config.failure_log);

    if options.reconcile {
        tracing::info!("Replaying failure log {}", failure_log.path().display());
        reconcile(&failure_log, &config, &mut portal, &mut storage).await?;
    }

    let mut engine = CrawlEngine::new(&config, &mut portal, &mut storage, &mut failure_log, cursor);
    engine.crawl_provinces(all_provinces()).await?;
    let stats = engine.into_stats();

    tracing::info!(
        "Harvest complete: {} requests, {} records written, {} duplicates, {} tasks abandoned",
        stats.requests,
        stats.records_written,
        stats.duplicates,
        stats.tasks_abandoned
    );

    Ok(stats)
}
