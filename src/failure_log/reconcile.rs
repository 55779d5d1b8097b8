//! Replaying the failure log before a traversal
//!
//! Each reconcilable line is turned back into a task and run on a fresh
//! engine with an empty cursor and its own login guard. Lines whose replay
//! completes without new failures are dropped; everything else is kept
//! verbatim, and the file is rewritten atomically.

use crate::config::Config;
use crate::crawler::{BreakpointCursor, CrawlEngine, Portal};
use crate::failure_log::entry::{FailureLogEntry, NaturalKey};
use crate::failure_log::format::{inspect_line, LineKind};
use crate::failure_log::file::FailureLog;
use crate::storage::RecordSink;
use crate::HarvestError;
use std::collections::HashSet;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub lines: usize,
    pub replayed: usize,
    pub resolved: usize,
    pub retained: usize,
    pub duplicates: usize,
    pub unparseable: usize,
}

/// Replays every reconcilable entry and rewrites the log with what remains
///
/// A missing log file is a no-op. A fatal error aborts the pass and leaves the
/// file exactly as it was.
pub async fn reconcile(
    log: &FailureLog,
    config: &Config,
    portal: &mut Portal,
    sink: &mut dyn RecordSink,
) -> Result<ReconcileReport, HarvestError> {
    let Some(lines) = log.read_lines()? else {
        tracing::info!("No failure log at {}, nothing to reconcile", log.path().display());
        return Ok(ReconcileReport::default());
    };

    let mut report = ReconcileReport {
        lines: lines.len(),
        ..ReconcileReport::default()
    };
    let mut seen: HashSet<NaturalKey> = HashSet::new();
    let mut kept: Vec<String> = Vec::new();

    for line in lines {
        let entry = match inspect_line(&line) {
            LineKind::Reconcilable(entry) => entry,
            LineKind::Unparseable(reason) => {
                tracing::warn!("Keeping unreadable failure line: {}", reason);
                report.unparseable += 1;
                kept.push(line);
                continue;
            }
            LineKind::PassThrough => {
                kept.push(line);
                continue;
            }
        };

        if !seen.insert(entry.natural_key()) {
            tracing::debug!("Dropping duplicate failure line for {}", entry.request_type);
            report.duplicates += 1;
            continue;
        }

        if replay(&entry, config, portal, sink).await? {
            report.resolved += 1;
        } else {
            kept.push(line);
        }
        report.replayed += 1;
    }

    report.retained = kept.len();
    log.rewrite(&kept)?;

    tracing::info!(
        "Reconciled failure log: {} replayed, {} resolved, {} kept, {} duplicates dropped",
        report.replayed,
        report.resolved,
        report.retained,
        report.duplicates
    );

    Ok(report)
}

/// Runs one entry's task; `Ok(true)` when nothing failed along the way
async fn replay(
    entry: &FailureLogEntry,
    config: &Config,
    portal: &mut Portal,
    sink: &mut dyn RecordSink,
) -> Result<bool, HarvestError> {
    let Some(task) = entry.to_task() else {
        tracing::warn!("Cannot rebuild a task from {} entry", entry.request_type);
        return Ok(false);
    };

    tracing::info!("Replaying {}", task);
    let mut failures: Vec<FailureLogEntry> = Vec::new();
    let mut engine = CrawlEngine::new(
        config,
        portal,
        sink,
        &mut failures,
        BreakpointCursor::empty(),
    );
    engine.run(task).await?;
    drop(engine);

    Ok(failures.is_empty())
}
