//! Statistics over the harvested database and the failure log
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::failure_log::{inspect_line, FailureLog, LineKind};
use crate::storage::RecordSink;
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Number of distinct schools with at least one record
    pub schools: u64,

    /// Records per province, ordered by province name
    pub by_province: Vec<(String, u64)>,

    /// Failure log lines still waiting to be replayed
    pub pending_failures: usize,
}

/// Loads statistics from storage and the failure log
pub fn load_statistics(
    sink: &dyn RecordSink,
    failure_log: &FailureLog,
) -> Result<HarvestStatistics, HarvestError> {
    let pending_failures = failure_log
        .read_lines()?
        .unwrap_or_default()
        .iter()
        .filter(|line| matches!(inspect_line(line), LineKind::Reconcilable(_)))
        .count();

    Ok(HarvestStatistics {
        total_records: sink.count_records()?,
        schools: sink.count_schools()?,
        by_province: sink.count_by_province()?,
        pending_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Schools: {}", stats.schools);
    println!("  Pending failures: {}", stats.pending_failures);
    println!();

    if !stats.by_province.is_empty() {
        println!("Records by Province:");
        let mut counts: Vec<_> = stats.by_province.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        for (province, count) in counts {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", province, count, percentage);
        }
        println!();
    }
}
