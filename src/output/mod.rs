//! Output module for harvest summaries
//!
//! This module handles:
//! - Database and failure-log statistics for `--stats`
//! - The end-of-run summary of a traversal

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::crawler::CrawlStats;

/// Prints the counters of a finished run
pub fn print_run_summary(stats: &CrawlStats) {
    println!("=== Harvest Run ===\n");
    println!("  Requests: {}", stats.requests);
    println!("  Pages: {}", stats.pages);
    println!("  Records written: {}", stats.records_written);
    println!("  Duplicates ignored: {}", stats.duplicates);
    println!("  Tasks abandoned: {}", stats.tasks_abandoned);
    println!("  Login prompts: {}", stats.login_prompts);
    println!("  Proxy switches: {}", stats.proxy_switches);
    if !stats.rate_limit_backoffs.is_empty() {
        let total: std::time::Duration = stats.rate_limit_backoffs.iter().sum();
        println!(
            "  Rate-limit backoffs: {} ({:.1}s total)",
            stats.rate_limit_backoffs.len(),
            total.as_secs_f64()
        );
    }
}
