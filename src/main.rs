//! yzw-harvest main entry point
//!
//! This is the command-line interface for the catalogue harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use yzw_harvest::config::{load_config_with_hash, Config};
use yzw_harvest::crawler::{
    all_provinces, resolve_cursor, run_harvest, BreakpointCursor, HarvestOptions, ResumeMode,
};
use yzw_harvest::failure_log::FailureLog;
use yzw_harvest::output::{load_statistics, print_run_summary, print_statistics};
use yzw_harvest::storage::SqliteStorage;

/// yzw-harvest: a resumable admissions catalogue harvester
///
/// Walks every province, school, major and detail page of the portal,
/// stores normalized records in SQLite and replays previously failed
/// requests before each run.
#[derive(Parser, Debug)]
#[command(name = "yzw-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable admissions catalogue harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from the first province, ignoring stored records
    #[arg(long, conflicts_with = "province")]
    fresh: bool,

    /// Resume from this province instead of the last stored record
    #[arg(long, value_name = "NAME")]
    province: Option<String>,

    /// School name to resume from within the province
    #[arg(long, value_name = "NAME", requires = "province")]
    school: Option<String>,

    /// Major code to resume from within the school
    #[arg(long, value_name = "CODE", requires = "province")]
    major: Option<String>,

    /// Session cookie string (`k=v; k2=v2`), overrides the config
    #[arg(long, value_name = "COOKIE")]
    cookie: Option<String>,

    /// Never route through proxies, even if enabled in the config
    #[arg(long)]
    no_proxy: bool,

    /// Skip replaying the failure log before the traversal
    #[arg(long)]
    skip_reconcile: bool,

    /// Validate config and show what would be harvested without making requests
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and failure log, then exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn resume_mode(&self) -> ResumeMode {
        if self.fresh {
            ResumeMode::Fresh
        } else if let Some(province) = &self.province {
            ResumeMode::Manual {
                province: province.clone(),
                school_name: self.school.clone(),
                major_code: self.major.clone(),
            }
        } else {
            ResumeMode::FromStorage
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        return handle_dry_run(&config, &cli);
    }

    if cli.stats {
        return handle_stats(&config);
    }

    let options = HarvestOptions {
        resume: cli.resume_mode(),
        use_proxy: !cli.no_proxy,
        reconcile: !cli.skip_reconcile,
        cookie: cli.cookie.clone(),
    };

    match run_harvest(config, options).await {
        Ok(stats) => {
            if !cli.quiet {
                print_run_summary(&stats);
            }
            Ok(())
        }
        Err(e) => {
            if e.is_fatal() {
                tracing::error!("Harvest stopped: {}", e);
            } else {
                tracing::error!("Harvest failed: {}", e);
            }
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("yzw_harvest=info,warn"),
            1 => EnvFilter::new("yzw_harvest=debug,info"),
            2 => EnvFilter::new("yzw_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration and starting point
fn handle_dry_run(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    println!("=== yzw-harvest Dry Run ===\n");

    println!("Portal:");
    println!("  Base URL: {}", config.portal.base_url);
    println!(
        "  Page size: {} (details: {})",
        config.portal.page_size, config.portal.detail_page_size
    );
    println!(
        "  Timeouts: connect {}s, request {}s",
        config.portal.connect_timeout_seconds, config.portal.request_timeout_seconds
    );

    println!("\nPacing:");
    println!("  Interval: {}s ±20%", config.interval.seconds);
    println!(
        "  Retries: {} portal, {} transport",
        config.retry.max_retries, config.retry.max_transport_retries
    );
    println!("  Login prompt limit: {}", config.retry.login_prompt_limit);

    println!("\nProxy:");
    if config.proxy.enabled && !cli.no_proxy {
        println!("  Pool: {}", config.proxy.pool_url);
        println!("  Backups: {}", config.proxy.backup.join(", "));
    } else {
        println!("  Disabled (direct egress)");
    }

    println!("\nOutput:");
    println!("  Database: {}", config.database.path);
    println!(
        "  Failure log: {} ({:?})",
        config.failure_log.path, config.failure_log.format
    );

    let mode = cli.resume_mode();
    let db_path = Path::new(&config.database.path);
    // Only a stored breakpoint needs the real database; never create one here.
    let cursor = match (&mode, db_path.exists()) {
        (ResumeMode::FromStorage, false) => BreakpointCursor::empty(),
        (ResumeMode::FromStorage, true) => {
            let storage = SqliteStorage::new(db_path).context("failed to open database")?;
            resolve_cursor(&mode, &storage)?
        }
        _ => resolve_cursor(&mode, &SqliteStorage::new_in_memory()?)?,
    };

    println!("\nStart: {:?}", mode);
    if cursor.is_empty() {
        println!("  Breakpoint: none, first province");
    } else {
        println!(
            "  Breakpoint: {} / {} / {}",
            cursor.province().unwrap_or("-"),
            cursor.school_name().unwrap_or("-"),
            cursor.major_code().unwrap_or("-")
        );
    }
    println!("Provinces: {}", all_provinces().count());
    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path);

    let storage = SqliteStorage::new(Path::new(&config.database.path))
        .context("failed to open database")?;
    let failure_log = FailureLog::from_config(&config.failure_log);

    let stats = load_statistics(&storage, &failure_log)?;
    print_statistics(&stats);

    Ok(())
}
