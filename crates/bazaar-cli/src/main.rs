//! Bazaarwatch command-line shell.
//!
//! This is a thin wrapper over `bazaar-engine`: it parses arguments, loads
//! configuration, wires the production collaborators and prints the run
//! summary. Core logic lives in the `crates/` library crates.

use anyhow::{bail, Context, Result};
use bazaar_browser::{ChromiumLauncher, PoolRegistry};
use bazaar_core::{AppConfig, HighscoreSlice, ScanKind};
use bazaar_engine::{
    start_scan, DelayProfile, RecordStore, RunSummary, ScanDirection, ScanOptions, ScanSpace,
};
use bazaar_store::Database;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "bazaarwatch", version, about = "Scraper for the character bazaar")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scan and print its summary
    Scan(ScanArgs),
    /// Write the default configuration file and print its path
    InitConfig,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// What to scan: current, history, highscores, or bans
    kind: String,

    /// Resume from the persisted checkpoint
    #[arg(long)]
    resume: bool,

    /// First id for id-space scans (defaults to one past the highest known)
    #[arg(long)]
    start: Option<u64>,

    /// Exclusive stop id for id-space scans
    #[arg(long)]
    end: Option<u64>,

    /// Walk the id space downwards
    #[arg(long)]
    descending: bool,

    /// Stop after saving this many new items
    #[arg(long)]
    max_items: Option<u64>,

    /// Consecutive not-found ceiling for id-space scans
    #[arg(long)]
    ceiling: Option<u32>,

    /// Delay profile: fast, normal, or slow
    #[arg(long, default_value = "normal")]
    profile: String,

    /// Concurrent sessions for this scan (pool size K)
    #[arg(long)]
    pool_size: Option<usize>,

    /// Consecutive hard failures before a session is replaced
    #[arg(long)]
    replace_after: Option<u32>,

    /// Replacement rounds before the whole pool is restarted
    #[arg(long)]
    restart_rounds: Option<u32>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Worlds for highscore/ban scans (repeatable; defaults from config)
    #[arg(long = "world")]
    worlds: Vec<String>,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn build_options(args: &ScanArgs, config: &AppConfig) -> Result<ScanOptions> {
    let kind: ScanKind = args.kind.parse().context("invalid scan kind")?;

    let worlds = if args.worlds.is_empty() {
        config.scanning.worlds.clone()
    } else {
        args.worlds.clone()
    };
    if worlds.is_empty() && matches!(kind, ScanKind::Highscores | ScanKind::BanList) {
        bail!("no worlds configured; pass --world or set scanning.worlds");
    }

    let space = match kind {
        ScanKind::CurrentAuctions => ScanSpace::Pages { start: 1 },
        ScanKind::AuctionHistory => ScanSpace::Ids {
            start: args.start,
            end: args.end,
            direction: if args.descending {
                ScanDirection::Descending
            } else {
                ScanDirection::Ascending
            },
        },
        ScanKind::Highscores => ScanSpace::Slices(HighscoreSlice::combinations(&worlds)),
        ScanKind::BanList => ScanSpace::Worlds(worlds),
    };

    let mut opts = ScanOptions::for_kind(kind, space, config);
    opts.resume = args.resume;
    opts.max_new_items = args.max_items;
    if let Some(ceiling) = args.ceiling {
        opts.not_found_ceiling = ceiling;
    }
    let profile: DelayProfile = args.profile.parse().context("invalid delay profile")?;
    opts.profile = profile;
    if let Some(size) = args.pool_size {
        opts.batch_size = size.clamp(1, 8);
    }
    if let Some(replace_after) = args.replace_after {
        opts.replace_after = replace_after;
    }
    if let Some(rounds) = args.restart_rounds {
        opts.restart_after_rounds = rounds;
    }
    Ok(opts)
}

fn print_summary(summary: &RunSummary) {
    println!("scan:      {}", summary.kind);
    println!("result:    {}", summary.termination);
    println!("saved:     {}", summary.saved);
    println!("skipped:   {}", summary.skipped);
    println!("not found: {}", summary.not_found);
    println!("cursor:    {}", summary.last_cursor);
    if let Some(archived) = summary.archived {
        println!("archived:  {archived}");
    }
    if !summary.termination.is_complete() {
        println!("re-run with --resume to continue from the checkpoint");
    }
}

async fn run_scan(args: &ScanArgs) -> Result<()> {
    let mut config = AppConfig::load_with_env().context("loading configuration")?;
    if args.headed {
        config.browser.headless = false;
    }
    let opts = build_options(args, &config)?;

    let db_path = config.storage.resolved_database_path()?;
    let store = Arc::new(
        Database::open(&db_path)
            .await
            .with_context(|| format!("opening database at {}", db_path.display()))?,
    );

    let profile_root = AppConfig::data_dir()?.join("sessions");
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone(), profile_root));
    let registry = PoolRegistry::new(launcher);

    // Ctrl-C cancels between batches; the checkpoint stays consistent
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current batch");
            ctrl_c_token.cancel();
        }
    });

    let summary = start_scan(
        &config,
        &registry,
        store as Arc<dyn RecordStore>,
        opts,
        &cancel,
    )
    .await?;
    print_summary(&summary);
    Ok(())
}

fn init_config() -> Result<()> {
    let config = AppConfig::load().unwrap_or_default();
    config.save().context("writing configuration")?;
    println!("{}", AppConfig::config_path()?.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match &cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::InitConfig => init_config(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_args(kind: &str) -> ScanArgs {
        ScanArgs {
            kind: kind.to_string(),
            resume: false,
            start: None,
            end: None,
            descending: false,
            max_items: None,
            ceiling: None,
            profile: "normal".to_string(),
            pool_size: None,
            replace_after: None,
            restart_rounds: None,
            headed: false,
            worlds: vec![],
        }
    }

    #[test]
    fn test_build_options_for_history() {
        let config = AppConfig::default();
        let mut args = scan_args("history");
        args.start = Some(500);
        args.end = Some(600);
        args.ceiling = Some(25);

        let opts = build_options(&args, &config).expect("options");
        assert_eq!(opts.kind, ScanKind::AuctionHistory);
        assert_eq!(opts.not_found_ceiling, 25);
        assert!(matches!(
            opts.space,
            ScanSpace::Ids {
                start: Some(500),
                end: Some(600),
                direction: ScanDirection::Ascending
            }
        ));
    }

    #[test]
    fn test_build_options_rejects_unknown_kind() {
        let config = AppConfig::default();
        assert!(build_options(&scan_args("frontier"), &config).is_err());
    }

    #[test]
    fn test_highscores_need_worlds() {
        let mut config = AppConfig::default();
        config.scanning.worlds.clear();
        assert!(build_options(&scan_args("highscores"), &config).is_err());

        let mut args = scan_args("highscores");
        args.worlds = vec!["Antica".to_string()];
        let opts = build_options(&args, &config).expect("options");
        match opts.space {
            ScanSpace::Slices(slices) => assert_eq!(slices.len(), 20),
            other => panic!("expected slices, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_scan_command() {
        let cli = Cli::try_parse_from([
            "bazaarwatch",
            "scan",
            "history",
            "--resume",
            "--start",
            "1000",
            "--profile",
            "slow",
        ])
        .expect("parse");
        match cli.command {
            Command::Scan(args) => {
                assert!(args.resume);
                assert_eq!(args.start, Some(1000));
                assert_eq!(args.profile, "slow");
            }
            Command::InitConfig => panic!("expected scan"),
        }
    }
}
