//! # MemoClaw — Slot Runner
//!
//! Serves one numbered notification slot for every configured user: waits
//! out the slot's delivery window, selects content from Immich, pushes it
//! through ntfy, and records what went out today.
//!
//! Usage:
//!   memoclaw --slot 1                     # Serve slot 1 for today
//!   memoclaw --slot 2 --dry-run           # Preview without sending
//!   memoclaw --slot 1 --test --no-delay   # Fast verification run

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use memoclaw_core::MemoClawConfig;
use memoclaw_notify::{compute_delay, run_slot, RunOptions, StateStore};

#[derive(Parser)]
#[command(
    name = "memoclaw",
    version,
    about = "📸 MemoClaw — daily photo memories over ntfy"
)]
struct Cli {
    /// Slot number to serve (1-based)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    slot: u32,

    /// Path to config file
    #[arg(long, default_value = "memoclaw.toml")]
    config: String,

    /// Test mode: ignore windows and sent-state, prefix titles with [TEST]
    #[arg(long)]
    test: bool,

    /// Show what would be sent without sending or saving state
    #[arg(long)]
    dry_run: bool,

    /// Send even if this slot already went out today
    #[arg(long)]
    force: bool,

    /// Skip the delivery-window delay
    #[arg(long)]
    no_delay: bool,

    /// Target date (YYYY-MM-DD, default today)
    #[arg(long)]
    date: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Nothing runs on a broken config.
    let config_path = shellexpand::tilde(&cli.config).to_string();
    let config = match MemoClawConfig::load_from(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };

    let date = match &cli.date {
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                eprintln!("Invalid date '{s}' (use YYYY-MM-DD)");
                std::process::exit(1);
            }
        },
        None => Local::now().date_naive(),
    };

    println!("📸 MemoClaw v{}", env!("CARGO_PKG_VERSION"));
    println!("   📅 Date:   {date}");
    println!("   🔔 Slot:   {}", cli.slot);
    println!("   ⚙️  Config: {config_path}");
    println!("   👥 Users:  {}", config.users.len());
    if cli.test {
        println!("   🧪 Mode:   TEST");
    }
    if cli.dry_run {
        println!("   👀 Mode:   DRY RUN");
    }
    if cli.force {
        println!("   💪 Mode:   FORCE");
    }
    println!();

    if config.users.is_empty() {
        tracing::warn!("⚠️ No users configured, nothing to do");
        return Ok(());
    }

    // The window wait blocks the whole run, before any user is processed.
    if !cli.no_delay {
        match config.settings.windows.get(cli.slot as usize - 1) {
            Some(window) => {
                let delay = compute_delay(window, Local::now().naive_local(), cli.test)?;
                if delay > 0 {
                    tracing::info!(
                        "⏳ Waiting {delay}s (window {}–{})",
                        window.start,
                        window.end
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
            None => {
                tracing::debug!("No window configured for slot {}, sending now", cli.slot);
            }
        }
    }

    let state_path = shellexpand::tilde(&config.settings.state_file).to_string();
    let store = StateStore::new(state_path);
    let opts = RunOptions {
        slot: cli.slot,
        date,
        test_mode: cli.test,
        dry_run: cli.dry_run,
        force: cli.force,
    };

    let report = run_slot(&config, &store, &opts).await;
    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
