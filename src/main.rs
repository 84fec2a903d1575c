//! Command-line interface for excel-tap
//!
//! # Usage Examples
//!
//! ## Discovery
//! ```bash
//! # Print the catalog of streams and their inferred schemas
//! excel-tap --config config.json --discover
//! ```
//!
//! ## Sync
//! ```bash
//! # Full sync of every configured sheet; Singer messages go to stdout
//! excel-tap --config config.json
//!
//! # Incremental sync, resuming from and updating a state file
//! excel-tap --config config.json --state state.json
//! ```
//!
//! Logs go to stderr. Set `RUST_LOG` (or `--log-level`) to change verbosity.
//!
//! ## Exit codes
//! - `0`: every stream completed (missing sheets are skipped, not failures)
//! - `1`: the run could not start or finish (config, workbook access, state persistence)
//! - `2`: at least one stream failed

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use excel_tap::catalog::Catalog;
use excel_tap::config::SyncConfig;
use excel_tap::sink::SingerSink;
use excel_tap::sync::{
    run_discovery, run_sync, JsonFileStateStore, MemoryStateStore, PlanEntry, RunStatus, StateStore,
    StreamStatus, SyncObserver, TracingObserver,
};

#[derive(Parser, Debug)]
#[command(name = "excel-tap", version, about = "Extract spreadsheet sheets as Singer streams")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "EXCEL_TAP_CONFIG")]
    config: PathBuf,

    /// Path to the state file; read at start and rewritten after a successful run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Run discovery and print the catalog instead of syncing
    #[arg(short, long)]
    discover: bool,

    /// Write the discovery catalog to this file instead of stdout
    #[arg(long, requires = "discover")]
    catalog_out: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "excel_tap=debug")
    #[arg(long, default_value = "info")]
    log_level: String,
}

const EXIT_FATAL: u8 = 1;
const EXIT_STREAM_FAILURES: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = SyncConfig::from_path(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let observer: Arc<dyn SyncObserver> = Arc::new(TracingObserver);

    if cli.discover {
        return discover(cli, &config, observer);
    }

    let store: Box<dyn StateStore> = match &cli.state {
        Some(path) => Box::new(JsonFileStateStore::new(path)),
        None => Box::new(MemoryStateStore::default()),
    };

    let stdout = std::io::stdout();
    let mut sink = SingerSink::new(stdout.lock());
    let summary = run_sync(&config, store.as_ref(), &mut sink, Some(observer))
        .with_context(|| format!("syncing {}", config.file_path().display()))?;

    for outcome in &summary.streams {
        match &outcome.status {
            StreamStatus::Failed { .. } => warn!("{}: {}", outcome.stream, outcome.status),
            _ => info!("{}: {}", outcome.stream, outcome.status),
        }
    }

    Ok(match summary.status() {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::PartialSuccess | RunStatus::Failed => ExitCode::from(EXIT_STREAM_FAILURES),
    })
}

fn discover(cli: &Cli, config: &SyncConfig, observer: Arc<dyn SyncObserver>) -> anyhow::Result<ExitCode> {
    let plan = run_discovery(config, Some(observer))
        .with_context(|| format!("discovering {}", config.file_path().display()))?;
    let catalog = Catalog::from_plan(&plan);
    let json = catalog.to_json_pretty()?;

    match &cli.catalog_out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing catalog {}", path.display()))?,
        None => println!("{json}"),
    }

    let failed = plan
        .entries
        .iter()
        .any(|e| matches!(e, PlanEntry::Failed { .. }));
    Ok(if failed {
        ExitCode::from(EXIT_STREAM_FAILURES)
    } else {
        ExitCode::SUCCESS
    })
}
