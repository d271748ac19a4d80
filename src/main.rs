use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use gridload::config::{GlobalConfig, load_config};
use gridload::id::ClientIdentity;
use gridload::runner::{LoadRunner, MapTester, RunnerContext, RunnerRegistry};
use gridload::status::{Readiness, StatusRegistry, TestLoopKind};
use gridload::store::InMemoryMapStore;

/// Max level to apply once the config file is known.
///
/// `RUST_LOG` wins when set; otherwise the file's `log-level` applies, and
/// without either only errors are logged.
fn resolve_log_level(rust_log: Option<&str>, configured: Option<&str>) -> Option<LevelFilter> {
    if rust_log.is_some() {
        return None;
    }
    let Some(level) = configured else {
        return Some(LevelFilter::Error);
    };
    match level.trim().parse::<LevelFilter>() {
        Ok(filter) => Some(filter),
        Err(_) => {
            warn!("Ignoring invalid log-level '{}', logging errors only", level);
            Some(LevelFilter::Error)
        }
    }
}

fn setup_logging(log_stderr: bool) -> Result<()> {
    // Without RUST_LOG the logger accepts everything and log::max_level gates
    // records, so the config file's log-level can still be applied after loading
    let mut builder = env_logger::Builder::new();
    match std::env::var(env_logger::DEFAULT_FILTER_ENV) {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Trace);
        }
    }

    if log_stderr {
        builder.target(env_logger::Target::Stderr).init();
        info!("Logging initialized, writing to stderr");
        return Ok(());
    }

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridload")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("gridload.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: GlobalConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { client_id } => handle_run_command(client_id.as_deref(), config).await,
        Commands::ShowConfig => handle_show_config_command(&config),
    }
}

async fn handle_run_command(client_id: Option<&str>, mut config: GlobalConfig) -> Result<()> {
    config.client = config.client.sanitized();

    let client = match client_id.or(config.client.identity.as_deref()) {
        Some(id) => ClientIdentity::from_configured(id),
        None => ClientIdentity::generate(),
    };
    info!("Using client identity {}", client);

    let mut registry = RunnerRegistry::new();
    registry.register(Arc::new(LoadRunner::new()));

    let store = InMemoryMapStore::new();
    let status = StatusRegistry::new();
    let readiness = Arc::new(Readiness::new());
    let cancel = CancellationToken::new();

    let ctx = Arc::new(RunnerContext {
        cluster_name: config.client.cluster_name.clone(),
        members: config.client.members.clone(),
        client: client.clone(),
        config: Arc::new(config),
        map_store: Arc::new(store.clone()),
        status: status.clone(),
        readiness,
        cancel: cancel.clone(),
    });

    println!(
        "{} {} runner(s) on cluster '{}' as client {}",
        "Running:".green(),
        registry.len(),
        ctx.cluster_name,
        client
    );

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling remote calls");
            interrupt.cancel();
        }
    });

    MapTester::new(registry).test_maps(ctx).await;

    for (kind, source, run_id) in status.registered_runs() {
        let Some(progress) = status.status_of(kind, &source) else {
            continue;
        };
        print_run_summary(kind, &source, &run_id.to_string(), &progress);
    }
    let calls = store.calls();
    println!(
        "{} {} remote call(s) on {} map(s)",
        "Store:".cyan(),
        calls.total(),
        store.map_names().len()
    );

    let document = status.assemble_test_loop_status();
    println!("{}", serde_json::to_string_pretty(&document).context("Failed to render status")?);
    Ok(())
}

fn sum_partition_counts(progress: &Map<String, Value>, suffix: &str) -> u64 {
    progress
        .iter()
        .filter(|(key, _)| key.starts_with("partition-") && key.ends_with(suffix))
        .filter_map(|(_, value)| value.as_u64())
        .sum()
}

fn print_run_summary(kind: TestLoopKind, source: &str, run_id: &str, progress: &Map<String, Value>) {
    let total = progress.get("totalRuns").and_then(Value::as_u64).unwrap_or(0);
    let completed = sum_partition_counts(progress, ".completedRuns");
    let failed = sum_partition_counts(progress, ".failedRuns");
    let finished = matches!(progress.get("runnerFinished"), Some(Value::Bool(true)));

    println!("{} {}/{} ({})", "Finished:".green(), kind, source, run_id);
    println!("  runs completed: {}/{}", completed.to_string().green(), total);
    if failed > 0 {
        println!("  runs failed:    {}", failed.to_string().red());
    }
    if !finished {
        println!("  {}", "runner did not finish".yellow());
    }
}

fn handle_show_config_command(config: &GlobalConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging before anything else logs
    setup_logging(cli.log_stderr).context("Failed to setup logging")?;

    // Load configuration
    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    let rust_log = std::env::var(env_logger::DEFAULT_FILTER_ENV).ok();
    if let Some(level) = resolve_log_level(rust_log.as_deref(), config.log_level.as_deref()) {
        log::set_max_level(level);
    }

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
