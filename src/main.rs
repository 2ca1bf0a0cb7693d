//! CradleWatch - multi-modal baby monitor
//!
//! # Usage
//!
//! ```bash
//! # Synthetic windows through the label oracle (no model server needed)
//! cradlewatch --synthetic 60 --dry-run
//!
//! # Replay a labelled dataset against an OpenAI-compatible VLM server
//! cradlewatch --dataset data/dataset.json --speed-ms 500
//!
//! # Watch a directory for new frames and clips
//! cradlewatch --images-dir /var/spool/cradlewatch
//!
//! # Score saved predictions against ground truth
//! cradlewatch evaluate predictions.json --ground-truth data/dataset.json
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (default: info)
//! - `CRADLEWATCH_CONFIG`: Path to monitor_config.toml
//! - `CRADLEWATCH_SERVER_ADDR`: HTTP bind address
//! - `CRADLEWATCH_VLM_API_KEY`: Bearer token for the VLM server
//! - `RESET_DB`: Set to "true" to wipe the history database on startup

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cradlewatch::acquisition::{
    DatasetSource, DirectorySource, InputSource, StdinSource, SyntheticSource,
};
use cradlewatch::alerting::{AlertEngine, ChannelNotifier, LogNotifier};
use cradlewatch::api::{create_app, ApiState};
use cradlewatch::config::{defaults::ALERT_CHANNEL_CAPACITY, MonitorConfig};
use cradlewatch::evaluation;
use cradlewatch::inference::build_backend;
use cradlewatch::types::Alert;
use cradlewatch::{AppState, HistoryStorage, PipelineCoordinator, ProcessingLoop};

/// Windows generated when no input source is given
const DEFAULT_SYNTHETIC_WINDOWS: usize = 60;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cradlewatch")]
#[command(about = "Multi-modal baby monitoring pipeline")]
#[command(version)]
struct CliArgs {
    /// Replay a labelled dataset manifest (JSON array or JSON lines)
    #[arg(long, value_name = "PATH", conflicts_with_all = ["images_dir", "stdin", "synthetic"])]
    dataset: Option<PathBuf>,

    /// Watch a directory for new image and audio files
    #[arg(long, value_name = "DIR", conflicts_with_all = ["stdin", "synthetic"])]
    images_dir: Option<PathBuf>,

    /// Read JSON-lines windows from stdin
    #[arg(long, conflicts_with = "synthetic")]
    stdin: bool,

    /// Generate N synthetic windows (the default source)
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Seed for synthetic audio noise
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// HTTP bind address, overrides `server.addr`
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Delay between replayed windows in milliseconds (0 = as fast as possible)
    #[arg(long, default_value = "0")]
    speed_ms: u64,

    /// Use the label oracle instead of a real VLM backend
    #[arg(long)]
    dry_run: bool,

    /// Delete the history database before opening it (or RESET_DB=1)
    #[arg(long)]
    reset_db: bool,

    /// Append every alert as a JSON line to this file
    #[arg(long, value_name = "PATH")]
    alerts_jsonl: Option<PathBuf>,

    /// Shut down once the source is exhausted instead of keeping the API up
    #[arg(long)]
    exit_when_done: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print the effective configuration as TOML (API key redacted)
    ShowConfig,
    /// Compare saved predictions with ground-truth labels
    Evaluate {
        /// JSON array of { "filename", "prediction" }
        predictions: PathBuf,
        /// Dataset manifest with the labels
        #[arg(long)]
        ground_truth: PathBuf,
        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// History Database
// ============================================================================

fn should_reset_db(cli_flag: bool) -> bool {
    cli_flag
        || std::env::var("RESET_DB")
            .is_ok_and(|val| matches!(val.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

fn reset_database(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        info!(path = %db_path.display(), "History database does not exist, nothing to reset");
        return Ok(());
    }
    warn!(path = %db_path.display(), "RESET_DB set, wiping history database");
    std::fs::remove_dir_all(db_path).context("Failed to remove history database")?;
    Ok(())
}

/// Open storage, prune old entries, and report the highest stored alert id.
///
/// A storage failure is not fatal; the monitor then runs without history.
fn open_storage(cfg: &MonitorConfig) -> Option<HistoryStorage> {
    let storage = match HistoryStorage::open(&cfg.storage.db_path) {
        Ok(storage) => storage,
        Err(e) => {
            warn!(
                path = %cfg.storage.db_path,
                error = %e,
                "Failed to open history storage, scenes and alerts will not be persisted"
            );
            return None;
        }
    };

    let retention = i64::try_from(cfg.storage.retention_hours)
        .ok()
        .filter(|h| *h > 0)
        .and_then(TimeDelta::try_hours);
    if let Some(retention) = retention {
        match storage.prune_older_than(Utc::now() - retention) {
            Ok(0) => {}
            Ok(n) => info!(pruned = n, hours = cfg.storage.retention_hours, "Pruned old history"),
            Err(e) => warn!(error = %e, "Failed to prune history"),
        }
    }

    let stats = storage.stats();
    info!(
        scenes = stats.scene_count,
        alerts = stats.alert_count,
        bytes = stats.size_bytes,
        "History storage ready"
    );
    Some(storage)
}

// ============================================================================
// Supervised Tasks
// ============================================================================

/// Long-running tasks owned by the supervisor's JoinSet
#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    WindowProcessor,
    AlertFeed,
}

impl TaskName {
    const fn as_str(self) -> &'static str {
        match self {
            Self::HttpServer => "http_server",
            Self::WindowProcessor => "window_processor",
            Self::AlertFeed => "alert_feed",
        }
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let task = TaskName::HttpServer;
        info!(%task, "Task starting");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel_token.cancelled().await })
            .await
            .context("HTTP server error")?;
        info!(%task, "HTTP server drained");
        Ok(TaskName::HttpServer)
    });
}

/// Append every broadcast alert to `path` as one JSON line.
fn spawn_alert_feed(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut rx: broadcast::Receiver<Alert>,
    path: PathBuf,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!(task = %TaskName::AlertFeed, path = %path.display(), "Task starting");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        loop {
            // buffered alerts are drained before cancellation is honoured
            let alert = tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Ok(alert) => alert,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Alert feed lagged, alerts dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = cancel_token.cancelled() => break,
            };
            let mut line = serde_json::to_vec(&alert)?;
            line.push(b'\n');
            file.write_all(&line).await?;
        }

        file.flush().await?;
        Ok(TaskName::AlertFeed)
    });
}

/// Wait on the task set. Any failure cancels everything; a finished
/// window processor also cancels when `exit_when_done` is set.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
    exit_when_done: bool,
) -> Result<()> {
    let mut failure = None;
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: cancelled");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!(task = %task_name, "Supervisor: task finished");
                        if exit_when_done && matches!(task_name, TaskName::WindowProcessor) {
                            cancel_token.cancel();
                        }
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = format!("{e:#}"), "Supervisor: task failed");
                        cancel_token.cancel();
                        failure = Some(e);
                        break;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        failure = Some(anyhow::anyhow!("Task panicked: {e}"));
                        break;
                    }
                    None => {
                        info!("Supervisor: no tasks left");
                        break;
                    }
                }
            }
        }
    }

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => info!(task = %task_name, "Supervisor: task stopped"),
            Ok(Err(e)) => warn!(error = format!("{e:#}"), "Supervisor: task failed while stopping"),
            Err(e) => warn!(error = %e, "Supervisor: task panicked while stopping"),
        }
    }

    failure.map_or(Ok(()), Err)
}

// ============================================================================
// Pipeline Runner
// ============================================================================

fn build_source(args: &CliArgs, cfg: &MonitorConfig) -> Result<Box<dyn InputSource>> {
    if let Some(path) = &args.dataset {
        info!(path = %path.display(), "Input: dataset manifest");
        let source = DatasetSource::open(path, args.speed_ms)
            .with_context(|| format!("Failed to open dataset {}", path.display()))?;
        info!(windows = source.remaining(), "Dataset windows queued for processing");
        return Ok(Box::new(source));
    }
    if let Some(dir) = &args.images_dir {
        info!(dir = %dir.display(), poll_ms = cfg.monitor.poll_interval_ms, "Input: watched directory");
        return Ok(Box::new(DirectorySource::new(
            dir.clone(),
            Duration::from_millis(cfg.monitor.poll_interval_ms),
        )));
    }
    if args.stdin {
        info!("Input: stdin (JSON lines)");
        return Ok(Box::new(StdinSource::new()));
    }
    let total = args.synthetic.unwrap_or(DEFAULT_SYNTHETIC_WINDOWS);
    info!(windows = total, "Input: synthetic windows");
    let mut source = SyntheticSource::new(total, args.speed_ms);
    if let Some(seed) = args.seed {
        source = source.with_seed(seed);
    }
    if !cfg.inference.enable_audio {
        source = source.without_audio();
    }
    Ok(Box::new(source))
}

async fn run_pipeline(args: CliArgs, cfg: MonitorConfig, cancel_token: CancellationToken) -> Result<()> {
    info!("Starting CradleWatch pipeline");
    info!("   Phase 1: Input Acquisition");
    info!("   Phase 2: Preprocessing");
    info!("   Phase 3: Visual + Acoustic Inference");
    info!("   Phase 4: Aggregation & Summary");
    info!("   Phase 5: Alerting");

    let mut source = build_source(&args, &cfg)?;
    let backend = build_backend(&cfg.inference).context("Failed to build vision backend")?;
    info!(backend = backend.backend_name(), "Vision backend ready");

    let app_state = Arc::new(RwLock::new(AppState::new(cfg.monitor.name.clone())));
    app_state.write().await.backend_name = backend.backend_name().to_string();

    let storage = open_storage(&cfg);
    let next_alert_id = storage.as_ref().map_or(1, |s| s.max_alert_id() + 1);
    let alert_engine = AlertEngine::new(&cfg.alerting).with_next_id(next_alert_id);
    info!(rules = ?alert_engine.rule_names(), next_id = next_alert_id, "Alert rules enabled");
    let coordinator = PipelineCoordinator::new(&cfg, backend).with_alert_engine(alert_engine);

    let mut api_state = ApiState::new(Arc::clone(&app_state), Arc::new(cfg.clone()));
    if let Some(storage) = &storage {
        api_state = api_state.with_storage(storage.clone());
    }
    let listener = tokio::net::TcpListener::bind(&cfg.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.addr))?;
    info!(addr = %cfg.server.addr, "HTTP API listening");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    spawn_http_server(&mut task_set, listener, create_app(api_state), cancel_token.clone());

    let mut processing_loop = ProcessingLoop::new(coordinator, Arc::clone(&app_state), cancel_token.clone())
        .with_notifier(Arc::new(LogNotifier));
    if let Some(storage) = storage {
        processing_loop = processing_loop.with_storage(storage);
    }

    if let Some(path) = args.alerts_jsonl.clone() {
        let channel = ChannelNotifier::new(ALERT_CHANNEL_CAPACITY);
        spawn_alert_feed(&mut task_set, channel.subscribe(), path, cancel_token.clone());
        processing_loop = processing_loop.with_notifier(Arc::new(channel));
    }

    task_set.spawn(async move {
        let task = TaskName::WindowProcessor;
        info!(%task, "Task starting");
        let stats = processing_loop
            .run(source.as_mut())
            .await
            .context("Input source failed")?;
        info!(%task, "{stats}");
        Ok(task)
    });

    run_supervisor(&mut task_set, cancel_token, args.exit_when_done).await
}

fn run_evaluate(predictions: &Path, ground_truth: &Path, json: bool) -> Result<()> {
    let report = evaluation::evaluate_files(predictions, ground_truth)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if let Some(SubCommand::Evaluate {
        predictions,
        ground_truth,
        json,
    }) = &args.command
    {
        return run_evaluate(predictions, ground_truth, *json);
    }

    let mut cfg = MonitorConfig::load().context("Invalid monitor configuration")?;
    if args.dry_run {
        info!("Dry run: using the label oracle backend");
        cfg.inference.backend = "oracle".to_string();
    }
    if let Some(addr) = &args.addr {
        cfg.server.addr.clone_from(addr);
        cfg.validate().context("Invalid --addr")?;
    }

    if matches!(args.command, Some(SubCommand::ShowConfig)) {
        print!("{}", cfg.redacted().to_toml()?);
        return Ok(());
    }

    // Reset DB check, before storage is opened
    if should_reset_db(args.reset_db) {
        reset_database(Path::new(&cfg.storage.db_path))?;
    }

    info!(monitor = %cfg.monitor.name, "CradleWatch starting");

    let cancel_token = CancellationToken::new();
    let on_ctrl_c = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                on_ctrl_c.cancel();
            }
            Err(e) => warn!(error = %e, "Ctrl+C handler unavailable"),
        }
    });

    run_pipeline(args, cfg, cancel_token).await?;

    info!("CradleWatch shutdown complete");
    Ok(())
}
