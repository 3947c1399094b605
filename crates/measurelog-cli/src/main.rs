//! measurelog CLI: replay, list, analyze and export measurement logs.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use measurelog_core::analyzer::{self, AnalysisOptions};
use measurelog_core::session::read_samples_lossy;
use measurelog_core::storage::{self, COLUMNS};
use measurelog_core::{MeasureConfig, MeasurementSession, Sample2D, ShutdownSignal};

#[derive(Parser)]
#[command(
    name = "measurelog",
    about = "📏 measurelog: measurement error overlay and logging",
    version
)]
struct Cli {
    /// YAML config file (defaults are used when it does not exist)
    #[arg(long, global = true, default_value = "measurelog.yaml")]
    config: PathBuf,
    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay JSON-lines samples through the overlay and log them
    Run {
        /// Samples file, one JSON object per line (default: stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,
        /// Delay between frames in milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
        /// Directory for measurement logs
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Label for expected values on the overlay
        #[arg(long)]
        expected_name: Option<String>,
        /// Label for measured values on the overlay
        #[arg(long)]
        measured_name: Option<String>,
    },
    /// List persisted measurement logs
    List {
        /// Directory for measurement logs
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Summarize a measurement log and render its analysis chart
    Analyze {
        /// Log file to analyze
        #[arg(required_unless_present = "latest", conflicts_with = "latest")]
        file: Option<PathBuf>,
        /// Analyze the most recent log in the log directory
        #[arg(long)]
        latest: bool,
        /// Directory for measurement logs
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Where to write the chart (default: next to the log)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Histogram bins
        #[arg(long)]
        bins: Option<usize>,
    },
    /// Export a measurement log to CSV or JSON
    Export {
        /// Log file to export
        file: PathBuf,
        /// Output format
        #[arg(long, short, default_value = "csv", value_parser = ["csv", "json"])]
        format: String,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    let mut config = MeasureConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            input,
            interval_ms,
            log_dir,
            expected_name,
            measured_name,
        } => {
            if let Some(dir) = log_dir {
                config.log_dir = dir;
            }
            if let Some(name) = expected_name {
                config.expected_name = name;
            }
            if let Some(name) = measured_name {
                config.measured_name = name;
            }
            cmd_run(config, input, Duration::from_millis(interval_ms)).await?;
        }
        Commands::List { log_dir } => {
            cmd_list(log_dir.unwrap_or(config.log_dir))?;
        }
        Commands::Analyze {
            file,
            latest,
            log_dir,
            out_dir,
            bins,
        } => {
            let log_dir = log_dir.unwrap_or(config.log_dir);
            let file = match file {
                Some(file) => file,
                None if latest => latest_log(&log_dir)?,
                None => anyhow::bail!("Specify a log file or --latest"),
            };
            let options = AnalysisOptions {
                out_dir,
                bins: bins.unwrap_or(config.histogram_bins),
            };
            cmd_analyze(file, options)?;
        }
        Commands::Export {
            file,
            format,
            output,
        } => {
            cmd_export(file, format, output)?;
        }
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

async fn cmd_run(config: MeasureConfig, input: Option<PathBuf>, interval: Duration) -> Result<()> {
    let reader: Box<dyn BufRead + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Cannot open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    println!("📏 Measurement session");
    println!("   Source:  {}", input.as_deref().map_or("stdin".into(), |p| p.display().to_string()));
    println!("   Log dir: {}", config.log_dir.display());
    println!();

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing session");
            signal.trigger();
        }
    });

    // Reading stdin blocks, so samples arrive over a channel the loop can stop waiting on.
    let (tx, rx) = mpsc::channel::<Sample2D>();
    std::thread::spawn(move || {
        for sample in read_samples_lossy(reader) {
            if tx.send(sample).is_err() {
                break;
            }
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {pos} frames  {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut session = MeasurementSession::new(&config, shutdown.clone());
    let log_dir = config.log_dir.clone();
    let bar = spinner.clone();
    let (outcome, saved) = tokio::task::spawn_blocking(move || {
        let samples = std::iter::from_fn(|| loop {
            if shutdown.is_triggered() {
                return None;
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(sample) => return Some(sample),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        });
        let outcome = session.run(samples, |frame| {
            bar.inc(1);
            if let Some(mean) = frame.texts().find(|t| t.starts_with("Mean Error")) {
                bar.set_message(mean.to_string());
            }
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        });
        (outcome, session.finish())
    })
    .await?;
    spinner.finish_and_clear();

    println!(
        "Rendered {} frames, logged {} measurements{}",
        outcome.frames,
        outcome.logged,
        if outcome.interrupted { " (interrupted)" } else { "" }
    );
    match saved {
        Some(path) => println!("✓ Measurement log saved to {}", path.display()),
        None if outcome.logged == 0 => println!("No measurements collected, nothing saved."),
        None => anyhow::bail!("Failed to save measurement log in {}", log_dir.display()),
    }
    Ok(())
}

fn cmd_list(log_dir: PathBuf) -> Result<()> {
    let files = analyzer::list_measurement_files(&log_dir);
    if files.is_empty() {
        println!("No measurement log files found in '{}'", log_dir.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "File", "Records"]);
    for (i, path) in files.iter().enumerate() {
        let records = storage::read_log(path)
            .map(|r| r.len().to_string())
            .unwrap_or_else(|_| "unreadable".to_string());
        table.add_row([(i + 1).to_string(), file_name(path), records]);
    }

    println!("Measurement logs in: {}", log_dir.display());
    println!("{}", table);
    Ok(())
}

fn cmd_analyze(file: PathBuf, options: AnalysisOptions) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("Log file not found: {}", file.display());
    }
    let report = analyzer::analyze(&file, &options)
        .with_context(|| format!("Analysis failed for {}", file.display()))?;
    let summary = report.summary;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Metric", "Value"]);
    table.add_row(["Total measurements".to_string(), summary.records.to_string()]);
    table.add_row(["Average length error".to_string(), format!("{:.2}%", summary.avg_length_error)]);
    table.add_row(["Average width error".to_string(), format!("{:.2}%", summary.avg_width_error)]);
    table.add_row(["Average mean error".to_string(), format!("{:.2}%", summary.avg_mean_error)]);

    println!("Log: {}", file_name(&file));
    println!("{}", table);
    println!("Chart: {}", report.chart.display());
    Ok(())
}

fn cmd_export(file: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("Log file not found: {}", file.display());
    }

    let records = storage::read_log(&file)?;

    let content = match format.as_str() {
        "json" => serde_json::to_string_pretty(&records)?,
        "csv" => {
            let mut out = COLUMNS.join(",") + "\n";
            for r in &records {
                let vals = [
                    r.formatted_timestamp(),
                    r.expected_length.to_string(),
                    r.measured_length.to_string(),
                    r.length_error_abs.to_string(),
                    r.length_error_rel.to_string(),
                    r.expected_width.to_string(),
                    r.measured_width.to_string(),
                    r.width_error_abs.to_string(),
                    r.width_error_rel.to_string(),
                    r.area_error_rel.to_string(),
                    r.mean_error.to_string(),
                ];
                out += &(vals.join(",") + "\n");
            }
            out
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &content)?;
            info!(rows = records.len(), path = %path.display(), "Export written");
            println!("Exported {} rows to {}", records.len(), path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

/// Diagnostics go to stderr, or to `log_file` when given.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::stderr)
            .with_target(false)
            .compact()
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(&dir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
    Ok(Some(guard))
}

fn latest_log(log_dir: &Path) -> Result<PathBuf> {
    match analyzer::list_measurement_files(log_dir).pop() {
        Some(path) => Ok(path),
        None => anyhow::bail!("No measurement log files found in '{}'", log_dir.display()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
