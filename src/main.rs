//! CLI entry point for the Dublin bikes usage aggregator.
//!
//! Provides subcommands for aggregating raw station readings into the
//! per-date, per-station and per-hour tables, and for inspecting a single
//! raw file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dublinbikes_agg::analyzers::analyzer::{PipelineInput, discover_station_files, run};
use dublinbikes_agg::config::PipelineConfig;
use dublinbikes_agg::output::print_json;
use dublinbikes_agg::parser::parse_station_file;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dublinbikes_agg")]
#[command(about = "Aggregate bike-share station usage by pandemic period", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate raw station files into the date, station and hour tables
    Aggregate {
        /// Directory of raw station CSVs, processed in file-name order
        #[arg(short = 'd', long, default_value = "data/dublinbikes_data")]
        data_dir: PathBuf,

        /// Directory the aggregate tables are written to
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,

        /// Weather export to clip to the aggregated date span
        #[arg(short, long)]
        weather: Option<PathBuf>,

        /// JSON run configuration (regime boundaries, output prefix)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Explicit station files, in processing order (overrides --data-dir)
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,
    },
    /// Detect the layout of a raw station file and count its rows
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dublinbikes_agg.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dublinbikes_agg.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            data_dir,
            out_dir,
            weather,
            config,
            files,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => PipelineConfig::default(),
            };

            let station_files = if files.is_empty() {
                discover_station_files(&data_dir)
                    .with_context(|| format!("listing {}", data_dir.display()))?
            } else {
                files
            };

            info!(
                files = station_files.len(),
                pandemic_start = %config.pandemic_start,
                pandemic_end = %config.pandemic_end,
                "Starting aggregation"
            );

            let input = PipelineInput {
                station_files,
                weather_file: weather,
                out_dir,
            };
            let summary = run(&config, &input)?;
            print_json(&summary)?;
        }
        Commands::Inspect { file } => {
            let normalized = parse_station_file(&file)?;
            info!(
                path = %file.display(),
                schema = %normalized.schema,
                rows = normalized.rows_read,
                closed = normalized.rows_closed,
                open = normalized.readings.len(),
                "Station file"
            );
        }
    }

    Ok(())
}
