//! Contact enrichment ingest - enrich a people file through the API

use anyhow::Result;
use clap::Parser;
use enrich_common::logging::{init_logging, LogConfig, LogLevel};
use enrich_common::EnrichError;
use enrich_ingest::config::IngestConfig;
use enrich_ingest::dispatcher::{open_input, Dispatcher, HostLoad};
use enrich_ingest::sink::OutputSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "enrich-ingest")]
#[command(author, version, about = "Contact enrichment ingestion tool")]
struct Cli {
    /// Input file, one `;`-separated record per line
    input: PathBuf,

    /// Output file enriched records are appended to
    #[arg(short, long, env = "ENRICH_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of workers; sized from the host load when omitted
    #[arg(short, long, env = "ENRICH_WORKERS")]
    workers: Option<usize>,

    /// Directory for the JSON log files
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag defaults
    let mut log_config = LogConfig::builder().level(log_level).build().merge_env()?;
    if let Some(dir) = &cli.log_dir {
        log_config.log_dir = dir.clone();
    }

    let _log_guard = init_logging(&log_config)?;

    if !cli.input.exists() {
        error!(path = %cli.input.display(), "Input file does not exist");
        return Err(EnrichError::InputNotFound(cli.input).into());
    }

    let mut config = IngestConfig::load()?;
    if let Some(output) = cli.output {
        config.output_path = output;
    }
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    config.validate()?;

    let worker_count = match config.workers {
        Some(workers) => workers,
        None => {
            let host = HostLoad::sample();
            let workers = host.worker_count(config.target_load);
            info!(
                cpus = host.cpu_count,
                load = host.load_one,
                target_load = config.target_load,
                workers,
                "Sized worker pool from host load"
            );
            workers
        },
    };

    let sink = Arc::new(OutputSink::open(&config.output_path).await?);
    let input = open_input(&cli.input).await?;

    info!(
        input = %cli.input.display(),
        output = %config.output_path.display(),
        credentials = config.credentials.len(),
        "Starting enrichment"
    );

    let dispatcher = Dispatcher::new(
        config.pipeline_settings(),
        config.credentials.clone(),
        sink,
        worker_count,
    );
    let summary = dispatcher.run(input).await?;

    info!(
        lines = summary.lines_dispatched,
        enriched = summary.enriched,
        parse_dropped = summary.parse_dropped,
        validation_dropped = summary.validation_dropped,
        exhausted = summary.exhausted,
        write_failed = summary.write_failed,
        "File processing completed. Total lines: {}. Time taken: {:.3} seconds",
        summary.lines_dispatched,
        summary.elapsed.as_secs_f64()
    );
    info!(
        "Total execution time: {:.3} seconds",
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
