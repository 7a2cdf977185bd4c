//! postload - load clinical variant annotations into CellBase

use anyhow::Result;
use clap::Parser;
use postload_common::logging::{init_logging, LogConfig, LogLevel};
use postload_ingest::params::DEFAULT_BATCH_SIZE;
use postload_ingest::progress::{BarReporter, LogReporter, ProgressReporter};
use postload_ingest::store::MergeOptions;
use postload_ingest::{run_post_load, PostLoadOptions};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "postload")]
#[command(author, version, about = "Load clinical variant annotations into CellBase")]
struct Cli {
    /// VEP annotation file (plain or .gz)
    #[arg(short = 'i', long = "clinical-annotation-file")]
    input: Option<PathBuf>,

    /// Human assembly: GRCh37 or GRCh38
    #[arg(short, long)]
    assembly: Option<String>,

    /// Species key
    #[arg(long, default_value = "hsapiens")]
    species: String,

    /// Cluster configuration file (JSON or TOML)
    #[arg(short = 'c', long = "conf", env = "CELLBASE_CONF")]
    conf: Option<PathBuf>,

    /// Annotations merged per store call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Store-specific merge option, may be repeated
    #[arg(long = "merge-option", value_name = "KEY=VALUE")]
    merge_options: Vec<String>,

    /// Show a progress spinner instead of progress log lines
    #[arg(long)]
    progress_bar: bool,

    /// Merge into an in-memory store; nothing is written to the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log level (overrides --verbose)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

async fn run(cli: Cli) -> Result<()> {
    let options = PostLoadOptions {
        input: cli.input,
        assembly: cli.assembly,
        species: cli.species,
        config_path: cli.conf,
        batch_size: cli.batch_size,
        merge_options: MergeOptions::from_pairs(&cli.merge_options)?,
        dry_run: cli.dry_run,
    };

    let mut reporter: Box<dyn ProgressReporter> = if cli.progress_bar {
        Box::new(BarReporter::new("read variants with vep annotations"))
    } else {
        Box::new(LogReporter)
    };

    let summary = run_post_load(&options, reporter.as_mut()).await?;
    tracing::debug!(run_id = %summary.run_id, state = %summary.state, "Post-load finished");
    drop(reporter);

    // Printed regardless of the log level
    println!("{}", summary);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = cli.log_level.unwrap_or(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("postload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
    drop(guard);
}
