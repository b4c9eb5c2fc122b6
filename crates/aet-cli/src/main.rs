use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use aet_cli::commands::{drift, zones};
use aet_cli::summary::format_summary;
use aet_cli::{Cli, Commands, load_config};
use aet_core::BatchClassification;

/// Exit status when some sources were skipped.
const EXIT_PARTIAL_FAILURE: u8 = 3;
/// Exit status when no source yielded results.
const EXIT_TOTAL_FAILURE: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // -v shows progress, -vv everything; otherwise RUST_LOG, defaulting to warnings
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = load_config(cli.config.as_deref())?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let report = match &cli.command {
        Commands::Drift(args) => drift::run(&mut writer, args, &config, cli.verbose)?,
        Commands::Zones(args) => zones::run(&mut writer, args, &config, cli.verbose)?,
    };
    writer.flush()?;

    if cli.verbose >= 1 {
        eprint!("{}", format_summary(&report, cli.verbose));
    }

    Ok(match report.classification() {
        BatchClassification::Success => ExitCode::SUCCESS,
        BatchClassification::PartialFailure => ExitCode::from(EXIT_PARTIAL_FAILURE),
        BatchClassification::TotalFailure => ExitCode::from(EXIT_TOTAL_FAILURE),
    })
}
