//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::commands::drift::DriftArgs;
use crate::commands::zones::ZonesArgs;

/// Aerobic threshold analysis for TCX activities.
///
/// Computes per-lap cardiac drift (the change in speed per heartbeat from the
/// first to the second half of a lap) and heart-rate zone distributions.
#[derive(Debug, Parser)]
#[command(name = "aet", version, about, long_about = None)]
pub struct Cli {
    /// Increase detail: -v adds columns and a status report, -vv debug logs.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Per-lap half-split metrics and cardiac drift.
    Drift(DriftArgs),

    /// Fraction of heart-rate samples in each zone, per file and overall.
    Zones(ZonesArgs),
}

/// Output options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Print column headers.
    #[arg(short = 'c', long = "columns")]
    pub headers: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Process files in parallel. Output order is unchanged.
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}
