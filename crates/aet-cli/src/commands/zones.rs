//! Zones command: heart-rate zone distribution per source and overall.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use aet_core::{BatchOptions, BatchReport, ZoneSpec, analyze_zones};
use aet_tcx::TcxLoader;

use crate::Config;
use crate::cli::OutputArgs;
use crate::output::{TableOptions, write_zones};

#[derive(Debug, Args)]
pub struct ZonesArgs {
    /// TCX files to analyze, reported in the order given.
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Zone boundaries in bpm, comma-separated (e.g. 0,100,123,136,146,154,300).
    #[arg(short, long, value_name = "EDGES")]
    pub zones: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Runs the zone analysis and writes one row per source plus an overall row.
///
/// The zone boundaries are validated before any source is opened.
pub fn run<W: Write>(writer: &mut W, args: &ZonesArgs, config: &Config, verbosity: u8) -> Result<BatchReport> {
    let edges = args.zones.as_deref().unwrap_or(&config.zones);
    let spec: ZoneSpec = edges
        .parse()
        .with_context(|| format!("invalid zone boundaries {edges:?}"))?;
    tracing::info!(zones = %spec, sources = args.sources.len(), "binning heart-rate samples");

    let sources = super::source_ids(&args.sources)?;
    let options = BatchOptions {
        parallel: args.output.parallel || config.parallel,
    };
    let batch = analyze_zones(&sources, &TcxLoader, &spec, options);

    let table = TableOptions {
        format: args.output.format,
        headers: args.output.headers || config.headers,
        verbose: verbosity >= 1,
    };
    write_zones(writer, &batch, table)?;
    Ok(batch.report)
}
