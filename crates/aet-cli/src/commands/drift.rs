//! Drift command: per-lap half-split metrics for each source.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use aet_core::{BatchOptions, BatchReport, LapClock, MetricsConfig, SpeedSource, analyze_drift};
use aet_tcx::TcxLoader;

use crate::Config;
use crate::cli::OutputArgs;
use crate::config::{parse_pace, validate_pace};
use crate::output::{TableOptions, write_drift};

#[derive(Debug, Args)]
pub struct DriftArgs {
    /// TCX files to analyze, reported in the order given.
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Treadmill run: use a constant pace (min/mile) instead of GPS distance.
    #[arg(
        short,
        long,
        value_name = "PACE",
        num_args = 0..=1,
        default_missing_value = "12",
        value_parser = parse_pace
    )]
    pub treadmill: Option<f64>,

    /// Report lap times in local time instead of UTC.
    #[arg(short, long)]
    pub local_time: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Runs the drift analysis and writes one row per lap.
pub fn run<W: Write>(writer: &mut W, args: &DriftArgs, config: &Config, verbosity: u8) -> Result<BatchReport> {
    let treadmill_pace = args
        .treadmill
        .or(config.treadmill_pace)
        .map(validate_pace)
        .transpose()?;
    let clock = if args.local_time || config.local_time {
        LapClock::local(config.timezone_lookup()?)
    } else {
        LapClock::utc()
    };
    let metrics = MetricsConfig {
        speed_source: SpeedSource::from_treadmill_pace(treadmill_pace),
        clock,
    };
    tracing::info!(?metrics, sources = args.sources.len(), "computing lap drift");

    let sources = super::source_ids(&args.sources)?;
    let options = BatchOptions {
        parallel: args.output.parallel || config.parallel,
    };
    let batch = analyze_drift(&sources, &TcxLoader, &metrics, options);

    let table = TableOptions {
        format: args.output.format,
        headers: args.output.headers || config.headers,
        verbose: verbosity >= 1,
    };
    write_drift(writer, &batch, table)?;
    Ok(batch.report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use aet_core::BatchClassification;
    use insta::assert_snapshot;

    use crate::cli::OutputFormat;

    /// One lap of 10 one-second trackpoints: 3 m/s, 120 bpm then 132 bpm.
    fn steady_tcx() -> String {
        let mut points = String::new();
        for i in 0..10 {
            let bpm = if i < 5 { 120 } else { 132 };
            points.push_str(&format!(
                "<Trackpoint><Time>2020-06-13T13:00:{i:02}Z</Time>\
                 <Position><LatitudeDegrees>41.8781</LatitudeDegrees><LongitudeDegrees>-87.6298</LongitudeDegrees></Position>\
                 <DistanceMeters>{}</DistanceMeters>\
                 <HeartRateBpm><Value>{bpm}</Value></HeartRateBpm></Trackpoint>",
                i * 3
            ));
        }
        format!(
            "<TrainingCenterDatabase><Activities><Activity><Lap>\
             <TotalTimeSeconds>10</TotalTimeSeconds><Track>{points}</Track>\
             </Lap></Activity></Activities></TrainingCenterDatabase>"
        )
    }

    fn args(sources: Vec<String>) -> DriftArgs {
        DriftArgs {
            sources,
            treadmill: None,
            local_time: false,
            output: OutputArgs {
                headers: true,
                format: OutputFormat::Csv,
                parallel: false,
            },
        }
    }

    fn run_to_string(args: &DriftArgs, config: &Config) -> (String, BatchReport) {
        let mut out = Vec::new();
        let report = run(&mut out, args, config, 0).unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    #[test]
    fn valid_missing_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        let valid = temp.path().join("valid.tcx");
        let corrupt = temp.path().join("corrupt.tcx");
        fs::write(&valid, steady_tcx()).unwrap();
        fs::write(&corrupt, "<TrainingCenterDatabase><Lap>").unwrap();
        let missing = temp.path().join("missing.tcx");

        let paths = [&valid, &missing, &corrupt]
            .map(|p| p.to_string_lossy().into_owned())
            .to_vec();
        let (output, report) = run_to_string(&args(paths), &Config::default());

        assert_snapshot!(output, @r"
        Source,Start,End,Duration,Drift
        valid.tcx,2020-06-13 13:00:00+00:00,2020-06-13 13:00:09+00:00,0:00:09,0.1364
        ");
        assert_eq!(report.processed_count(), 1);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.classification(), BatchClassification::PartialFailure);
    }

    #[test]
    fn treadmill_and_local_time_from_config() {
        let temp = tempfile::tempdir().unwrap();
        let valid = temp.path().join("valid.tcx");
        fs::write(&valid, steady_tcx()).unwrap();

        let config = Config {
            treadmill_pace: Some(12.0),
            local_time: true,
            timezone: Some("America/Chicago".to_string()),
            ..Config::default()
        };
        let (output, report) = run_to_string(&args(vec![valid.to_string_lossy().into_owned()]), &config);

        // Constant speed: drift is 120/132 - 1
        assert_snapshot!(output, @r"
        Source,Start,End,Duration,Drift
        valid.tcx,2020-06-13 08:00:00-05:00,2020-06-13 08:00:09-05:00,0:00:09,-0.0909
        ");
        assert!(!report.local_time_degraded);
    }

    #[test]
    fn invalid_configured_pace_is_fatal() {
        let config = Config {
            treadmill_pace: Some(0.0),
            ..Config::default()
        };
        let mut out = Vec::new();
        let result = run(&mut out, &args(vec!["unused.tcx".to_string()]), &config, 0);
        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
