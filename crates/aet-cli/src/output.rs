//! Rendering of batch results as delimited text or JSON.
//!
//! Formatting never changes the records; empty cells stand for values that
//! could not be computed.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use aet_core::units::format_pace;
use aet_core::{DriftBatch, HalfMetrics, LapMetrics, ZoneBatch, ZoneDistribution};

use crate::cli::OutputFormat;

/// Label of the zone row combining every processed source.
pub const OVERALL_LABEL: &str = "Overall";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

const SHORT_DRIFT_COLUMNS: [&str; 5] = ["Source", "Start", "End", "Duration", "Drift"];

const VERBOSE_DRIFT_COLUMNS: [&str; 26] = [
    "Source",
    "Lap",
    "Start",
    "End",
    "Duration",
    "Total Time",
    "Trackpoints",
    "Reported Distance",
    "Distance",
    "Avg HR",
    "Speed",
    "Pace",
    "Halftime",
    "First Distance",
    "First Speed",
    "First Pace",
    "First HR",
    "First Ratio",
    "Second Distance",
    "Second Speed",
    "Second Pace",
    "Second HR",
    "Second Ratio",
    "Drift",
    "Hazard",
    "Path",
];

/// How a table is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub format: OutputFormat,
    pub headers: bool,
    /// Emit every computed field instead of the short column set.
    pub verbose: bool,
}

/// Writes lap metrics in the requested format.
pub fn write_drift<W: Write>(writer: &mut W, batch: &DriftBatch, options: TableOptions) -> Result<()> {
    match options.format {
        OutputFormat::Json => write_json(writer, batch),
        OutputFormat::Csv => write_drift_csv(writer, &batch.laps, options),
    }
}

/// Writes zone distributions in the requested format.
pub fn write_zones<W: Write>(writer: &mut W, batch: &ZoneBatch, options: TableOptions) -> Result<()> {
    match options.format {
        OutputFormat::Json => write_json(writer, batch),
        OutputFormat::Csv => write_zones_csv(writer, batch, options),
    }
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn write_drift_csv<W: Write>(writer: &mut W, laps: &[LapMetrics], options: TableOptions) -> Result<()> {
    let mut csv = csv_writer(writer);
    if options.headers {
        if options.verbose {
            csv.write_record(VERBOSE_DRIFT_COLUMNS)?;
        } else {
            csv.write_record(SHORT_DRIFT_COLUMNS)?;
        }
    }
    for lap in laps {
        if options.verbose {
            csv.write_record(verbose_drift_row(lap))?;
        } else {
            csv.write_record(short_drift_row(lap))?;
        }
    }
    csv.flush()?;
    Ok(())
}

fn short_drift_row(lap: &LapMetrics) -> [String; 5] {
    [
        lap.source_id.display_name().to_string(),
        format_time(lap.start_time),
        format_time(lap.end_time),
        lap.duration_s.map(format_hms).unwrap_or_default(),
        fixed(lap.drift_ratio(), 4),
    ]
}

fn verbose_drift_row(lap: &LapMetrics) -> Vec<String> {
    let split = lap.split.as_ref().ok();
    let first = split.map(|s| &s.first);
    let second = split.map(|s| &s.second);

    let mut row = vec![
        lap.source_id.display_name().to_string(),
        lap.lap_number.to_string(),
        format_time(lap.start_time),
        format_time(lap.end_time),
        lap.duration_s.map(format_hms).unwrap_or_default(),
        format_hms(lap.total_time_s),
        lap.trackpoint_count.to_string(),
        fixed(lap.reported_distance_m, 2),
        fixed(lap.total_distance_m, 2),
        fixed(lap.avg_bpm, 1),
        fixed(lap.speed_m_s, 3),
        lap.pace_min_per_mile.map(format_pace).unwrap_or_default(),
        split.map(|s| s.half_index.to_string()).unwrap_or_default(),
    ];
    row.extend(half_cells(first));
    row.extend(half_cells(second));
    row.push(fixed(lap.drift_ratio(), 4));
    row.push(lap.hazard().map(|h| h.to_string()).unwrap_or_default());
    row.push(lap.source_id.to_string());
    row
}

fn half_cells(half: Option<&HalfMetrics>) -> [String; 5] {
    [
        fixed(half.and_then(|h| h.distance_m), 2),
        fixed(half.map(|h| h.speed_m_s), 3),
        half.map(|h| format_pace(h.pace_min_per_mile)).unwrap_or_default(),
        fixed(half.map(|h| h.avg_bpm), 1),
        fixed(half.map(|h| h.speed_bpm_ratio), 6),
    ]
}

fn write_zones_csv<W: Write>(writer: &mut W, batch: &ZoneBatch, options: TableOptions) -> Result<()> {
    let mut csv = csv_writer(writer);
    if options.headers {
        let mut header = vec!["Source".to_string()];
        header.extend(batch.overall.spec().zone_names());
        header.push("Samples".to_string());
        header.push("Out of Range".to_string());
        csv.write_record(&header)?;
    }
    for source in &batch.sources {
        csv.write_record(zone_row(source.source.display_name(), &source.distribution))?;
    }
    if batch.overall.is_defined() {
        csv.write_record(zone_row(OVERALL_LABEL, &batch.overall))?;
    }
    csv.flush()?;
    Ok(())
}

fn zone_row(label: &str, distribution: &ZoneDistribution) -> Vec<String> {
    let zones = distribution.spec().zone_count();
    let mut row = Vec::with_capacity(zones + 3);
    row.push(label.to_string());
    row.extend((0..zones).map(|zone| fixed(distribution.fraction(zone), 6)));
    row.push(distribution.binned().to_string());
    row.push(distribution.out_of_range().to_string());
    row
}

/// Formats an optional number with fixed decimals; blank when absent.
pub fn fixed(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

/// Formats a timestamp with its UTC offset; blank when absent.
pub fn format_time(time: Option<DateTime<FixedOffset>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Formats seconds as `H:MM:SS`, rounded to the nearest second.
#[allow(clippy::cast_possible_truncation)]
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.round().max(0.0) as i64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use aet_core::ZoneSpec;
    use aet_core::activity::{Lap, Trackpoint};
    use aet_core::{MetricsConfig, SourceId, SourceZones, bin_heart_rates, compute_lap_metrics};
    use chrono::{Duration, TimeZone, Utc};
    use insta::assert_snapshot;

    /// Ten one-second samples at 3 m/s, 120 bpm then 132 bpm.
    fn steady_lap(source: &str, number: usize) -> Lap {
        let start = Utc.with_ymd_and_hms(2020, 6, 13, 13, 0, 0).unwrap();
        Lap {
            source_id: SourceId::new(source).unwrap(),
            number,
            total_time_s: 10.0,
            reported_distance_m: Some(27.0),
            trackpoints: (0..10)
                .map(|i| Trackpoint {
                    timestamp: start + Duration::seconds(i),
                    cumulative_distance_m: 3.0 * i as f64,
                    heart_rate_bpm: Some(if i < 5 { 120 } else { 132 }),
                    position: None,
                })
                .collect(),
            start_position: None,
        }
    }

    fn empty_lap(source: &str, number: usize) -> Lap {
        Lap {
            trackpoints: Vec::new(),
            total_time_s: 30.0,
            reported_distance_m: None,
            ..steady_lap(source, number)
        }
    }

    fn drift_batch() -> DriftBatch {
        let config = MetricsConfig::default();
        DriftBatch {
            laps: vec![
                compute_lap_metrics(&steady_lap("/data/run.tcx", 1), &config),
                compute_lap_metrics(&empty_lap("/data/run.tcx", 2), &config),
            ],
            report: aet_core::BatchReport::default(),
        }
    }

    fn render(batch: &DriftBatch, options: TableOptions) -> String {
        let mut out = Vec::new();
        write_drift(&mut out, batch, options).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn csv(headers: bool, verbose: bool) -> TableOptions {
        TableOptions {
            format: OutputFormat::Csv,
            headers,
            verbose,
        }
    }

    #[test]
    fn short_drift_table() {
        assert_snapshot!(render(&drift_batch(), csv(true, false)), @r"
        Source,Start,End,Duration,Drift
        run.tcx,2020-06-13 13:00:00+00:00,2020-06-13 13:00:09+00:00,0:00:09,0.1364
        run.tcx,,,,
        ");
    }

    #[test]
    fn headers_are_optional() {
        let output = render(&drift_batch(), csv(false, false));
        assert_eq!(output.lines().count(), 2);
        assert!(output.starts_with("run.tcx,"));
    }

    #[test]
    fn verbose_drift_table() {
        let output = render(&drift_batch(), csv(true, true));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);

        let header: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(header.len(), VERBOSE_DRIFT_COLUMNS.len());

        let steady: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(steady.len(), header.len());
        let cell = |name: &str| steady[header.iter().position(|h| *h == name).unwrap()];
        assert_eq!(cell("Lap"), "1");
        // Timestamp span, with the reported lap time alongside
        assert_eq!(cell("Duration"), "0:00:09");
        assert_eq!(cell("Total Time"), "0:00:10");
        assert_eq!(cell("Trackpoints"), "10");
        assert_eq!(cell("Distance"), "27.00");
        assert_eq!(cell("Avg HR"), "126.0");
        assert_eq!(cell("Speed"), "2.700");
        assert_eq!(cell("Halftime"), "4");
        assert_eq!(cell("First Speed"), "2.400");
        assert_eq!(cell("Second Speed"), "3.000");
        assert_eq!(cell("First HR"), "120.0");
        assert_eq!(cell("Second HR"), "132.0");
        assert_eq!(cell("Drift"), "0.1364");
        assert_eq!(cell("Hazard"), "");
        assert_eq!(cell("Path"), "/data/run.tcx");

        let empty: Vec<&str> = lines[2].split(',').collect();
        let cell = |name: &str| empty[header.iter().position(|h| *h == name).unwrap()];
        assert_eq!(cell("Drift"), "");
        assert_eq!(cell("Hazard"), "lap has no trackpoints");
    }

    #[test]
    fn drift_json_keeps_hazards() {
        let mut out = Vec::new();
        let options = TableOptions {
            format: OutputFormat::Json,
            headers: false,
            verbose: false,
        };
        write_drift(&mut out, &drift_batch(), options).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let laps = json["laps"].as_array().unwrap();
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0]["lap_number"], 1);
        assert!(laps[0]["drift_ratio"].is_f64());
        assert_eq!(laps[1]["hazard"], "no_trackpoints");
    }

    #[test]
    fn zones_table_with_overall_row() {
        let spec = ZoneSpec::default();
        let easy = bin_heart_rates(&[110, 110, 110, 130], &spec);
        let hard = bin_heart_rates(&[150, 160, 320], &spec);
        let mut overall = ZoneDistribution::empty(&spec);
        overall.merge(&easy);
        overall.merge(&hard);
        let batch = ZoneBatch {
            sources: vec![
                SourceZones {
                    source: SourceId::new("easy.tcx").unwrap(),
                    distribution: easy,
                },
                SourceZones {
                    source: SourceId::new("hard.tcx").unwrap(),
                    distribution: hard,
                },
            ],
            overall,
            report: aet_core::BatchReport::default(),
        };

        let mut out = Vec::new();
        write_zones(&mut out, &batch, csv(true, false)).unwrap();
        assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        Source,Z0,Z1,Z2,Z3,Z4,Z5,Samples,Out of Range
        easy.tcx,0.000000,0.750000,0.250000,0.000000,0.000000,0.000000,4,0
        hard.tcx,0.000000,0.000000,0.000000,0.000000,0.500000,0.500000,2,1
        Overall,0.000000,0.500000,0.166667,0.000000,0.166667,0.166667,6,1
        ");
    }

    #[test]
    fn no_overall_row_without_samples() {
        let batch = ZoneBatch {
            sources: Vec::new(),
            overall: ZoneDistribution::empty(&ZoneSpec::default()),
            report: aet_core::BatchReport::default(),
        };
        let mut out = Vec::new();
        write_zones(&mut out, &batch, csv(false, false)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn hms_rounds_to_seconds() {
        assert_eq!(format_hms(0.0), "0:00:00");
        assert_eq!(format_hms(59.6), "0:01:00");
        assert_eq!(format_hms(3725.0), "1:02:05");
        assert_eq!(format_hms(-4.0), "0:00:00");
    }

    #[test]
    fn blank_cells_for_missing_values() {
        assert_eq!(fixed(None, 4), "");
        assert_eq!(fixed(Some(0.123_456), 4), "0.1235");
        assert_eq!(format_time(None), "");
    }
}
