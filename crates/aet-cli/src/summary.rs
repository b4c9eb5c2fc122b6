//! Human-readable batch status for stderr.

use std::fmt::Write;

use aet_core::{BatchClassification, BatchReport, ProcessingOutcome};

/// Formats the status report.
///
/// Level 1 lists skipped sources, lap hazards and a degraded clock; level 2
/// also lists every processed source.
pub fn format_summary(report: &BatchReport, verbosity: u8) -> String {
    let mut output = String::new();

    let total = report.sources.len();
    let processed = report.processed_count();
    writeln!(output, "Processed {processed} of {total} sources").unwrap();

    if verbosity >= 2 {
        for status in &report.sources {
            if let ProcessingOutcome::Processed { laps } = status.outcome {
                writeln!(output, "  ok       {} ({laps} laps)", status.source).unwrap();
            }
        }
    }

    if report.skipped_count() > 0 {
        writeln!(output, "Skipped:").unwrap();
        for (source, reason, detail) in report.skipped() {
            writeln!(output, "  {source}: {reason} ({detail})").unwrap();
        }
    }

    if !report.hazards.is_empty() {
        writeln!(output, "Drift omitted:").unwrap();
        for hazard in &report.hazards {
            writeln!(
                output,
                "  {} lap {}: {}",
                hazard.source, hazard.lap_number, hazard.hazard
            )
            .unwrap();
        }
    }

    if report.local_time_degraded {
        writeln!(output, "Local time unavailable; lap times are in UTC.").unwrap();
    }

    let outcome = match report.classification() {
        BatchClassification::Success => "success",
        BatchClassification::PartialFailure => "partial failure",
        BatchClassification::TotalFailure => "total failure",
    };
    writeln!(output, "Result: {outcome}").unwrap();

    output
}
