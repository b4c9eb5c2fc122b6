//! Multi-source batch processing.
//!
//! Each source is loaded, extracted and analyzed on its own. A failing source
//! is recorded as skipped with its reason and never stops the batch. Results
//! and outcomes come back in input order, whether sources ran sequentially or
//! in parallel.

use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::activity::ActivityDocument;
use crate::extract::{extract_heart_rates, extract_laps};
use crate::metrics::{LapMetrics, MetricsConfig, ZeroDivisionHazard, compute_lap_metrics};
use crate::types::SourceId;
use crate::zones::{ZoneDistribution, ZoneSpec, bin_heart_rates};

/// Errors loading a source document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source is missing or unreadable.
    #[error("{0}")]
    Unavailable(String),
    /// The source was read but is not a valid document.
    #[error("{0}")]
    Malformed(String),
}

/// Loads activity documents for a batch.
///
/// This trait lets the batch run over different readers (e.g. TCX files, or
/// in-memory fixtures in tests).
pub trait ActivityLoader: Sync {
    fn load(&self, source: &SourceId) -> Result<ActivityDocument, LoadError>;
}

/// Why a source was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SourceUnavailable,
    ParseError,
    NoUsableData,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source unavailable",
            Self::ParseError => "parse error",
            Self::NoUsableData => "no usable data",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Processed { laps: usize },
    Skipped { reason: SkipReason, detail: String },
}

/// Outcome for one source, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source: SourceId,
    #[serde(flatten)]
    pub outcome: ProcessingOutcome,
}

/// A lap whose drift could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LapHazard {
    pub source: SourceId,
    pub lap_number: usize,
    pub hazard: ZeroDivisionHazard,
}

/// Overall result of a batch, for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchClassification {
    /// Every source was processed.
    Success,
    /// Some sources were skipped, at least one was processed.
    PartialFailure,
    /// No source yielded usable data.
    TotalFailure,
}

/// Per-source outcomes and lap-level hazards of a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub sources: Vec<SourceStatus>,
    pub hazards: Vec<LapHazard>,
    /// Local time was requested but lap times were reported in UTC.
    pub local_time_degraded: bool,
}

impl BatchReport {
    pub fn processed_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, ProcessingOutcome::Processed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.sources.len() - self.processed_count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&SourceId, SkipReason, &str)> {
        self.sources.iter().filter_map(|s| match &s.outcome {
            ProcessingOutcome::Skipped { reason, detail } => Some((&s.source, *reason, detail.as_str())),
            ProcessingOutcome::Processed { .. } => None,
        })
    }

    pub fn classification(&self) -> BatchClassification {
        match (self.processed_count(), self.skipped_count()) {
            (0, _) => BatchClassification::TotalFailure,
            (_, 0) => BatchClassification::Success,
            _ => BatchClassification::PartialFailure,
        }
    }
}

/// Options shared by both batch kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Process sources on the rayon pool; output order is unchanged.
    pub parallel: bool,
}

/// Lap metrics for every processed source.
#[derive(Debug, Clone, Serialize)]
pub struct DriftBatch {
    pub laps: Vec<LapMetrics>,
    pub report: BatchReport,
}

/// Zone distribution of one processed source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceZones {
    pub source: SourceId,
    pub distribution: ZoneDistribution,
}

/// Zone distributions per processed source plus their combination.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneBatch {
    pub sources: Vec<SourceZones>,
    pub overall: ZoneDistribution,
    pub report: BatchReport,
}

/// Computes lap metrics for every lap of every source.
pub fn analyze_drift<L: ActivityLoader>(
    sources: &[SourceId],
    loader: &L,
    config: &MetricsConfig,
    options: BatchOptions,
) -> DriftBatch {
    let results = run_sources(sources, loader, options, |source, document| {
        let laps =
            extract_laps(source, &document).map_err(|e| (SkipReason::ParseError, e.to_string()))?;
        if laps.is_empty() {
            return Err((SkipReason::NoUsableData, "no laps found".to_string()));
        }
        if laps.iter().all(|lap| lap.heart_rates().next().is_none()) {
            return Err((SkipReason::NoUsableData, "no heart-rate samples".to_string()));
        }
        let metrics: Vec<LapMetrics> = laps
            .iter()
            .map(|lap| compute_lap_metrics(lap, config))
            .collect();
        Ok((metrics.len(), metrics))
    });

    let mut report = BatchReport {
        local_time_degraded: config.clock.is_degraded(),
        ..BatchReport::default()
    };
    let mut laps = Vec::new();
    for (status, metrics) in results {
        report.sources.push(status);
        for lap in metrics.into_iter().flatten() {
            if let Some(hazard) = lap.hazard() {
                report.hazards.push(LapHazard {
                    source: lap.source_id.clone(),
                    lap_number: lap.lap_number,
                    hazard,
                });
            }
            laps.push(lap);
        }
    }
    DriftBatch { laps, report }
}

/// Bins the heart-rate samples of every source into zones.
pub fn analyze_zones<L: ActivityLoader>(
    sources: &[SourceId],
    loader: &L,
    spec: &ZoneSpec,
    options: BatchOptions,
) -> ZoneBatch {
    let results = run_sources(sources, loader, options, |_source, document| {
        let samples = extract_heart_rates(&document)
            .map_err(|e| (SkipReason::ParseError, e.to_string()))?;
        if samples.is_empty() {
            return Err((SkipReason::NoUsableData, "no heart-rate samples".to_string()));
        }
        let distribution = bin_heart_rates(&samples, spec);
        if !distribution.is_defined() {
            return Err((
                SkipReason::NoUsableData,
                "all heart-rate samples outside zone boundaries".to_string(),
            ));
        }
        Ok((document.laps.len(), distribution))
    });

    let mut report = BatchReport::default();
    let mut per_source = Vec::new();
    let mut overall = ZoneDistribution::empty(spec);
    for (status, distribution) in results {
        if let Some(distribution) = distribution {
            overall.merge(&distribution);
            per_source.push(SourceZones {
                source: status.source.clone(),
                distribution,
            });
        }
        report.sources.push(status);
    }
    ZoneBatch {
        sources: per_source,
        overall,
        report,
    }
}

type SourceResult<T> = Result<(usize, T), (SkipReason, String)>;

/// Runs `analyze` over every source, returning outcomes in input order.
fn run_sources<L, T, F>(
    sources: &[SourceId],
    loader: &L,
    options: BatchOptions,
    analyze: F,
) -> Vec<(SourceStatus, Option<T>)>
where
    L: ActivityLoader,
    T: Send,
    F: Fn(&SourceId, ActivityDocument) -> SourceResult<T> + Sync,
{
    let process = |source: &SourceId| process_source(source, loader, &analyze);
    if options.parallel {
        sources.par_iter().map(process).collect()
    } else {
        sources.iter().map(process).collect()
    }
}

fn process_source<L, T, F>(source: &SourceId, loader: &L, analyze: &F) -> (SourceStatus, Option<T>)
where
    L: ActivityLoader,
    F: Fn(&SourceId, ActivityDocument) -> SourceResult<T>,
{
    let result = match loader.load(source) {
        Ok(document) => analyze(source, document),
        Err(LoadError::Unavailable(detail)) => Err((SkipReason::SourceUnavailable, detail)),
        Err(LoadError::Malformed(detail)) => Err((SkipReason::ParseError, detail)),
    };

    match result {
        Ok((laps, value)) => {
            tracing::debug!(%source, laps, "source processed");
            (
                SourceStatus {
                    source: source.clone(),
                    outcome: ProcessingOutcome::Processed { laps },
                },
                Some(value),
            )
        }
        Err((reason, detail)) => {
            tracing::warn!(%source, %reason, %detail, "skipping source");
            (
                SourceStatus {
                    source: source.clone(),
                    outcome: ProcessingOutcome::Skipped { reason, detail },
                },
                None,
            )
        }
    }
}
