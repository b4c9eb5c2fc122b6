//! Core analysis for aerobic efficiency tests.
//!
//! This crate contains the domain types and logic for:
//! - Extraction: turning raw activity documents into typed laps
//! - Metrics: half-split speed/heart-rate ratios and cardiac drift per lap
//! - Zones: binning heart-rate samples into configurable zones
//! - Batch: running either analysis over many sources with per-source outcomes
//!
//! File formats live elsewhere; readers implement [`ActivityLoader`].

pub mod activity;
pub mod batch;
pub mod extract;
pub mod metrics;
pub mod timezone;
pub mod types;
pub mod units;
pub mod zones;

pub use activity::{ActivityDocument, Lap, LapFields, LapFlag, Trackpoint, TrackpointFields};
pub use batch::{
    ActivityLoader, BatchClassification, BatchOptions, BatchReport, DriftBatch, LapHazard,
    LoadError, ProcessingOutcome, SkipReason, SourceStatus, SourceZones, ZoneBatch, analyze_drift,
    analyze_zones,
};
pub use extract::{ExtractError, extract_heart_rates, extract_laps};
pub use metrics::{
    Half, HalfMetrics, HalfSplit, LapMetrics, MetricsConfig, SpeedSource, ZeroDivisionHazard,
    compute_lap_metrics,
};
pub use timezone::{FixedTimezone, LapClock, TimezoneLookup};
#[cfg(feature = "geo-tz")]
pub use timezone::GeoTimezone;
pub use types::{Position, SourceId, ValidationError};
pub use zones::{ConfigError, ZoneDistribution, ZoneSpec, bin_heart_rates};
