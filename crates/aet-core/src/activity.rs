//! Activity documents and the laps extracted from them.
//!
//! An [`ActivityDocument`] is what a reader hands to the core: per-lap lists of
//! raw field text, exactly as found in the source file. [`crate::extract`]
//! turns it into typed [`Lap`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Position, SourceId};

/// Raw text of one trackpoint's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackpointFields {
    pub time: Option<String>,
    pub distance_meters: Option<String>,
    pub heart_rate_bpm: Option<String>,
    pub longitude_degrees: Option<String>,
    pub latitude_degrees: Option<String>,
}

/// Raw text of one lap's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LapFields {
    pub total_time_seconds: Option<String>,
    /// Lap distance as reported by the device summary.
    pub distance_meters: Option<String>,
    pub trackpoints: Vec<TrackpointFields>,
}

/// A parsed activity file, reduced to the fields the analysis consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityDocument {
    pub laps: Vec<LapFields>,
}

/// One timestamped sample within a lap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trackpoint {
    pub timestamp: DateTime<Utc>,
    /// Distance covered since the start of the activity.
    pub cumulative_distance_m: f64,
    pub heart_rate_bpm: Option<u16>,
    pub position: Option<Position>,
}

/// Why a lap cannot support a drift computation, detected at extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapFlag {
    NoTrackpoints,
    NoHeartRate,
}

/// A contiguous timed segment of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    pub source_id: SourceId,
    /// 1-based lap number within its source.
    pub number: usize,
    /// Lap duration as reported by the device; used for halving.
    pub total_time_s: f64,
    pub reported_distance_m: Option<f64>,
    pub trackpoints: Vec<Trackpoint>,
    pub start_position: Option<Position>,
}

impl Lap {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.trackpoints.first().map(|tp| tp.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.trackpoints.last().map(|tp| tp.timestamp)
    }

    /// Seconds between the first and last trackpoint, with millisecond precision.
    #[allow(clippy::cast_precision_loss)]
    pub fn computed_duration_s(&self) -> Option<f64> {
        let start = self.start_time()?;
        let end = self.end_time()?;
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    pub fn heart_rates(&self) -> impl Iterator<Item = u16> + '_ {
        self.trackpoints.iter().filter_map(|tp| tp.heart_rate_bpm)
    }

    pub fn flag(&self) -> Option<LapFlag> {
        if self.trackpoints.is_empty() {
            Some(LapFlag::NoTrackpoints)
        } else if self.heart_rates().next().is_none() {
            Some(LapFlag::NoHeartRate)
        } else {
            None
        }
    }
}
